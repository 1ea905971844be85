use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;

use crate::config::RestorationConfig;
use crate::error::RestoreError;

use super::service::{PREDICT_API_NAME, PredictParams, Prediction, RestorationService};
use super::sse::{SseDecoder, SseEvent};
use super::staging::{StagingArea, sanitize_extension};

/// Gradio 文件对象（上传参数与文件类输出共用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileData {
    /// 远端服务器上的路径
    pub path: String,
    /// 可直接下载的地址（部分版本不返回）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default = "FileData::default_meta")]
    pub meta: Value,
}

impl FileData {
    fn default_meta() -> Value {
        json!({ "_type": "gradio.FileData" })
    }

    fn from_path(path: String) -> Self {
        Self {
            path,
            url: None,
            orig_name: None,
            size: None,
            mime_type: None,
            meta: Self::default_meta(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpaceHost {
    host: String,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    event_id: String,
}

/// 托管在 Gradio 上的远端修复服务客户端。
///
/// 进程内只创建一次，之后只读共享。所有出站请求都不设超时。
#[derive(Debug, Clone)]
pub struct GradioClient {
    http: reqwest::Client,
    root: String,
    api_prefix: String,
    downloads: StagingArea,
}

impl GradioClient {
    /// 解析 Space 主机并拉取远端配置
    pub async fn connect(
        cfg: &RestorationConfig,
        downloads: StagingArea,
    ) -> Result<Self, RestoreError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = cfg
            .hf_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RestoreError::InvalidConfig(format!("hf_token 含非法字符: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("restore-relay/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        let root = resolve_root(&http, cfg).await?;
        tracing::debug!("修复服务根地址: {}", root);

        let remote_config: Value = http
            .get(format!("{root}/config"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let api_prefix = remote_config
            .get("api_prefix")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim_end_matches('/')
            .to_string();

        tracing::info!(
            "修复服务已连接: root = {}, api_prefix = {:?}, gradio = {}",
            root,
            api_prefix,
            remote_config
                .get("version")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown")
        );

        Ok(Self {
            http,
            root,
            api_prefix,
            downloads,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.root, self.api_prefix, path)
    }

    async fn upload(&self, input: &Path) -> Result<FileData, RestoreError> {
        let bytes = tokio::fs::read(input).await?;
        let size = bytes.len() as u64;
        let name = input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let form = Form::new().part("files", Part::bytes(bytes).file_name(name.clone()));
        let paths: Vec<String> = self
            .http
            .post(self.endpoint("/upload"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let path = paths
            .into_iter()
            .next()
            .ok_or_else(|| RestoreError::InvalidResponse("上传接口未返回文件路径".to_string()))?;
        tracing::debug!("输入已上传至远端: {}", path);

        Ok(FileData {
            orig_name: Some(name),
            size: Some(size),
            ..FileData::from_path(path)
        })
    }

    async fn submit(&self, file: FileData, params: &PredictParams) -> Result<String, RestoreError> {
        let body = json!({
            "data": [
                file,
                params.randomize_seed,
                params.aligned,
                params.scale,
                params.num_flow_steps,
                params.seed,
            ]
        });
        let resp: CallResponse = self
            .http
            .post(self.endpoint(&format!("/call{PREDICT_API_NAME}")))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.event_id)
    }

    async fn await_outputs(&self, event_id: &str) -> Result<Vec<Value>, RestoreError> {
        let resp = self
            .http
            .get(self.endpoint(&format!("/call{PREDICT_API_NAME}/{event_id}")))
            .send()
            .await?
            .error_for_status()?;

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in decoder.push(&chunk) {
                if let Some(outputs) = terminal_outputs(event)? {
                    return Ok(outputs);
                }
            }
        }
        if let Some(event) = decoder.finish() {
            if let Some(outputs) = terminal_outputs(event)? {
                return Ok(outputs);
            }
        }
        Err(RestoreError::InvalidResponse(
            "结果流在完成事件之前结束".to_string(),
        ))
    }

    /// 把远端结果文件下载到暂存目录，返回本地路径
    async fn download(&self, file: &FileData) -> Result<PathBuf, RestoreError> {
        let url = match file.url.as_deref() {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => self.endpoint(&format!("/file={}", file.path)),
        };
        let name_hint = file.orig_name.as_deref().unwrap_or(&file.path);
        let extension = sanitize_extension(name_hint);

        // 下载中途失败时守卫删除半成品
        let (dest, mut out) = self.downloads.create_result(extension.as_deref()).await?;

        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            out.write_all(&chunk?).await?;
        }
        out.flush().await?;
        drop(out);

        let path = dest.keep().map_err(|e| e.error)?;
        tracing::debug!("结果已下载: {} -> {:?}", url, path);
        Ok(path)
    }
}

#[async_trait]
impl RestorationService for GradioClient {
    async fn predict(
        &self,
        input: &Path,
        params: &PredictParams,
    ) -> Result<Prediction, RestoreError> {
        let uploaded = self.upload(input).await?;
        let event_id = self.submit(uploaded, params).await?;
        tracing::debug!("预测任务已提交: event_id = {}", event_id);

        let mut outputs = self.await_outputs(&event_id).await?.into_iter();
        let image = outputs.next().unwrap_or(Value::Null);
        let secondary = outputs.next().unwrap_or(Value::Null);

        let result_path = match parse_file_output(image)? {
            Some(file) => Some(self.download(&file).await?),
            None => None,
        };
        Ok(Prediction {
            result_path,
            secondary,
        })
    }
}

async fn resolve_root(
    http: &reqwest::Client,
    cfg: &RestorationConfig,
) -> Result<String, RestoreError> {
    let space = cfg.space.trim();
    if space.starts_with("http://") || space.starts_with("https://") {
        return Ok(space.trim_end_matches('/').to_string());
    }
    if space.is_empty() {
        return Err(RestoreError::InvalidConfig("restoration.space 为空".to_string()));
    }

    let url = format!(
        "{}/api/spaces/{}/host",
        cfg.hf_endpoint.trim_end_matches('/'),
        space
    );
    let host: SpaceHost = http
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(host.host.trim_end_matches('/').to_string())
}

/// `complete` 返回输出列表，`error` 转为错误，其余事件忽略
fn terminal_outputs(event: SseEvent) -> Result<Option<Vec<Value>>, RestoreError> {
    match event.event.as_str() {
        "complete" => Ok(Some(serde_json::from_str(&event.data)?)),
        "error" => {
            let detail = event.data.trim();
            let detail = if detail.is_empty() || detail == "null" {
                "未给出错误详情"
            } else {
                detail
            };
            Err(RestoreError::Upstream(detail.to_string()))
        }
        other => {
            tracing::trace!("忽略结果流事件: {}", other);
            Ok(None)
        }
    }
}

/// 文件类输出可能是文件对象、纯路径字符串或 null
fn parse_file_output(value: Value) -> Result<Option<FileData>, RestoreError> {
    match value {
        Value::Null => Ok(None),
        Value::String(path) if path.is_empty() => Ok(None),
        Value::String(path) => Ok(Some(FileData::from_path(path))),
        other => Ok(Some(serde_json::from_value(other)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::{SseEvent, parse_file_output, terminal_outputs};
    use crate::error::RestoreError;
    use serde_json::json;

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn complete_event_yields_outputs() {
        let out = terminal_outputs(event("complete", r#"[{"path":"/tmp/a.png"}, 7]"#))
            .expect("ok")
            .expect("terminal");
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], json!(7));
    }

    #[test]
    fn error_event_maps_to_upstream() {
        let err = terminal_outputs(event("error", "null")).expect_err("error event");
        assert!(matches!(err, RestoreError::Upstream(_)));
    }

    #[test]
    fn progress_events_are_ignored() {
        assert!(terminal_outputs(event("generating", "[]")).expect("ok").is_none());
        assert!(terminal_outputs(event("heartbeat", "null")).expect("ok").is_none());
    }

    #[test]
    fn file_output_accepts_object_string_and_null() {
        let fd = parse_file_output(json!({"path": "/r/out.webp", "url": "http://h/out.webp"}))
            .expect("object")
            .expect("some");
        assert_eq!(fd.url.as_deref(), Some("http://h/out.webp"));

        let fd = parse_file_output(json!("/r/legacy.png"))
            .expect("string")
            .expect("some");
        assert_eq!(fd.path, "/r/legacy.png");

        assert!(parse_file_output(json!(null)).expect("null").is_none());
    }
}
