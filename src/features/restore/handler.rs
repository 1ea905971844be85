use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::{Field, MultipartRejection}},
    routing::post,
};
use base64::Engine;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use crate::error::{AppError, RestoreError};
use crate::state::AppState;

use super::models::{ErrorResponse, RestoreResponse, RestoreUpload};
use super::service::{PredictParams, RestorationService};
use super::staging::{StagingArea, adopt_result, sanitize_extension};

/// 修复路由
pub fn create_restore_router() -> Router<AppState> {
    Router::new().route("/restore", post(restore_photo))
}

#[utoipa::path(
    post,
    path = "/restore",
    summary = "修复照片",
    description = "上传一张图片（multipart 字段 `file`），由远端修复服务处理后以 Base64 返回修复结果。请求产生的临时文件在返回前全部删除。",
    request_body(content = RestoreUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "修复成功", body = RestoreResponse),
        (status = 400, description = "缺少文件字段或文件名为空", body = ErrorResponse),
        (status = 500, description = "未能取回修复结果或内部错误", body = ErrorResponse)
    ),
    tag = "Restore"
)]
pub async fn restore_photo(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RestoreResponse>, AppError> {
    tracing::info!("收到照片修复请求");

    let result = match multipart {
        Ok(mut multipart) => match stage_upload(&state.staging, &mut multipart).await {
            Ok(staged) => {
                // 出站调用放进独立任务：调用方断开后仍会跑完并清理临时文件
                let task = tokio::spawn(
                    run_pipeline(state.restorer.clone(), staged).in_current_span(),
                );
                match task.await {
                    Ok(r) => r,
                    Err(e) => Err(AppError::Internal(format!("修复任务异常终止: {e}"))),
                }
            }
            Err(e) => Err(e),
        },
        Err(rejection) => {
            tracing::debug!("请求体不是 multipart: {}", rejection);
            Err(AppError::NoFilePart)
        }
    };

    match result {
        Ok(image) => Ok(Json(RestoreResponse {
            success: true,
            image,
        })),
        Err(e) => {
            log_failure(&e);
            Err(e)
        }
    }
}

/// 找到名为 `file` 的文件字段并写入暂存文件
async fn stage_upload(
    staging: &StagingArea,
    multipart: &mut Multipart,
) -> Result<TempPath, AppError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(AppError::NoFilePart),
            Err(e) => {
                tracing::debug!("multipart 解析失败: {}", e);
                return Err(AppError::NoFilePart);
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        // 不带 filename 参数的同名字段是普通表单值，不算文件
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(AppError::NoSelectedFile);
        }
        return write_field(staging, field, &file_name).await;
    }
}

async fn write_field(
    staging: &StagingArea,
    mut field: Field<'_>,
    file_name: &str,
) -> Result<TempPath, AppError> {
    let extension = sanitize_extension(file_name);
    let (staged, mut file) = staging
        .create_upload(extension.as_deref())
        .await
        .map_err(|e| AppError::Internal(format!("创建暂存文件失败: {e}")))?;

    let mut size = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Internal(format!("读取上传内容失败: {e}")))?
    {
        size += chunk.len();
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(format!("写入暂存文件失败: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::Internal(format!("写入暂存文件失败: {e}")))?;

    tracing::info!(
        "上传文件已暂存: {:?} ({} bytes, 原始文件名 {:?})",
        &*staged,
        size,
        file_name
    );
    Ok(staged)
}

/// 调用远端 → 读取结果 → Base64 编码。
///
/// `staged` 与结果文件的守卫都在本函数内释放，任何返回路径都会删除两者。
async fn run_pipeline(
    restorer: Option<Arc<dyn RestorationService>>,
    staged: TempPath,
) -> Result<String, AppError> {
    let restorer = restorer.ok_or(RestoreError::Unavailable)?;

    tracing::info!("开始照片修复");
    let prediction = restorer
        .predict(&staged, &PredictParams::FIXED)
        .await?;
    tracing::info!("照片修复完成 (secondary = {})", prediction.secondary);

    let Some(result) = prediction
        .result_path
        .filter(|p| !p.as_os_str().is_empty())
        .map(adopt_result)
    else {
        return Err(AppError::RestoredImageMissing);
    };
    if !tokio::fs::try_exists(&result).await.unwrap_or(false) {
        return Err(AppError::RestoredImageMissing);
    }

    tracing::info!("读取修复结果: {:?}", &*result);
    let bytes = tokio::fs::read(&result)
        .await
        .map_err(|e| AppError::Internal(format!("读取修复结果失败: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn log_failure(err: &AppError) {
    match err {
        AppError::NoFilePart | AppError::NoSelectedFile => tracing::warn!("{}", err),
        AppError::RestoredImageMissing => tracing::error!("{}", err),
        AppError::Internal(_) | AppError::Restore(_) => {
            tracing::error!("照片修复过程中出错: {} ({:?})", err, err)
        }
    }
}
