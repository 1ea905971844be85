use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    /// 监听端口（环境变量 `PORT` 优先）
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }
    fn default_port() -> u16 {
        5000
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 未设置 `RUST_LOG` 时使用的过滤规则
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 日志格式：full | compact
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "restore_relay=debug,tower_http=info".to_string()
    }
    fn default_format() -> String {
        "full".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
        }
    }
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default = "CorsConfig::default_enabled")]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_any")]
    pub allowed_origins: Vec<String>,
    /// 允许的方法列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_any")]
    pub allowed_methods: Vec<String>,
    /// 允许的请求头列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_any")]
    pub allowed_headers: Vec<String>,
    /// 暴露的响应头列表
    #[serde(default = "CorsConfig::default_expose_headers")]
    pub expose_headers: Vec<String>,
    /// 预检缓存时间（秒）
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_any() -> Vec<String> {
        vec!["*".to_string()]
    }
    fn default_expose_headers() -> Vec<String> {
        vec!["x-request-id".to_string()]
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allowed_origins: Self::default_any(),
            allowed_methods: Self::default_any(),
            allowed_headers: Self::default_any(),
            expose_headers: Self::default_expose_headers(),
            max_age_secs: None,
        }
    }
}

/// 远端修复服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestorationConfig {
    /// Hugging Face Space 标识（如 `ohayonguy/PMRF`），或直接给出 `http(s)://` 根地址
    #[serde(default = "RestorationConfig::default_space")]
    pub space: String,
    /// Hugging Face API 基地址，用于把 Space 标识解析为实际主机
    #[serde(default = "RestorationConfig::default_hf_endpoint")]
    pub hf_endpoint: String,
    /// 访问私有 Space 时使用的令牌
    #[serde(default)]
    pub hf_token: Option<String>,
}

impl RestorationConfig {
    fn default_space() -> String {
        "ohayonguy/PMRF".to_string()
    }
    fn default_hf_endpoint() -> String {
        "https://huggingface.co".to_string()
    }
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            space: Self::default_space(),
            hf_endpoint: Self::default_hf_endpoint(),
            hf_token: None,
        }
    }
}

/// 临时文件暂存配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingConfig {
    /// 暂存目录（缺省为系统临时目录下的 `restore-relay`）
    #[serde(default)]
    pub dir: Option<String>,
}

/// 首页静态资源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// `GET /` 返回的页面文件
    #[serde(default = "SiteConfig::default_index_path")]
    pub index_path: String,
}

impl SiteConfig {
    fn default_index_path() -> String {
        "./index.html".to_string()
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            index_path: Self::default_index_path(),
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// `/restore` 请求体上限（字节）
    #[serde(default = "UploadConfig::default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl UploadConfig {
    fn default_max_body_bytes() -> usize {
        32 * 1024 * 1024
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: Self::default_max_body_bytes(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 等待在途请求完成的最长时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub restoration: RestorationConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从 `config.toml`（可选）、`APP_*` 环境变量与 `PORT` 加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                ConfigError::Message(format!("PORT 环境变量无效 ({raw}): {e}"))
            })?),
            Err(_) => None,
        };
        Self::load_from(&Self::get_config_path(), port)
    }

    /// 按给定配置文件路径与端口覆盖值加载配置
    ///
    /// 配置文件不存在时仅使用默认值与环境变量。
    /// 环境变量示例：`APP_RESTORATION__SPACE`、`APP_UPLOAD__MAX_BODY_BYTES`。
    pub fn load_from(path: &Path, port_override: Option<u16>) -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", port_override.map(i64::from))?
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例
    ///
    /// 必须先调用 `init_global()`。
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    fn get_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 获取暂存目录
    pub fn staging_dir(&self) -> PathBuf {
        match self.staging.dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir().join("restore-relay"),
        }
    }

    /// 获取首页文件路径
    pub fn index_path(&self) -> PathBuf {
        PathBuf::from(&self.site.index_path)
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use std::io::Write;

    #[test]
    fn defaults_listen_on_all_interfaces_port_5000() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = AppConfig::load_from(&dir.path().join("missing.toml"), None).expect("load");
        assert_eq!(cfg.server_addr(), "0.0.0.0:5000");
        assert_eq!(cfg.restoration.space, "ohayonguy/PMRF");
        assert!(cfg.cors.enabled);
    }

    #[test]
    fn port_override_wins_over_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).expect("create config");
        writeln!(f, "[server]\nport = 7000\n\n[staging]\ndir = \"/var/tmp/relay\"").expect("write");

        let from_file = AppConfig::load_from(&path, None).expect("load");
        assert_eq!(from_file.server.port, 7000);
        assert_eq!(from_file.staging_dir(), std::path::PathBuf::from("/var/tmp/relay"));

        let overridden = AppConfig::load_from(&path, Some(8080)).expect("load");
        assert_eq!(overridden.server.port, 8080);
    }

    #[test]
    fn staging_dir_falls_back_to_system_temp() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.staging_dir(),
            std::env::temp_dir().join("restore-relay")
        );
    }
}
