pub mod gradio;
pub mod handler;
pub mod models;
pub mod service;
pub mod sse;
pub mod staging;

use std::sync::Arc;

use crate::config::RestorationConfig;

pub use gradio::GradioClient;
pub use handler::create_restore_router;
pub use service::{PredictParams, Prediction, RestorationService};
pub use staging::{StagingArea, adopt_result};

/// 启动期连接远端修复服务。
///
/// 失败只记录日志并返回 None：进程继续运行，之后的修复请求在调用远端时统一返回 500。
pub async fn init_restorer(
    cfg: &RestorationConfig,
    staging: &StagingArea,
) -> Option<Arc<dyn RestorationService>> {
    match GradioClient::connect(cfg, staging.clone()).await {
        Ok(client) => {
            tracing::info!("修复服务客户端初始化成功: {}", client.root());
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::error!("修复服务客户端初始化失败: {} ({:?})", e, e);
            None
        }
    }
}
