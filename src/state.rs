use std::sync::Arc;

use crate::features::restore::{RestorationService, StagingArea};

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 远端修复服务客户端（启动时初始化失败则为 None）
    pub restorer: Option<Arc<dyn RestorationService>>,
    /// 上传与结果文件的暂存区
    pub staging: StagingArea,
}
