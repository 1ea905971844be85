use crate::config::AppConfig;
use crate::features::restore::StagingArea;

/// 执行启动检查
///
/// 1. 创建暂存目录（失败则阻断启动）
/// 2. 检查首页文件（缺失仅告警）
pub async fn run_startup_checks(
    config: &AppConfig,
    staging: &StagingArea,
) -> Result<(), std::io::Error> {
    tracing::info!("🔍 开始执行启动检查...");

    staging.ensure_dir().await?;
    tracing::info!("✅ 暂存目录就绪: {:?}", staging.dir());

    let index = config.index_path();
    if tokio::fs::try_exists(&index).await.unwrap_or(false) {
        tracing::info!("✅ 首页文件已存在: {:?}", index);
    } else {
        tracing::warn!("⚠️ 未找到首页文件 {:?}，GET / 将返回 404", index);
    }

    tracing::info!("✅ 启动检查完成");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::run_startup_checks;
    use crate::config::AppConfig;
    use crate::features::restore::StagingArea;

    #[tokio::test]
    async fn creates_missing_staging_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path().join("a").join("b"));
        run_startup_checks(&AppConfig::default(), &staging)
            .await
            .expect("checks");
        assert!(staging.dir().is_dir());
    }
}
