use restore_relay::features::restore::{self, StagingArea};
use restore_relay::startup::run_startup_checks;
use restore_relay::{AppConfig, AppState, ShutdownManager, build_app};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.as_str().into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format.eq_ignore_ascii_case("compact") {
        builder.compact().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    // 配置先于日志加载，失败时只能直接输出到 stderr
    if let Err(e) = AppConfig::init_global() {
        eprintln!("Config init failed: {e}");
        std::process::exit(1);
    }
    let config = AppConfig::global();
    init_tracing(config);
    tracing::info!(
        "配置加载完成: space = {}, port = {}, staging = {:?}",
        config.restoration.space,
        config.server.port,
        config.staging_dir()
    );

    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler().await {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    let staging = StagingArea::new(config.staging_dir());
    if let Err(e) = run_startup_checks(config, &staging).await {
        tracing::error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    // 初始化失败不退出：之后每个修复请求在调用远端时返回 500
    let restorer = restore::init_restorer(&config.restoration, &staging).await;
    if restorer.is_none() {
        tracing::warn!("修复服务不可用，服务将继续运行，但 /restore 请求会失败");
    }

    let app = build_app(AppState { restorer, staging }, config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!("Restore API: http://{}/restore", addr);

    let graceful_manager = shutdown_manager.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let reason = graceful_manager.wait_for_shutdown().await;
                tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
            })
            .await
    });

    // 收到退出信号后，最多等待 timeout_secs 让在途请求完成
    let shutdown_timeout = config.shutdown.timeout_duration();
    let deadline = async {
        shutdown_manager.wait_for_shutdown().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        joined = &mut server => match joined {
            Ok(Ok(())) => tracing::info!("服务器已优雅关闭"),
            Ok(Err(e)) => {
                tracing::error!("服务器运行错误: {}", e);
                std::process::exit(1);
            }
            Err(e) => {
                tracing::error!("服务器任务异常终止: {}", e);
                std::process::exit(1);
            }
        },
        _ = deadline => {
            tracing::warn!(
                "优雅退出超时（{}秒），强制退出",
                config.shutdown.timeout_secs
            );
            server.abort();
        }
    }
}
