use axum::{Router, extract::DefaultBodyLimit};
use tower_http::services::ServeFile;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::cors::build_cors_layer;
use crate::features::{health, restore};
use crate::openapi::ApiDoc;
use crate::request_id::request_id_middleware;
use crate::state::AppState;

/// 组装完整路由：首页、修复接口、健康检查、文档，以及 CORS / request_id 中间件
pub fn build_app(state: AppState, config: &AppConfig) -> Router {
    let restore_router = restore::create_restore_router()
        .layer(DefaultBodyLimit::max(config.upload.max_body_bytes));

    let mut app = Router::<AppState>::new()
        .route_service("/", ServeFile::new(config.index_path()))
        .merge(restore_router)
        .merge(health::create_health_router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state);

    if let Some(cors) = build_cors_layer(&config.cors) {
        app = app.layer(cors);
    }
    app.layer(axum::middleware::from_fn(request_id_middleware))
}
