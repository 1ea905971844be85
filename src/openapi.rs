use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::restore::handler::restore_photo,
    ),
    components(schemas(
        crate::features::restore::models::RestoreResponse,
        crate::features::restore::models::ErrorResponse,
        crate::features::restore::models::RestoreUpload,
        crate::features::health::handler::HealthResponse,
    )),
    tags(
        (
            name = "Restore",
            description = "照片修复：上传图片，由远端修复服务处理后返回 Base64 结果。"
        ),
        (name = "Health", description = "健康检查：服务探活。"),
    ),
    info(
        title = "Restore Relay API",
        version = env!("CARGO_PKG_VERSION"),
        description = "照片修复中继服务 API（Axum + utoipa）。"
    )
)]
pub struct ApiDoc;
