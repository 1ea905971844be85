use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn is_valid_request_id(v: &str) -> bool {
    !v.is_empty()
        && v.len() <= 128
        && v.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|raw| is_valid_request_id(raw))
        .map(str::to_owned)
        .unwrap_or_else(|| format!("req_{}", Uuid::new_v4().simple()))
}

/// 全局 request_id 中间件：
/// - 优先透传客户端传入的 `X-Request-Id`，缺失或非法时自动生成
/// - 整个请求在带 request_id 的 `request` span 中执行，日志可按请求串联
/// - 回写到响应头
pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = resolve_request_id(&req);
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut res = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::{X_REQUEST_ID, is_valid_request_id, resolve_request_id};
    use axum::{body::Body, extract::Request, http};

    fn request_with(id: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/restore");
        if let Some(id) = id {
            builder = builder.header(&X_REQUEST_ID, id);
        }
        builder.body(Body::empty()).expect("build request")
    }

    #[test]
    fn request_id_validation_accepts_safe_chars() {
        assert!(is_valid_request_id("req-123_abc.def"));
    }

    #[test]
    fn request_id_validation_rejects_empty_and_unsafe_chars() {
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("bad id"));
        assert!(!is_valid_request_id("bad/xx"));
        assert!(!is_valid_request_id(&"a".repeat(129)));
    }

    #[test]
    fn resolve_trims_client_value_and_generates_fallback() {
        assert_eq!(resolve_request_id(&request_with(Some(" abc-1 "))), "abc-1");

        let generated = resolve_request_id(&request_with(Some("bad id")));
        assert!(generated.starts_with("req_"));
        assert!(is_valid_request_id(&generated));

        let missing = resolve_request_id(&request_with(None));
        assert!(missing.starts_with("req_"));
        assert_ne!(missing, generated);
    }
}
