use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsConfig;

/// 根据配置构建 CORS 中间件
///
/// 默认配置放行任意来源、方法与请求头，浏览器端页面可直接跨域调用 `/restore`。
pub fn build_cors_layer(cors: &CorsConfig) -> Option<CorsLayer> {
    if !cors.enabled {
        return None;
    }

    let (any_origin, origins) = parse_list("allowed_origins", &cors.allowed_origins, |v| {
        HeaderValue::from_str(v).ok()
    });
    if !any_origin && origins.is_empty() {
        tracing::warn!("CORS 已启用但 allowed_origins 为空，已跳过启用");
        return None;
    }
    let (any_methods, methods) = parse_list("allowed_methods", &cors.allowed_methods, |v| {
        Method::from_bytes(v.to_ascii_uppercase().as_bytes()).ok()
    });
    let (any_headers, headers) = parse_list("allowed_headers", &cors.allowed_headers, |v| {
        HeaderName::from_bytes(v.to_ascii_lowercase().as_bytes()).ok()
    });
    let (_, expose) = parse_list("expose_headers", &cors.expose_headers, |v| {
        HeaderName::from_bytes(v.to_ascii_lowercase().as_bytes()).ok()
    });

    let mut layer = CorsLayer::new();
    layer = if any_origin {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    };
    if any_methods {
        layer = layer.allow_methods(Any);
    } else if !methods.is_empty() {
        layer = layer.allow_methods(methods);
    }
    if any_headers {
        layer = layer.allow_headers(Any);
    } else if !headers.is_empty() {
        layer = layer.allow_headers(headers);
    }
    if !expose.is_empty() {
        layer = layer.expose_headers(expose);
    }
    if let Some(secs) = cors.max_age_secs
        && secs > 0
    {
        layer = layer.max_age(Duration::from_secs(secs));
    }

    Some(layer)
}

/// 解析配置列表："*" 表示任意，空白项跳过，非法项告警后丢弃
fn parse_list<T>(
    label: &str,
    values: &[String],
    parse: impl Fn(&str) -> Option<T>,
) -> (bool, Vec<T>) {
    let mut any = false;
    let mut out = Vec::new();
    for raw in values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        if value == "*" {
            any = true;
            continue;
        }
        match parse(value) {
            Some(v) => out.push(v),
            None => tracing::warn!("CORS {} 含无效值: {}", label, value),
        }
    }
    (any, out)
}

#[cfg(test)]
mod tests {
    use super::{build_cors_layer, parse_list};
    use crate::config::CorsConfig;
    use axum::http::Method;

    #[test]
    fn default_config_builds_permissive_layer() {
        assert!(build_cors_layer(&CorsConfig::default()).is_some());
    }

    #[test]
    fn build_cors_layer_skips_when_disabled_or_origins_empty() {
        let disabled = CorsConfig {
            enabled: false,
            ..CorsConfig::default()
        };
        assert!(build_cors_layer(&disabled).is_none());

        let empty = CorsConfig {
            allowed_origins: vec![" ".to_string()],
            ..CorsConfig::default()
        };
        assert!(build_cors_layer(&empty).is_none());
    }

    #[test]
    fn parse_list_normalizes_and_drops_invalid() {
        let input = vec!["get".to_string(), " POST ".to_string(), "*".to_string()];
        let (any, methods) = parse_list("allowed_methods", &input, |v| {
            Method::from_bytes(v.to_ascii_uppercase().as_bytes()).ok()
        });
        assert!(any);
        assert_eq!(methods, vec![Method::GET, Method::POST]);
    }
}
