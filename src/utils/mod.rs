use std::net::SocketAddr;

use axum::{body::Body, extract::ConnectInfo, http::Request};

pub const UNKNOWN_CLIENT: &str = "unknown";

/// 解析客户端标识：X-Forwarded-For 第一个非空地址，其次 X-Real-IP，
/// 再降级为连接 IP，最后为 "unknown"
pub fn client_id(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        .or_else(|| {
            req.headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .or(remote_ip.as_deref())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> axum::http::request::Builder {
        Request::builder().method("POST").uri("/api/chat")
    }

    #[test]
    fn forwarded_for_takes_first_address() {
        let req = request()
            .header("x-forwarded-for", " , 203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_id(&req), "203.0.113.7");
    }

    #[test]
    fn real_ip_is_used_without_forwarded_for() {
        let req = request()
            .header("x-real-ip", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_id(&req), "10.0.0.2");
    }

    #[test]
    fn falls_back_to_peer_address() {
        let mut req = request().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_id(&req), "192.0.2.1");
    }

    #[test]
    fn unknown_without_any_source() {
        let req = request().body(Body::empty()).unwrap();
        assert_eq!(client_id(&req), UNKNOWN_CLIENT);
    }
}
