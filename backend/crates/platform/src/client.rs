//! Request context for audit entries
//!
//! The client address and user agent of whoever triggered an action,
//! read from HTTP headers behind the hosting proxy.

use std::net::IpAddr;

use http::{HeaderMap, header};
use serde::{Deserialize, Serialize};

/// Longest user agent stored with an audit entry
const MAX_USER_AGENT_LEN: usize = 512;

/// Who made the request, as far as the headers tell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(ip_address: Option<IpAddr>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }

    /// Context for jobs with no request behind them
    pub fn system() -> Self {
        Self::default()
    }

    /// Build from request headers, falling back to the socket address
    pub fn from_headers(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .map(truncate_user_agent);

        Self {
            ip_address: extract_client_ip(headers, direct_ip),
            user_agent,
        }
    }

    /// IP as text (audit rows store it as a string column)
    pub fn ip_string(&self) -> Option<String> {
        self.ip_address.map(|ip| ip.to_string())
    }
}

fn truncate_user_agent(ua: &str) -> String {
    ua.chars().take(MAX_USER_AGENT_LEN).collect()
}

/// Extract the client IP address
///
/// Order: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// direct connection address.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    forwarded.or_else(real_ip).or(direct_ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 Test Browser"),
        );
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        let ctx = RequestContext::from_headers(&headers, None);
        assert_eq!(ctx.ip_string().as_deref(), Some("192.168.1.1"));
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0 Test Browser"));
    }

    #[test]
    fn test_context_without_headers() {
        let direct: IpAddr = "127.0.0.1".parse().unwrap();
        let ctx = RequestContext::from_headers(&HeaderMap::new(), Some(direct));
        assert_eq!(ctx.ip_address, Some(direct));
        assert_eq!(ctx.user_agent, None);
    }

    #[test]
    fn test_long_user_agent_is_truncated() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&"x".repeat(2000)).unwrap(),
        );
        let ctx = RequestContext::from_headers(&headers, None);
        assert_eq!(ctx.user_agent.map(|ua| ua.len()), Some(MAX_USER_AGENT_LEN));
    }

    #[test]
    fn test_extract_client_ip_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.1.1.1"));
        assert_eq!(
            extract_client_ip(&headers, None),
            Some("10.1.1.1".parse().unwrap())
        );

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(
            extract_client_ip(&headers, None),
            Some("10.1.1.1".parse().unwrap())
        );

        headers.insert("x-forwarded-for", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(
            extract_client_ip(&headers, None),
            Some("2001:db8::1".parse().unwrap())
        );
    }

    #[test]
    fn test_system_context_is_empty() {
        let ctx = RequestContext::system();
        assert_eq!(ctx.ip_string(), None);
        assert_eq!(ctx.user_agent, None);
    }
}
