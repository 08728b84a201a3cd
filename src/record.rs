use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One access-log document as it is shipped to the backend. Serialized field
/// names line up with the index mapping, so a record goes onto the wire
/// as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpLogRecord {
    #[serde(rename = "@timestamp", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub remote_ip: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,
    pub server_ip: IpAddr,
    pub request_method: String,
    pub request_scheme: String,
    pub request_host: String,
    pub request_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_query: Option<String>,
    pub http_version: f32,
    pub response: u16,
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Raw values captured when a request/response cycle completes, before the
/// derived fields (client IP, protocol version) are resolved.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub remote_addr: IpAddr,
    /// Verbatim `X-Forwarded-For` header value, if the request carried one.
    pub forwarded_for: Option<String>,
    pub remote_user: Option<String>,
    pub server_addr: IpAddr,
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: Option<String>,
    /// Protocol string as sent on the request line, e.g. "HTTP/1.1".
    pub protocol: String,
    pub status: u16,
    pub bytes: u64,
    pub referrer: Option<String>,
    pub agent: Option<String>,
}

impl HttpLogRecord {
    /// Stamps the record with the current time and resolves the
    /// boundary-derived fields.
    pub fn from_snapshot(snapshot: RequestSnapshot) -> Self {
        Self {
            timestamp: Utc::now(),
            remote_ip: resolve_client_ip(snapshot.remote_addr, snapshot.forwarded_for.as_deref()),
            remote_user: snapshot.remote_user,
            server_ip: snapshot.server_addr,
            request_method: snapshot.method,
            request_scheme: snapshot.scheme,
            request_host: snapshot.host,
            request_path: snapshot.path,
            request_query: snapshot.query,
            http_version: parse_http_version(&snapshot.protocol),
            response: snapshot.status,
            bytes: snapshot.bytes,
            referrer: snapshot.referrer,
            agent: snapshot.agent,
        }
    }
}

/// `X-Forwarded-For` may carry a comma-separated chain of addresses; the
/// first entry is the originating client. Falls back to the socket peer
/// address when the header is missing or the entry is not an IP.
fn resolve_client_ip(remote_addr: IpAddr, forwarded_for: Option<&str>) -> IpAddr {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .unwrap_or(remote_addr)
}

/// Numeric part of a "NAME/major.minor" protocol string, 0.0 when it does
/// not parse.
fn parse_http_version(protocol: &str) -> f32 {
    protocol
        .split_once('/')
        .and_then(|(_, version)| version.parse().ok())
        .unwrap_or(0.0)
}
