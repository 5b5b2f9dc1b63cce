use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_REQUEST_BYTES: usize = 2_000_000;

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4000))
}

fn default_path() -> String {
    String::from("/")
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_max_request_bytes() -> usize {
    DEFAULT_MAX_REQUEST_BYTES
}

/// Configuration for the HTTP server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Server {
    /// The socket address to listen on; defaults to 127.0.0.1:4000
    pub listen: SocketAddr,

    /// The path the endpoint is served at; defaults to /
    pub path: String,

    /// Time allowed to produce response headers, in human-readable format; defaults to 30s
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Largest request body accepted, in bytes; defaults to 2MB
    pub max_request_bytes: usize,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            request_timeout: default_request_timeout(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

#[buildstructor::buildstructor]
impl Server {
    #[builder]
    pub fn new(
        listen: Option<SocketAddr>,
        path: Option<String>,
        request_timeout: Option<Duration>,
        max_request_bytes: Option<usize>,
    ) -> Self {
        Self {
            listen: listen.unwrap_or_else(default_listen),
            path: path.unwrap_or_else(default_path),
            request_timeout: request_timeout.unwrap_or_else(default_request_timeout),
            max_request_bytes: max_request_bytes.unwrap_or_else(default_max_request_bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_fills_in_defaults() {
        let server: Server = serde_yaml::from_str("path: /graphql").unwrap();
        assert_eq!(server.path, "/graphql");
        assert_eq!(server.listen, default_listen());
        assert_eq!(server.request_timeout, Duration::from_secs(30));
        assert_eq!(server.max_request_bytes, 2_000_000);
    }

    #[test]
    fn it_reads_the_request_size_limit() {
        let server: Server = serde_yaml::from_str("max_request_bytes: 1024").unwrap();
        assert_eq!(server.max_request_bytes, 1024);
    }

    #[test]
    fn it_reads_humantime_durations() {
        let server: Server = serde_yaml::from_str("request_timeout: 1m 5s").unwrap();
        assert_eq!(server.request_timeout, Duration::from_secs(65));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_yaml::from_str::<Server>("listne: 0.0.0.0:4000").is_err());
    }
}
