//! Client configuration and endpoint resolution

use std::time::Duration;

use driftfire::network::DEFAULT_PORT;
use thiserror::Error;
use url::Url;

use super::connection::ReconnectPolicy;

/// Origin assumed when nothing is configured.
pub const DEFAULT_ORIGIN: &str = "http://localhost";

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("URL has no host")]
    MissingHost,

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Map the origin a client was served from to the relay endpoint.
///
/// Loopback origins go straight to the dev server port. Anything else
/// talks to `/ws` on the same host, upgrading to `wss` for `https`.
pub fn resolve_endpoint(origin: &Url) -> Result<Url, EndpointError> {
    let host = match origin.host() {
        Some(url::Host::Domain(domain)) => domain.to_string(),
        Some(url::Host::Ipv4(addr)) => addr.to_string(),
        Some(url::Host::Ipv6(addr)) => format!("[{}]", addr),
        None => return Err(EndpointError::MissingHost),
    };

    let loopback = match origin.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
        Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    };
    if loopback {
        return Ok(Url::parse(&format!("ws://localhost:{}", DEFAULT_PORT))?);
    }

    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
    };

    let authority = match origin.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };
    Ok(Url::parse(&format!("{}://{}/ws", scheme, authority))?)
}

// ============================================================================
// CLIENT CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Url,
    /// Minimum gap between outbound transform samples.
    pub send_interval: Duration,
    /// Fraction of the remaining gap remote entities close per tick.
    pub blend: f32,
    /// Sent once after connecting, if set.
    pub label: Option<String>,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            send_interval: Duration::from_millis(50),
            blend: 0.2,
            label: None,
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn from_origin(origin: &Url) -> Result<Self, EndpointError> {
        Ok(Self::new(resolve_endpoint(origin)?))
    }

    /// Load from `DRIFTFIRE_ENDPOINT`, `DRIFTFIRE_ORIGIN` and `DRIFTFIRE_LABEL`.
    pub fn from_env() -> Result<Self, EndpointError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// An explicit endpoint wins over the origin.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EndpointError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("DRIFTFIRE_ENDPOINT") {
            Some(endpoint) => Self::new(Url::parse(endpoint.trim())?),
            None => {
                let origin = lookup("DRIFTFIRE_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
                Self::from_origin(&Url::parse(origin.trim())?)?
            }
        };

        config.label = lookup("DRIFTFIRE_LABEL")
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty());
        Ok(config)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(origin: &str) -> Result<String, EndpointError> {
        resolve_endpoint(&Url::parse(origin).unwrap()).map(|url| url.to_string())
    }

    #[test]
    fn test_loopback_goes_to_dev_port() {
        assert_eq!(resolve("http://localhost:8080").unwrap(), "ws://localhost:3001/");
        assert_eq!(resolve("http://127.0.0.1/").unwrap(), "ws://localhost:3001/");
        assert_eq!(resolve("http://[::1]:5173").unwrap(), "ws://localhost:3001/");
    }

    #[test]
    fn test_remote_origin_uses_ws_path() {
        assert_eq!(resolve("http://game.example.com").unwrap(), "ws://game.example.com/ws");
        assert_eq!(resolve("https://game.example.com/play?x=1").unwrap(), "wss://game.example.com/ws");
        assert_eq!(resolve("https://game.example.com:8443").unwrap(), "wss://game.example.com:8443/ws");
    }

    #[test]
    fn test_bad_origins() {
        assert!(matches!(resolve("ftp://game.example.com"), Err(EndpointError::UnsupportedScheme(s)) if s == "ftp"));
        assert!(matches!(resolve("data:text/plain,hi"), Err(EndpointError::MissingHost)));
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.endpoint.as_str(), "ws://localhost:3001/");
        assert_eq!(config.send_interval, Duration::from_millis(50));
        assert_eq!(config.blend, 0.2);
        assert!(config.label.is_none());
        assert_eq!(config.reconnect.max_attempts, 3);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DRIFTFIRE_ENDPOINT", "ws://10.0.0.5:9000"),
            ("DRIFTFIRE_ORIGIN", "https://ignored.example.com"),
            ("DRIFTFIRE_LABEL", "  Maverick "),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.endpoint.as_str(), "ws://10.0.0.5:9000/");
        assert_eq!(config.label.as_deref(), Some("Maverick"));
    }

    #[test]
    fn test_env_origin() {
        let config = ClientConfig::from_lookup(|key| {
            (key == "DRIFTFIRE_ORIGIN").then(|| "https://play.example.com".to_string())
        })
        .unwrap();
        assert_eq!(config.endpoint.as_str(), "wss://play.example.com/ws");
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = ClientConfig::from_lookup(|key| {
            (key == "DRIFTFIRE_ENDPOINT").then(|| "not a url".to_string())
        });
        assert!(matches!(result, Err(EndpointError::Parse(_))));
    }
}
