use serde::Deserialize;

/// Top-level server configuration, loaded from `buzzline.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub trivia: TriviaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            trivia: TriviaConfig::default(),
        }
    }
}

/// Upstream trivia provider section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriviaConfig {
    /// When false, questions come exclusively from the embedded bank.
    pub enabled: bool,
    pub base_url: String,
    /// Per-request timeout for provider calls.
    pub timeout_secs: u64,
    /// Fall back to the embedded bank after repeated provider failures.
    pub fallback_to_local: bool,
}

impl Default for TriviaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://the-trivia-api.com/v2".to_string(),
            timeout_secs: 4,
            fallback_to_local: true,
        }
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on unusable values.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.trivia.timeout_secs == 0 {
            tracing::error!("trivia.timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.trivia.enabled && self.trivia.base_url.is_empty() {
            tracing::error!("trivia.base_url must be set when the provider is enabled");
            std::process::exit(1);
        }
    }

    /// Load config from `buzzline.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("buzzline.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from buzzline.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse buzzline.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No buzzline.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("BUZZLINE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(url) = std::env::var("BUZZLINE_TRIVIA_URL")
            && !url.is_empty()
        {
            config.trivia.base_url = url;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert!(cfg.trivia.enabled);
        assert!(cfg.trivia.fallback_to_local);
        assert_eq!(cfg.trivia.timeout_secs, 4);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
listen_addr = "127.0.0.1:9090"
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9090");
        assert!(cfg.trivia.enabled);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
listen_addr = "0.0.0.0:3000"

[trivia]
enabled = false
base_url = "http://localhost:9000/v2"
timeout_secs = 2
fallback_to_local = false
"#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
        assert!(!cfg.trivia.enabled);
        assert_eq!(cfg.trivia.base_url, "http://localhost:9000/v2");
        assert_eq!(cfg.trivia.timeout_secs, 2);
        assert!(!cfg.trivia.fallback_to_local);
    }

    #[test]
    fn validate_rejects_invalid_addr() {
        let cfg = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        // validate() calls process::exit, so test the underlying check
        assert!(cfg.listen_addr.parse::<std::net::SocketAddr>().is_err());
    }
}
