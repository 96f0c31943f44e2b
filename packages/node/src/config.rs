//! Node configuration, populated from environment variables.

use std::net::SocketAddr;

/// Runtime configuration for a Kinship node.
///
/// All fields are populated from environment variables with sensible
/// defaults, so a node can be started with zero configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `KINSHIP_BIND` | `0.0.0.0:3000` | TCP socket address to listen on |
/// | `KINSHIP_DB` | (absent = in-memory) | Path to the SQLite database file |
/// | `KINSHIP_TOKEN_TTL_SECS` | `86400` | Lifetime of issued access tokens |
/// | `KINSHIP_RATE_LIMIT_PER_MINUTE` | `0` (disabled) | Per-IP request cap |
/// | `KINSHIP_MAX_COMMIT_ATTEMPTS` | `3` | Attempts per graph mutation before reporting a conflict |
/// | `KINSHIP_SECURE_COOKIES` | `false` | Mark the `accessToken` cookie `Secure` |
/// | `KINSHIP_PASSWORD_MEMORY_KIB` | `19456` | Argon2id memory cost per password hash |
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Path to the SQLite database file.
    /// `None` means use an in-memory store (data is lost on restart).
    pub db_path: Option<String>,

    /// How long an access token stays valid, in seconds.
    pub token_ttl_secs: u64,

    /// Maximum requests per minute per client IP. `0` disables limiting.
    pub rate_limit_per_minute: u32,

    /// How many times a graph mutation is re-run against fresh state when a
    /// concurrent writer changed one of its documents first.
    pub max_commit_attempts: u32,

    /// Whether the `accessToken` cookie carries the `Secure` attribute.
    pub secure_cookies: bool,

    /// Argon2id memory cost, in KiB, for newly hashed passwords.
    pub password_memory_kib: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            db_path: None,
            token_ttl_secs: 86_400,
            rate_limit_per_minute: 0,
            max_commit_attempts: 3,
            secure_cookies: false,
            password_memory_kib: 19_456,
        }
    }
}

impl NodeConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr: SocketAddr = std::env::var("KINSHIP_BIND")
            .unwrap_or_else(|_| "0.0.0.0:3000".into())
            .parse()
            .expect("KINSHIP_BIND must be a valid socket address (e.g. 0.0.0.0:3000)");

        Self {
            bind_addr,
            db_path: std::env::var("KINSHIP_DB").ok(),
            token_ttl_secs: env_parse("KINSHIP_TOKEN_TTL_SECS").unwrap_or(defaults.token_ttl_secs),
            rate_limit_per_minute: env_parse("KINSHIP_RATE_LIMIT_PER_MINUTE")
                .unwrap_or(defaults.rate_limit_per_minute),
            max_commit_attempts: env_parse::<u32>("KINSHIP_MAX_COMMIT_ATTEMPTS")
                .unwrap_or(defaults.max_commit_attempts)
                .max(1),
            secure_cookies: env_parse("KINSHIP_SECURE_COOKIES").unwrap_or(defaults.secure_cookies),
            password_memory_kib: env_parse("KINSHIP_PASSWORD_MEMORY_KIB")
                .unwrap_or(defaults.password_memory_kib),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_zero_config() {
        let c = NodeConfig::default();
        assert_eq!(c.bind_addr.port(), 3000);
        assert!(c.db_path.is_none());
        assert_eq!(c.rate_limit_per_minute, 0);
        assert_eq!(c.max_commit_attempts, 3);
        assert_eq!(c.password_memory_kib, 19_456);
    }

    #[test]
    fn env_parse_ignores_garbage() {
        std::env::set_var("KINSHIP_TEST_ENV_PARSE", " 64 ");
        assert_eq!(env_parse::<u32>("KINSHIP_TEST_ENV_PARSE"), Some(64));
        std::env::set_var("KINSHIP_TEST_ENV_PARSE", "lots");
        assert_eq!(env_parse::<u32>("KINSHIP_TEST_ENV_PARSE"), None);
        std::env::remove_var("KINSHIP_TEST_ENV_PARSE");
    }
}
