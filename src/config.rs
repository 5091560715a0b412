//! Process configuration, read once from the environment at startup.
//!
//! | variable | default |
//! |---|---|
//! | `SAMPLE_APP_HTTP_PORT` | `7878` |
//! | `SAMPLE_APP_BIND` | `0.0.0.0` |
//! | `SAMPLE_APP_DB_FOLDER` | `dbs` |
//! | `SAMPLE_APP_USER_STORE` | `parquet` (`memory` for throwaway runs) |
//! | `SAMPLE_APP_SESSION_SECRET` | random per process (sessions die on restart) |
//! | `SAMPLE_APP_SECURE_COOKIES` | `true` |

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result, anyhow, bail};

use crate::session::MIN_SECRET_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStoreKind {
    Parquet,
    Memory,
}

#[derive(Clone)]
pub struct Config {
    pub http_port: u16,
    pub bind: IpAddr,
    pub db_folder: String,
    pub user_store: UserStoreKind,
    pub session_secret: Vec<u8>,
    /// False when the secret was generated for this process only.
    pub session_secret_configured: bool,
    pub secure_cookies: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_port", &self.http_port)
            .field("bind", &self.bind)
            .field("db_folder", &self.db_folder)
            .field("user_store", &self.user_store)
            .field("session_secret_configured", &self.session_secret_configured)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http_port = match get("SAMPLE_APP_HTTP_PORT") {
            Some(v) => v.trim().parse::<u16>().with_context(|| format!("SAMPLE_APP_HTTP_PORT is not a port: {:?}", v))?,
            None => 7878,
        };
        let bind = match get("SAMPLE_APP_BIND") {
            Some(v) => v.trim().parse::<IpAddr>().with_context(|| format!("SAMPLE_APP_BIND is not an IP address: {:?}", v))?,
            None => IpAddr::from([0, 0, 0, 0]),
        };
        let db_folder = get("SAMPLE_APP_DB_FOLDER").unwrap_or_else(|| "dbs".to_string());
        let user_store = match get("SAMPLE_APP_USER_STORE").as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            None => UserStoreKind::Parquet,
            Some(s) if s == "parquet" => UserStoreKind::Parquet,
            Some(s) if s == "memory" => UserStoreKind::Memory,
            Some(other) => bail!("SAMPLE_APP_USER_STORE must be 'parquet' or 'memory', got {:?}", other),
        };
        let (session_secret, session_secret_configured) = match get("SAMPLE_APP_SESSION_SECRET") {
            Some(s) => {
                if s.len() < MIN_SECRET_LEN {
                    bail!("SAMPLE_APP_SESSION_SECRET must be at least {} bytes", MIN_SECRET_LEN);
                }
                (s.into_bytes(), true)
            }
            None => {
                let generated = crate::security::random_token(48).map_err(|e| anyhow!("generating session secret: {}", e))?;
                (generated.into_bytes(), false)
            }
        };
        let secure_cookies = match get("SAMPLE_APP_SECURE_COOKIES") {
            Some(v) => parse_bool(&v).ok_or_else(|| anyhow!("SAMPLE_APP_SECURE_COOKIES must be true/false, got {:?}", v))?,
            None => true,
        };
        Ok(Self { http_port, bind, db_folder, user_store, session_secret, session_secret_configured, secure_cookies })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.http_port)
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> Result<Config> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| m.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = cfg(&[]).unwrap();
        assert_eq!(c.http_port, 7878);
        assert_eq!(c.db_folder, "dbs");
        assert_eq!(c.user_store, UserStoreKind::Parquet);
        assert!(c.secure_cookies);
        assert!(!c.session_secret_configured);
        assert!(c.session_secret.len() >= MIN_SECRET_LEN);
        assert_eq!(c.socket_addr().to_string(), "0.0.0.0:7878");
    }

    #[test]
    fn overrides() {
        let secret = "s".repeat(40);
        let c = cfg(&[
            ("SAMPLE_APP_HTTP_PORT", "9000"),
            ("SAMPLE_APP_BIND", "127.0.0.1"),
            ("SAMPLE_APP_USER_STORE", "Memory"),
            ("SAMPLE_APP_SESSION_SECRET", secret.as_str()),
            ("SAMPLE_APP_SECURE_COOKIES", "off"),
        ]).unwrap();
        assert_eq!(c.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(c.user_store, UserStoreKind::Memory);
        assert_eq!(c.session_secret, secret.as_bytes());
        assert!(c.session_secret_configured);
        assert!(!c.secure_cookies);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(cfg(&[("SAMPLE_APP_HTTP_PORT", "http")]).is_err());
        assert!(cfg(&[("SAMPLE_APP_SESSION_SECRET", "short")]).is_err());
        assert!(cfg(&[("SAMPLE_APP_USER_STORE", "postgres")]).is_err());
        assert!(cfg(&[("SAMPLE_APP_SECURE_COOKIES", "maybe")]).is_err());
    }

    #[test]
    fn debug_omits_secret() {
        let c = cfg(&[("SAMPLE_APP_SESSION_SECRET", "super-secret-value-that-is-long-enough")]).unwrap();
        assert!(!format!("{:?}", c).contains("super-secret"));
    }
}
