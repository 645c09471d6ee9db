use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::utils::FilterEscaping;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Transport security for the directory connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    None,
    /// LDAP over TLS (`ldaps://`)
    Ssl,
    /// StartTLS upgrade on a plain connection
    StartTls,
}

impl FromStr for EncryptionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(EncryptionMode::None),
            "ssl" | "ldaps" => Ok(EncryptionMode::Ssl),
            "tls" | "starttls" => Ok(EncryptionMode::StartTls),
            other => Err(format!("expected none, ssl or tls, got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LdapConfig {
    /// Host name without scheme
    pub host: String,
    pub port: u16,
    pub base_dn: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub encryption: EncryptionMode,
    pub ignore_certificate: bool,
    pub timeout: Option<Duration>,
    pub filter_escaping: FilterEscaping,
}

impl LdapConfig {
    pub fn url(&self) -> String {
        let scheme = match self.encryption {
            EncryptionMode::Ssl => "ldaps",
            EncryptionMode::None | EncryptionMode::StartTls => "ldap",
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: SocketAddr,
    pub ldap: LdapConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or("PORT", var("PORT"), 8000u16)?;
        let bind_address = format!("{}:{}", host, port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "HOST",
                reason: e.to_string(),
            })?;

        let raw_host = required("LDAP_HOST")?;
        let (ldap_host, scheme_encryption) = split_scheme(&raw_host);
        let encryption = match var("LDAP_ENCRYPTION") {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                name: "LDAP_ENCRYPTION",
                reason,
            })?,
            None => scheme_encryption,
        };
        let default_port = if encryption == EncryptionMode::Ssl { 636 } else { 389 };
        let ldap_port = parse_or("LDAP_PORT", var("LDAP_PORT"), default_port)?;

        let ignore_certificate = var("LDAP_IGNORE_CERT")
            .map(|v| parse_flag("LDAP_IGNORE_CERT", &v))
            .transpose()?
            .unwrap_or(false);

        let timeout = var("LDAP_TIMEOUT_SECS")
            .map(|v| parse_or("LDAP_TIMEOUT_SECS", Some(v), 0u64))
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let filter_escaping = match var("LDAP_FILTER_ESCAPING") {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                name: "LDAP_FILTER_ESCAPING",
                reason,
            })?,
            None => FilterEscaping::default(),
        };

        Ok(Self {
            bind_address,
            ldap: LdapConfig {
                host: ldap_host,
                port: ldap_port,
                base_dn: required("LDAP_BASE_DN")?,
                bind_dn: required("LDAP_BIND_DN")?,
                bind_password: required("LDAP_BIND_PASSWORD")?,
                encryption,
                ignore_certificate,
                timeout,
                filter_escaping,
            },
        })
    }
}

/// Strips an `ldap://` or `ldaps://` prefix and reports the encryption it implies.
fn split_scheme(host: &str) -> (String, EncryptionMode) {
    let trimmed = host.trim().trim_end_matches('/');
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("ldaps://") {
        (trimmed["ldaps://".len()..].to_string(), EncryptionMode::Ssl)
    } else if lower.starts_with("ldap://") {
        (trimmed["ldap://".len()..].to_string(), EncryptionMode::None)
    } else {
        (trimmed.to_string(), EncryptionMode::None)
    }
}

fn parse_or<T: FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}
