// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! typed configuration assembled from them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `IDP_ISSUER_URL` | Identity provider issuer / base URL | Required |
//! | `IDP_CLIENT_ID` | Machine-to-machine client id | Required |
//! | `IDP_CLIENT_SECRET` | Machine-to-machine client secret | Required |
//! | `IDP_MANAGEMENT_AUDIENCE` | Audience for the service credential | `<issuer>api/v2/` |
//! | `IDP_API_AUDIENCE` | Expected `aud` claim of end-user tokens | Not checked |
//! | `IDP_HTTP_TIMEOUT_SECS` | Timeout on every outbound provider call | `10` |
//! | `JWKS_CACHE_TTL_SECS` | Key-set cache TTL | `300` |
//! | `JWKS_MIN_REFRESH_SECS` | Minimum spacing of miss-triggered refetches | `30` |
//! | `CREDENTIAL_RETRY_SECS` | Retry interval while no service credential is held | `30` |
//! | `DATABASE_PATH` | Local record database | `data/jobflex.redb` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const ISSUER_URL_ENV: &str = "IDP_ISSUER_URL";
pub const CLIENT_ID_ENV: &str = "IDP_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "IDP_CLIENT_SECRET";
pub const MANAGEMENT_AUDIENCE_ENV: &str = "IDP_MANAGEMENT_AUDIENCE";
pub const API_AUDIENCE_ENV: &str = "IDP_API_AUDIENCE";
pub const HTTP_TIMEOUT_ENV: &str = "IDP_HTTP_TIMEOUT_SECS";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_MIN_REFRESH_ENV: &str = "JWKS_MIN_REFRESH_SECS";
pub const CREDENTIAL_RETRY_ENV: &str = "CREDENTIAL_RETRY_SECS";
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_JWKS_MIN_REFRESH: Duration = Duration::from_secs(30);
pub const DEFAULT_CREDENTIAL_RETRY: Duration = Duration::from_secs(30);
pub const DEFAULT_DATABASE_PATH: &str = "data/jobflex.redb";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Path of the management API, relative to the issuer.
const MANAGEMENT_API_PATH: &str = "api/v2/";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "" => Ok(LogFormat::Pretty),
            other => Err(ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                reason: format!("expected `json` or `pretty`, got `{other}`"),
            }),
        }
    }
}

/// Certificate and key files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Identity provider settings shared by the key resolver, the verifier, the
/// credential manager and the management client.
#[derive(Clone)]
pub struct IdpConfig {
    /// Issuer URL, always ending in `/`. Also the expected `iss` claim.
    pub issuer: Url,
    pub client_id: String,
    pub client_secret: String,
    pub management_audience: String,
    pub api_audience: Option<String>,
    pub http_timeout: Duration,
    pub jwks_cache_ttl: Duration,
    pub jwks_min_refresh: Duration,
    pub credential_retry: Duration,
}

impl IdpConfig {
    /// Create a configuration with default timings for the given issuer.
    pub fn new(
        issuer: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let management_audience = format!("{}{MANAGEMENT_API_PATH}", issuer.as_str());
        Self {
            issuer,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            management_audience,
            api_audience: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            jwks_cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            jwks_min_refresh: DEFAULT_JWKS_MIN_REFRESH,
            credential_retry: DEFAULT_CREDENTIAL_RETRY,
        }
    }

    /// `<issuer>.well-known/jwks.json`
    pub fn jwks_url(&self) -> Url {
        join(&self.issuer, ".well-known/jwks.json")
    }

    /// `<issuer>oauth/token`
    pub fn token_url(&self) -> Url {
        join(&self.issuer, "oauth/token")
    }

    /// `<issuer>api/v2/`
    pub fn management_base_url(&self) -> Url {
        join(&self.issuer, MANAGEMENT_API_PATH)
    }
}

// The client secret never reaches logs.
impl fmt::Debug for IdpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdpConfig")
            .field("issuer", &self.issuer.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("management_audience", &self.management_audience)
            .field("api_audience", &self.api_audience)
            .field("http_timeout", &self.http_timeout)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_min_refresh", &self.jwks_min_refresh)
            .field("credential_retry", &self.credential_retry)
            .finish()
    }
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
    pub idp: IdpConfig,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let issuer = parse_issuer(&required(ISSUER_URL_ENV)?)?;
        let mut idp = IdpConfig::new(
            issuer,
            required(CLIENT_ID_ENV)?,
            required(CLIENT_SECRET_ENV)?,
        );
        if let Some(audience) = get(MANAGEMENT_AUDIENCE_ENV) {
            idp.management_audience = audience;
        }
        idp.api_audience = get(API_AUDIENCE_ENV);
        idp.http_timeout = seconds(HTTP_TIMEOUT_ENV, get(HTTP_TIMEOUT_ENV), DEFAULT_HTTP_TIMEOUT)?;
        idp.jwks_cache_ttl =
            seconds(JWKS_CACHE_TTL_ENV, get(JWKS_CACHE_TTL_ENV), DEFAULT_JWKS_CACHE_TTL)?;
        idp.jwks_min_refresh = seconds(
            JWKS_MIN_REFRESH_ENV,
            get(JWKS_MIN_REFRESH_ENV),
            DEFAULT_JWKS_MIN_REFRESH,
        )?;
        idp.credential_retry = seconds(
            CREDENTIAL_RETRY_ENV,
            get(CREDENTIAL_RETRY_ENV),
            DEFAULT_CREDENTIAL_RETRY,
        )?;
        if idp.http_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: HTTP_TIMEOUT_ENV,
                reason: "timeout must be greater than zero".to_string(),
            });
        }

        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                reason: format!("`{raw}` is not a port number"),
            })?,
            None => DEFAULT_PORT,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(raw) => LogFormat::parse(&raw)?,
            None => LogFormat::default(),
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database_path: PathBuf::from(
                get(DATABASE_PATH_ENV).unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            ),
            tls,
            log_format,
            idp,
        })
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse the issuer, defaulting the scheme to https and forcing a trailing
/// slash so relative endpoint joins keep the full path.
pub fn parse_issuer(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| ConfigError::Invalid {
        name: ISSUER_URL_ENV,
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::Invalid {
            name: ISSUER_URL_ENV,
            reason: "issuer must be a hierarchical URL".to_string(),
        });
    }
    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn join(base: &Url, path: &str) -> Url {
    // `base` always ends in `/` and `path` is a fixed relative literal.
    base.join(path).unwrap_or_else(|_| base.clone())
}

fn seconds(
    name: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid {
                name,
                reason: format!("`{raw}` is not a whole number of seconds"),
            }),
        None => Ok(default),
    }
}
