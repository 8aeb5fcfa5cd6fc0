//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the tour server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Runtime mode. Toggles the access logger and error verbosity.
    pub environment: Environment,

    /// Listener configuration (bind address, proxy trust).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Request body ceilings.
    pub body: BodyConfig,

    /// Security response headers.
    pub security: SecurityConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Query parameter handling.
    pub params: ParamsConfig,

    /// Static assets and views.
    pub assets: AssetsConfig,

    /// Payment provider webhook settings.
    pub payments: PaymentConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Runtime mode of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Take the client address from `X-Forwarded-For` (running behind a proxy).
    pub trust_proxy: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            trust_proxy: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Path prefix the limiter is mounted on.
    pub mount_path: String,

    /// Maximum requests per client within one window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Interval between sweeps of expired entries, in seconds.
    pub sweep_interval_secs: u64,

    /// Plain-text body of a rejection.
    pub message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mount_path: "/api".to_string(),
            max_requests: 100,
            window_secs: 60 * 60,
            sweep_interval_secs: 60,
            message: "Too many request by this IP, please try again in an hour!".to_string(),
        }
    }
}

/// Request body ceilings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum size of a JSON or form body, in bytes.
    pub limit_bytes: usize,

    /// Maximum size of the raw webhook body, in bytes.
    pub raw_limit_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            limit_bytes: 10 * 1024,
            raw_limit_bytes: 100 * 1024,
        }
    }
}

/// One Content-Security-Policy directive.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CspDirective {
    /// Directive name, e.g. `script-src`.
    pub name: String,

    /// Allowed sources, emitted verbatim.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl CspDirective {
    fn new(name: &str, sources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A fixed response header.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HeaderConfig {
    pub name: String,
    pub value: String,
}

impl HeaderConfig {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Security response header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Content-Security-Policy directives, in emission order.
    pub csp: Vec<CspDirective>,

    /// Additional hardening headers.
    pub headers: Vec<HeaderConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            csp: vec![
                CspDirective::new("default-src", &["*"]),
                CspDirective::new("base-uri", &["'self'"]),
                CspDirective::new("connect-src", &["*"]),
                CspDirective::new("font-src", &["'self'", "https:", "data:"]),
                CspDirective::new("object-src", &["'none'"]),
                CspDirective::new(
                    "script-src",
                    &[
                        "'self'",
                        "https:",
                        "blob:",
                        "*",
                        "unsafe-inline",
                        "js.stripe.com/v3/",
                        "https://api.mapbox.com/mapbox-gl-js/v1.12.0/mapbox-gl.js",
                        "https://js.stripe.com/v3",
                    ],
                ),
                CspDirective::new(
                    "style-src",
                    &[
                        "'self'",
                        "https:",
                        "unsafe-inline",
                        "'sha256-CwE3Bg0VYQOIdNAkbB/Btdkhul49qZuwgNCMPgNY5zw='",
                    ],
                ),
            ],
            headers: vec![
                HeaderConfig::new("x-dns-prefetch-control", "off"),
                HeaderConfig::new("x-frame-options", "SAMEORIGIN"),
                HeaderConfig::new("strict-transport-security", "max-age=15552000; includeSubDomains"),
                HeaderConfig::new("x-download-options", "noopen"),
                HeaderConfig::new("x-content-type-options", "nosniff"),
                HeaderConfig::new("x-permitted-cross-domain-policies", "none"),
                HeaderConfig::new("referrer-policy", "no-referrer"),
                HeaderConfig::new("x-xss-protection", "0"),
            ],
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

/// Query parameter handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParamsConfig {
    /// Parameters that keep every supplied value.
    pub whitelist: Vec<String>,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            whitelist: [
                "duration",
                "ratingsAverage",
                "ratingsQuantity",
                "maxGroupSize",
                "difficulty",
                "price",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Static assets and views.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory served for unmatched GET requests.
    pub static_dir: String,

    /// Site name used in page titles.
    pub site_name: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            static_dir: "public".to_string(),
            site_name: "Natours".to_string(),
        }
    }
}

/// Payment provider webhook settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Shared signing secret. Empty disables the webhook.
    pub webhook_secret: String,

    /// Header carrying the signature.
    pub signature_header: String,

    /// Maximum accepted age of a signed payload, in seconds.
    pub tolerance_secs: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            signature_header: "stripe-signature".to_string(),
            tolerance_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
