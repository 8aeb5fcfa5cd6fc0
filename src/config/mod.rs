//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → EnvOverrides (APP_ENV, PORT, WEBHOOK_SECRET)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc to all stages
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no per-request reconstruction
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, EnvOverrides};
pub use schema::{
    AppConfig, AssetsConfig, BodyConfig, CorsConfig, CspDirective, Environment, HeaderConfig,
    ListenerConfig, ObservabilityConfig, ParamsConfig, PaymentConfig, RateLimitConfig,
    SecurityConfig, TimeoutConfig,
};
