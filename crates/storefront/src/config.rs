//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; unset means in-memory stores)
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_LOCAL_CART_DIR` - Directory for the device cart record
//!   (default: .little-sprout)
//! - `CART_TAX_RATE` - Tax rate as a fraction (default: 0.08)
//! - `CART_SHIPPING_FEE` - Flat shipping fee (default: 5.99)
//! - `CART_FREE_SHIPPING_THRESHOLD` - Subtotal for free shipping (default: 50.00)
//! - `CART_MISSING_PRODUCT_POLICY` - `drop` or `unpriced` (default: drop)
//! - `CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use little_sprout_core::{Money, PricingPolicy};

use crate::cart::{CartSettings, MissingProductPolicy};

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Directory holding the device-local cart record
    pub local_cart_dir: PathBuf,
    /// Pricing and hydration settings for the cart
    pub cart: CartSettings,
    /// Lifetime of cached catalog entries
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

type Vars<'a> = &'a dyn Fn(&str) -> Option<String>;

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_vars(vars: Vars<'_>) -> Result<Self, ConfigError> {
        let database_url = get_database_url(vars, "STOREFRONT_DATABASE_URL");
        let host = parse_env_or_default::<IpAddr>(vars, "STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>(vars, "STOREFRONT_PORT", "3000")?;
        let local_cart_dir = PathBuf::from(get_env_or_default(
            vars,
            "STOREFRONT_LOCAL_CART_DIR",
            ".little-sprout",
        ));

        let cart = cart_settings(vars)?;
        let catalog_cache_ttl = Duration::from_secs(parse_env_or_default::<u64>(
            vars,
            "CATALOG_CACHE_TTL_SECS",
            "300",
        )?);

        Ok(Self {
            database_url,
            host,
            port,
            local_cart_dir,
            cart,
            catalog_cache_ttl,
            sentry_dsn: get_optional_env(vars, "SENTRY_DSN"),
            sentry_environment: get_optional_env(vars, "SENTRY_ENVIRONMENT"),
        })
    }

    /// The database URL, for commands that cannot run without one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no database is configured.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("STOREFRONT_DATABASE_URL".to_string()))
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn cart_settings(vars: Vars<'_>) -> Result<CartSettings, ConfigError> {
    let tax_rate = parse_env_or_default::<Decimal>(vars, "CART_TAX_RATE", "0.08")?;
    let shipping_fee = parse_env_or_default::<Decimal>(vars, "CART_SHIPPING_FEE", "5.99")?;
    let threshold =
        parse_env_or_default::<Decimal>(vars, "CART_FREE_SHIPPING_THRESHOLD", "50.00")?;

    let pricing = PricingPolicy::new(tax_rate, Money::new(shipping_fee), Money::new(threshold))
        .map_err(|e| ConfigError::InvalidEnvVar("CART_*".to_string(), e.to_string()))?;
    let missing_product = parse_env_or_default::<MissingProductPolicy>(
        vars,
        "CART_MISSING_PRODUCT_POLICY",
        "drop",
    )?;

    Ok(CartSettings {
        pricing,
        missing_product,
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(vars: Vars<'_>, primary_key: &str) -> Option<SecretString> {
    get_optional_env(vars, primary_key)
        .or_else(|| get_optional_env(vars, "DATABASE_URL"))
        .map(SecretString::from)
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(vars: Vars<'_>, key: &str) -> Option<String> {
    vars(key).filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(vars: Vars<'_>, key: &str, default: &str) -> String {
    get_optional_env(vars, key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(vars: Vars<'_>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    get_env_or_default(vars, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_vars(&|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert!(config.database_url.is_none());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.local_cart_dir, PathBuf::from(".little-sprout"));
        assert_eq!(config.cart.pricing, PricingPolicy::default());
        assert_eq!(config.cart.missing_product, MissingProductPolicy::Drop);
        assert_eq!(config.catalog_cache_ttl, Duration::from_secs(300));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_require_database_url() {
        assert!(matches!(
            load(&[]).unwrap().require_database_url(),
            Err(ConfigError::MissingEnvVar(_))
        ));
        assert!(load(&[("DATABASE_URL", "postgres://fly/db")])
            .unwrap()
            .require_database_url()
            .is_ok());
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[("DATABASE_URL", "postgres://fly/db")]).unwrap();
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://fly/db"
        );

        let config = load(&[
            ("DATABASE_URL", "postgres://fly/db"),
            ("STOREFRONT_DATABASE_URL", "postgres://local/db"),
        ])
        .unwrap();
        assert_eq!(
            config.database_url.unwrap().expose_secret(),
            "postgres://local/db"
        );
    }

    #[test]
    fn test_cart_overrides() {
        let config = load(&[
            ("CART_TAX_RATE", "0.1"),
            ("CART_SHIPPING_FEE", "4.50"),
            ("CART_FREE_SHIPPING_THRESHOLD", "75"),
            ("CART_MISSING_PRODUCT_POLICY", "unpriced"),
        ])
        .unwrap();

        assert_eq!(config.cart.pricing.tax_rate(), Decimal::new(1, 1));
        assert_eq!(config.cart.pricing.shipping_fee(), Money::from_cents(450));
        assert_eq!(
            config.cart.pricing.free_shipping_threshold(),
            Money::from_cents(7500)
        );
        assert_eq!(config.cart.missing_product, MissingProductPolicy::Unpriced);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("STOREFRONT_PORT", "http")]),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "STOREFRONT_PORT"
        ));
        assert!(matches!(
            load(&[("CART_TAX_RATE", "8")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            load(&[("CART_MISSING_PRODUCT_POLICY", "keep")]),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "CART_MISSING_PRODUCT_POLICY"
        ));
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = load(&[("DATABASE_URL", "postgres://admin:hunter2@db/shop")]).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("hunter2"));
    }
}
