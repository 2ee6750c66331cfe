//! Settings validation: consistency checks the individual parsers cannot make.

use crate::config::{CacheBackend, Settings};
use crate::error::ConfigError;
use axum::http::Method;

pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.database_url.trim().is_empty() {
        return Err(ConfigError::Missing("DATABASE_URL"));
    }
    if !settings.database_url.starts_with("sqlite:") {
        return Err(ConfigError::Invalid {
            key: "DATABASE_URL",
            value: settings.database_url.clone(),
        });
    }
    if settings.results_per_page == 0 {
        return Err(ConfigError::Validation("API_RESULTS_PER_PAGE must be positive".into()));
    }
    if settings.max_results_per_page < settings.results_per_page {
        return Err(ConfigError::Validation(format!(
            "API_MAX_RESULTS_PER_PAGE ({}) is below API_RESULTS_PER_PAGE ({})",
            settings.max_results_per_page, settings.results_per_page
        )));
    }
    if !settings.allows(&Method::GET) {
        return Err(ConfigError::Validation("API_METHODS must include GET".into()));
    }
    if let CacheBackend::Memcached {
        servers,
        username,
        password,
    } = &settings.cache
    {
        if servers.is_empty() {
            return Err(ConfigError::Missing("MEMCACHE_SERVERS"));
        }
        // The memcached client speaks the unauthenticated ASCII protocol only.
        if let Some(user) = username {
            return Err(ConfigError::Invalid {
                key: "MEMCACHE_USERNAME",
                value: user.clone(),
            });
        }
        if password.is_some() {
            return Err(ConfigError::Invalid {
                key: "MEMCACHE_PASSWORD",
                value: "<redacted>".into(),
            });
        }
    }
    Ok(())
}
