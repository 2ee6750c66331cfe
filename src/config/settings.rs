//! Runtime settings loaded from the environment.
//!
//! `APP_CONFIG` picks a profile (`production`, `development`, `test`) that supplies defaults;
//! individual variables override them.

use crate::config::validate;
use crate::error::ConfigError;
use axum::http::Method;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Production,
    Development,
    Test,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "development" | "dev" => Ok(Mode::Development),
            "test" | "testing" => Ok(Mode::Test),
            _ => Err(ConfigError::Invalid {
                key: "APP_CONFIG",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheBackend {
    /// Process-local map.
    Simple,
    Memcached {
        servers: Vec<String>,
        username: Option<String>,
        password: Option<String>,
    },
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub mode: Mode,
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub testing: bool,
    pub cache: CacheBackend,
    /// Seconds; 0 disables response caching and emits no-store headers.
    pub cache_max_age: u64,
    pub methods: Vec<Method>,
    pub results_per_page: u32,
    pub max_results_per_page: u32,
    pub allow_patch_many: bool,
    pub allow_delete_many: bool,
    pub server_name: Option<String>,
    pub force_ssl: bool,
    pub json_indent: usize,
    pub body_limit: usize,
}

pub const DEFAULT_PORT: u16 = 5000;

fn default_methods() -> Vec<Method> {
    vec![Method::GET, Method::POST, Method::DELETE, Method::PATCH, Method::PUT]
}

impl Settings {
    /// Profile defaults, before any environment overrides.
    pub fn for_mode(mode: Mode) -> Self {
        let (database_url, host, debug, testing) = match mode {
            Mode::Production => ("sqlite://todomvc_api.db", "0.0.0.0", false, false),
            Mode::Development => ("sqlite://app.db", "127.0.0.1", true, false),
            Mode::Test => ("sqlite::memory:", "127.0.0.1", true, true),
        };
        Settings {
            mode,
            database_url: database_url.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            debug,
            testing,
            cache: CacheBackend::Simple,
            cache_max_age: 0,
            methods: default_methods(),
            results_per_page: 32,
            max_results_per_page: 1024,
            allow_patch_many: true,
            allow_delete_many: true,
            server_name: None,
            force_ssl: false,
            json_indent: 2,
            body_limit: 1024 * 1024,
        }
    }

    pub fn test() -> Self {
        Self::for_mode(Mode::Test)
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Read settings through `lookup` (variable name -> value), then validate them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match lookup("APP_CONFIG") {
            Some(m) => m.parse()?,
            None => Mode::Development,
        };
        let mut s = Self::for_mode(mode);

        if let Some(v) = lookup("DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = lookup("HOST") {
            s.host = v;
        }
        s.port = parse_or(&lookup, "PORT", s.port)?;
        s.debug = parse_bool_or(&lookup, "DEBUG", s.debug)?;
        s.cache_max_age = parse_or(&lookup, "CACHE_MAX_AGE", s.cache_max_age)?;
        s.results_per_page = parse_or(&lookup, "API_RESULTS_PER_PAGE", s.results_per_page)?;
        s.max_results_per_page =
            parse_or(&lookup, "API_MAX_RESULTS_PER_PAGE", s.max_results_per_page)?;
        s.allow_patch_many = parse_bool_or(&lookup, "API_ALLOW_PATCH_MANY", s.allow_patch_many)?;
        s.allow_delete_many =
            parse_bool_or(&lookup, "API_ALLOW_DELETE_MANY", s.allow_delete_many)?;
        s.force_ssl = parse_bool_or(&lookup, "FORCE_SSL", s.force_ssl)?;
        s.json_indent = parse_or(&lookup, "JSON_INDENT", s.json_indent)?;
        s.body_limit = parse_or(&lookup, "BODY_LIMIT", s.body_limit)?;
        s.server_name = lookup("SERVER_NAME");

        if let Some(v) = lookup("API_METHODS") {
            s.methods = parse_methods(&v)?;
        }

        let cache_type = lookup("CACHE_TYPE").map(|v| v.to_ascii_lowercase());
        s.cache = match cache_type.as_deref() {
            None | Some("simple") => CacheBackend::Simple,
            Some("memcached") | Some("saslmemcached") => {
                let servers = lookup("MEMCACHE_SERVERS")
                    .or_else(|| lookup("MEMCACHIER_SERVERS"))
                    .map(|v| split_list(&v))
                    .unwrap_or_default();
                CacheBackend::Memcached {
                    servers,
                    username: lookup("MEMCACHE_USERNAME")
                        .or_else(|| lookup("MEMCACHIER_USERNAME")),
                    password: lookup("MEMCACHE_PASSWORD")
                        .or_else(|| lookup("MEMCACHIER_PASSWORD")),
                }
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "CACHE_TYPE",
                    value: other.to_string(),
                })
            }
        };

        validate(&s)?;
        Ok(s)
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Plain-HTTP requests are redirected only outside debug/test and when a public name or
    /// `FORCE_SSL` is configured.
    pub fn redirects_to_https(&self) -> bool {
        !self.debug && !self.testing && (self.force_ssl || self.server_name.is_some())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_methods(v: &str) -> Result<Vec<Method>, ConfigError> {
    split_list(v)
        .into_iter()
        .map(|m| {
            Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| ConfigError::Invalid {
                key: "API_METHODS",
                value: m.clone(),
            })
        })
        .collect()
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: v }),
        },
    }
}
