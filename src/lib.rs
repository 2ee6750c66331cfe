//! TodoMVC API: a generic REST resource mapper over SQLite with HTTP response caching.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use cache::{make_cache_key, CacheStore, CachedResponse, InMemoryCache};
pub use config::{CacheBackend, Mode, Settings};
pub use error::{AppError, ConfigError};
pub use model::{Entity, EntitySchema, Todo};
pub use response::{jsonify, success_many, success_one};
pub use routes::{app, common_routes, entity_routes};
pub use service::CrudService;
pub use state::AppState;
