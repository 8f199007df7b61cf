/// Post Service Library
///
/// Owns the post aggregate (a post and its like count) and keeps the
/// PostgreSQL store, the Redis cache and the post event stream consistent
/// with each other.
///
/// # Modules
///
/// - `services`: list/get/create/like orchestration
/// - `db`: PostgreSQL store and repositories
/// - `cache`: Redis read-through cache with write invalidation
/// - `events`: post events and the Redis Pub/Sub event bus
/// - `grpc`: tonic server for the PostService RPCs
/// - `models`: post and like records
/// - `error`: Error types and gRPC status mapping
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod grpc;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};
