//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod hmac_signature_verifier;
mod http_cmdb_client;
mod in_memory_asset_lock_coordinator;
mod in_memory_cmdb_client;
mod in_memory_failure_repository;
mod postgres_failure_repository;
mod redis_asset_lock_coordinator;

pub use hmac_signature_verifier::HmacSha256SignatureVerifier;
pub use http_cmdb_client::{CmdbAuth, HttpCmdbClient, HttpCmdbClientConfig};
pub use in_memory_asset_lock_coordinator::InMemoryAssetLockCoordinator;
pub use in_memory_cmdb_client::{CmdbCallCounts, InMemoryCmdbClient};
pub use in_memory_failure_repository::InMemoryFailureRepository;
pub use postgres_failure_repository::PostgresFailureRepository;
pub use redis_asset_lock_coordinator::RedisAssetLockCoordinator;
