mod memory;
mod redis;

pub use self::memory::MemoryKv;
pub use self::redis::RedisKv;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::MqError;

/// The subset of Redis data structures the pipeline relies on: strings with
/// optional expiry, sets and hashes.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, MqError>;

    /// Set a string value, replacing any previous value and expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), MqError>;

    async fn exists(&self, key: &str) -> Result<bool, MqError>;

    async fn delete(&self, key: &str) -> Result<(), MqError>;

    /// Add members to a set; returns how many were new.
    async fn set_add(&self, key: &str, members: &[String]) -> Result<u64, MqError>;

    /// Up to `count` distinct arbitrary members, left in place.
    async fn set_sample(&self, key: &str, count: usize) -> Result<Vec<String>, MqError>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), MqError>;

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, MqError>;

    async fn set_len(&self, key: &str) -> Result<u64, MqError>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, MqError>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), MqError>;

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), MqError>;

    async fn hash_len(&self, key: &str) -> Result<u64, MqError>;
}
