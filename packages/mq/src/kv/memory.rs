use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use rand::seq::IteratorRandom;

use super::KvStore;
use crate::error::MqError;

#[derive(Debug, Clone)]
struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process key-value store. Expired strings are dropped lazily on access.
#[derive(Default)]
pub struct MemoryKv {
    strings: DashMap<String, StringEntry>,
    sets: DashMap<String, HashSet<String>>,
    hashes: DashMap<String, HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_string(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = self
            .strings
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));
        match value {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.strings.remove_if(key, |_, entry| !entry.is_live(now));
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, MqError> {
        Ok(self.live_string(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), MqError> {
        self.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, MqError> {
        Ok(self.live_string(key).is_some()
            || self.sets.get(key).is_some_and(|set| !set.is_empty())
            || self.hashes.get(key).is_some_and(|hash| !hash.is_empty()))
    }

    async fn delete(&self, key: &str) -> Result<(), MqError> {
        self.strings.remove(key);
        self.sets.remove(key);
        self.hashes.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<u64, MqError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut set = self.sets.entry(key.to_string()).or_default();
        let added = members
            .iter()
            .filter(|member| set.insert((*member).clone()))
            .count();
        Ok(added as u64)
    }

    async fn set_sample(&self, key: &str, count: usize) -> Result<Vec<String>, MqError> {
        Ok(self
            .sets
            .get(key)
            .map(|set| set.iter().cloned().choose_multiple(&mut rand::rng(), count))
            .unwrap_or_default())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), MqError> {
        if let Some(mut set) = self.sets.get_mut(key) {
            set.remove(member);
        }
        self.sets.remove_if(key, |_, set| set.is_empty());
        Ok(())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, MqError> {
        Ok(self.sets.get(key).is_some_and(|set| set.contains(member)))
    }

    async fn set_len(&self, key: &str) -> Result<u64, MqError> {
        Ok(self.sets.get(key).map_or(0, |set| set.len() as u64))
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, MqError> {
        Ok(self
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned()))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), MqError> {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), MqError> {
        if let Some(mut hash) = self.hashes.get_mut(key) {
            hash.remove(field);
        }
        self.hashes.remove_if(key, |_, hash| hash.is_empty());
        Ok(())
    }

    async fn hash_len(&self, key: &str) -> Result<u64, MqError> {
        Ok(self.hashes.get(key).map_or(0, |hash| hash.len() as u64))
    }
}
