use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use super::KvStore;
use crate::error::MqError;

pub struct RedisKv {
    conn: MultiplexedConnection,
}

impl RedisKv {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, MqError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, MqError> {
        let mut conn = self.conn.clone();
        let count: u64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }

    async fn delete(&self, key: &str) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<u64, MqError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let added: u64 = redis::cmd("SADD")
            .arg(key)
            .arg(members)
            .query_async(&mut conn)
            .await?;
        Ok(added)
    }

    async fn set_sample(&self, key: &str, count: usize) -> Result<Vec<String>, MqError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        // A positive count makes SRANDMEMBER return distinct members.
        let sampled: Vec<String> = redis::cmd("SRANDMEMBER")
            .arg(key)
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(sampled)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, MqError> {
        let mut conn = self.conn.clone();
        let found: bool = redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(found)
    }

    async fn set_len(&self, key: &str) -> Result<u64, MqError> {
        let mut conn = self.conn.clone();
        let len: u64 = redis::cmd("SCARD").arg(key).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, MqError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), MqError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("HDEL")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn hash_len(&self, key: &str) -> Result<u64, MqError> {
        let mut conn = self.conn.clone();
        let len: u64 = redis::cmd("HLEN").arg(key).query_async(&mut conn).await?;
        Ok(len)
    }
}
