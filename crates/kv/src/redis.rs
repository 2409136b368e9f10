// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed [`KvStore`], the production adapter selected when
//! `KV_BACKEND=redis` (§6). Uses a `deadpool-redis` connection pool so the
//! daemon's many concurrent callers (rules engine, breaker, queue, re-verify
//! coordinator) share a small number of connections.

use crate::{KvError, KvStore, MultiSetEntry};
use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use std::time::Duration;

pub struct RedisKv {
    pool: Pool,
}

impl RedisKv {
    /// Builds a connection pool against a `redis://` URL. Does not connect
    /// eagerly; the first command establishes the pool's first connection.
    pub fn connect(redis_url: &str) -> Result<Self, KvError> {
        let cfg = PoolConfig::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, KvError> {
        self.pool.get().await.map_err(|e| KvError::Backend(e.to_string()))
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn().await?;
        conn.get(key).await.map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|e| KvError::Backend(e.to_string())),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| KvError::Backend(e.to_string())),
        }
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let mut conn = self.conn().await?;
        conn.incr(key, 1).await.map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        conn.expire::<_, ()>(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn().await?;
        conn.exists(key).await.map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        let mut conn = self.conn().await?;
        let secs: i64 = conn.ttl(key).await.map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(if secs > 0 {
            Some(Duration::from_secs(secs as u64))
        } else {
            None
        })
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await.map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(key, value)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        conn.ltrim::<_, ()>(key, start, stop)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn().await?;
        conn.lrange(key, start as isize, stop as isize)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn().await?;
        conn.keys(pattern).await.map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn multi_set(&self, entries: &[MultiSetEntry]) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value, ttl) in entries {
            match ttl {
                Some(ttl) => {
                    pipe.set_ex(key, value, ttl.as_secs().max(1));
                }
                None => {
                    pipe.set(key, value);
                }
            }
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }
}
