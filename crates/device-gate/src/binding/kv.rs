//! Redis-backed binding store.
//!
//! Works with any Redis-protocol key-value service, including hosted ones
//! such as Vercel KV and Upstash. Keys follow `user:{id}`, values are the
//! JSON-encoded [`DeviceBinding`].

use super::{binding_key, BindOutcome, BindingStore, DeviceBinding};
use crate::error::StoreError;
use async_trait::async_trait;
use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::AsyncCommands;
use tracing::debug;

/// Bindings stored in Redis; create-if-absent is `SET key value NX`.
#[derive(Clone)]
pub struct RedisStore<C = MultiplexedConnection> {
    connection: C,
}

impl RedisStore {
    /// Connect to the Redis server at `url` (`redis://` or `rediss://`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(connection))
    }
}

impl<C> RedisStore<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    /// Use an established connection.
    pub fn new(connection: C) -> Self {
        Self { connection }
    }
}

fn decode(json: &str) -> Result<DeviceBinding, StoreError> {
    Ok(serde_json::from_str(json)?)
}

#[async_trait]
impl<C> BindingStore for RedisStore<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    async fn get(&self, user_id: i64) -> Result<Option<DeviceBinding>, StoreError> {
        let mut con = self.connection.clone();
        let json: Option<String> = con.get(binding_key(user_id)).await?;
        json.as_deref().map(decode).transpose()
    }

    async fn bind_if_absent(
        &self,
        user_id: i64,
        binding: DeviceBinding,
    ) -> Result<BindOutcome, StoreError> {
        let key = binding_key(user_id);
        let json = serde_json::to_string(&binding)?;
        let mut con = self.connection.clone();

        // Nil means the key was already set and nothing was written.
        let reply: redis::Value = redis::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("NX")
            .query_async(&mut con)
            .await?;

        if !matches!(reply, redis::Value::Nil) {
            debug!(%key, "Binding created");
            return Ok(BindOutcome::Created(binding));
        }

        debug!(%key, "Binding already present");
        self.get(user_id)
            .await?
            .map(BindOutcome::Existing)
            .ok_or(StoreError::Vanished(user_id))
    }
}
