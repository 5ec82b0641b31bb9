//! Redis-backed windows and notifications

use super::ListBackend;
use crate::error::{MonitorError, StoreError};
use crate::notify::Publisher;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};

/// Push to the tail, then pop at most one element from the head, in one
/// server-side step so concurrent appends to a key serialize.
const PUSH_BOUNDED: &str = r#"
local len = redis.call('RPUSH', KEYS[1], ARGV[1])
if len > tonumber(ARGV[2]) then
    redis.call('LPOP', KEYS[1])
    len = len - 1
end
return len
"#;

/// Wire form of a window value
fn encode_value(value: f64) -> String {
    format!("{:.6}", value)
}

fn encode_flag(up: bool) -> u8 {
    u8::from(up)
}

/// One multiplexed connection shared by the store and the notifier
#[derive(Clone)]
pub struct RedisBackend {
    connection: MultiplexedConnection,
    push_bounded: Script,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            connection,
            push_bounded: Script::new(PUSH_BOUNDED),
        })
    }
}

#[async_trait]
impl ListBackend for RedisBackend {
    async fn push_bounded(&self, key: &str, value: f64, capacity: usize) -> Result<usize, StoreError> {
        let mut connection = self.connection.clone();
        self.push_bounded
            .key(key)
            .arg(encode_value(value))
            .arg(capacity)
            .invoke_async(&mut connection)
            .await
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn range(&self, key: &str) -> Result<Vec<f64>, StoreError> {
        let mut connection = self.connection.clone();
        connection
            .lrange(key, 0, -1)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn set_flag(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection
            .set(key, encode_flag(value))
            .await
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn flag(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<u8> = connection
            .get(key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(raw.map(|flag| flag != 0))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("FLUSHDB")
            .query_async(&mut connection)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl Publisher for RedisBackend {
    async fn publish(&self, channel: &str, message: &str) -> Result<usize, MonitorError> {
        let mut connection = self.connection.clone();
        connection
            .publish(channel, message)
            .await
            .map_err(|e| MonitorError::transport(channel, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_script_appends_then_evicts_head() {
        let push = PUSH_BOUNDED.find("RPUSH").unwrap();
        let pop = PUSH_BOUNDED.find("LPOP").unwrap();
        assert!(push < pop);
        assert!(PUSH_BOUNDED.contains("KEYS[1]"));
        assert!(PUSH_BOUNDED.contains("tonumber(ARGV[2])"));
        assert!(!PUSH_BOUNDED.contains("RPOP"));
    }

    #[test]
    fn test_values_keep_six_decimals() {
        assert_eq!(encode_value(12.5), "12.500000");
        assert_eq!(encode_value(-1.0), "-1.000000");
        assert_eq!(encode_value(0.1234567), "0.123457");
        assert_eq!(encode_value(12.5).parse::<f64>().unwrap(), 12.5);
    }

    #[test]
    fn test_flags_encode_as_one_or_zero() {
        assert_eq!(encode_flag(true), 1);
        assert_eq!(encode_flag(false), 0);
    }

    /// Needs a scratch server: `REDIS_URL=redis://127.0.0.1/15 cargo test --features redis -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_live_server_bounds_windows_and_flags() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            return;
        };
        let backend = RedisBackend::connect(&url).await.unwrap();
        backend.clear().await.unwrap();

        for value in [1.0, 2.0, 3.0, 4.0] {
            backend.push_bounded("metric:cpu_percent_usage:host:h:container:c", value, 3).await.unwrap();
        }
        assert_eq!(
            backend.range("metric:cpu_percent_usage:host:h:container:c").await.unwrap(),
            vec![2.0, 3.0, 4.0]
        );

        backend.set_flag("status:host:h", false).await.unwrap();
        assert_eq!(backend.flag("status:host:h").await.unwrap(), Some(false));
        backend.set_flag("status:host:h", true).await.unwrap();
        assert_eq!(backend.flag("status:host:h").await.unwrap(), Some(true));
        assert_eq!(backend.flag("status:host:other").await.unwrap(), None);

        backend.clear().await.unwrap();
    }
}
