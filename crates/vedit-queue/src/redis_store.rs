//! Redis-backed job store.
//!
//! Each job is a JSON string under `{prefix}job_status:{id}` written with a
//! TTL; queued ids live in a Redis list (RPUSH to enqueue, LPOP to dequeue).
//! Updates read the whole record, mutate it locally and write it back with a
//! compare-and-set script, retrying when another writer got there first.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use vedit_models::{JobId, JobKind, JobRecord};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::store::{is_expired, JobStore, RecordMutation};

/// Replace KEYS[1] with ARGV[2] (TTL ARGV[3]) only if it still equals ARGV[1].
/// Returns 1 on success, 0 on a lost race and -1 when the key is gone.
const COMPARE_AND_SET: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return -1
end
if current ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', tonumber(ARGV[3]))
return 1
"#;

const SCAN_BATCH: usize = 100;

pub struct RedisJobStore {
    client: redis::Client,
    config: QueueConfig,
    compare_and_set: Script,
}

impl RedisJobStore {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        Ok(Self {
            client,
            config,
            compare_and_set: Script::new(COMPARE_AND_SET),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    async fn connection(&self) -> QueueResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn ttl_secs(&self) -> u64 {
        self.config.job_ttl.as_secs().max(1)
    }

    /// Every job key, via cursor-based SCAN.
    async fn job_keys(&self, conn: &mut MultiplexedConnection) -> QueueResult<Vec<String>> {
        let pattern = self.config.job_key_pattern();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }

    async fn load_all(&self, conn: &mut MultiplexedConnection) -> QueueResult<Vec<JobRecord>> {
        let mut records = Vec::new();
        for key in self.job_keys(conn).await? {
            let payload: Option<String> = conn.get(&key).await?;
            let Some(payload) = payload else {
                continue;
            };
            match serde_json::from_str::<JobRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable job record"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn create(&self, source_path: &Path, kind: JobKind) -> QueueResult<JobId> {
        let mut conn = self.connection().await?;
        let record = JobRecord::new(JobId::new(), source_path, kind);
        let payload = serde_json::to_string(&record)?;

        conn.set_ex::<_, _, ()>(self.config.job_key(record.id.as_str()), payload, self.ttl_secs())
            .await?;
        conn.rpush::<_, _, ()>(&self.config.queue_name, record.id.as_str())
            .await?;

        info!(job_id = %record.id, kind = record.kind.as_str(), "Created job");
        Ok(record.id)
    }

    async fn get(&self, id: &JobId) -> QueueResult<Option<JobRecord>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(self.config.job_key(id.as_str())).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(QueueError::from))
            .transpose()
    }

    async fn update(&self, id: &JobId, mutate: RecordMutation<'_>) -> QueueResult<JobRecord> {
        let mut conn = self.connection().await?;
        let key = self.config.job_key(id.as_str());

        for attempt in 1..=self.config.max_update_attempts {
            let current: Option<String> = conn.get(&key).await?;
            let current = current.ok_or_else(|| QueueError::JobNotFound(id.clone()))?;

            let mut record: JobRecord = serde_json::from_str(&current)?;
            mutate(&mut record)?;
            let next = serde_json::to_string(&record)?;

            let outcome: i64 = self
                .compare_and_set
                .key(&key)
                .arg(&current)
                .arg(&next)
                .arg(self.ttl_secs())
                .invoke_async(&mut conn)
                .await?;

            match outcome {
                1 => return Ok(record),
                -1 => return Err(QueueError::JobNotFound(id.clone())),
                _ => debug!(job_id = %id, attempt, "Job record changed during update, retrying"),
            }
        }

        Err(QueueError::Conflict {
            job_id: id.clone(),
            attempts: self.config.max_update_attempts,
        })
    }

    async fn dequeue(&self) -> QueueResult<Option<JobId>> {
        let mut conn = self.connection().await?;
        let id: Option<String> = conn.lpop(&self.config.queue_name, None).await?;
        Ok(id.map(JobId::from_string))
    }

    async fn list_active(&self) -> QueueResult<Vec<JobRecord>> {
        let mut conn = self.connection().await?;
        let mut active: Vec<JobRecord> = self
            .load_all(&mut conn)
            .await?
            .into_iter()
            .filter(|job| !job.is_terminal())
            .collect();
        active.sort_by_key(|job| job.created_at);
        Ok(active)
    }

    async fn expire(&self, max_age: Duration) -> QueueResult<usize> {
        let mut conn = self.connection().await?;
        let now = Utc::now();
        let mut removed = 0;
        for job in self.load_all(&mut conn).await? {
            if is_expired(&job, max_age, now) {
                let deleted: usize = conn.del(self.config.job_key(job.id.as_str())).await?;
                removed += deleted;
            }
        }
        if removed > 0 {
            info!(removed, "Expired finished jobs");
        }
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_from_config() {
        let store = RedisJobStore::new(QueueConfig::default()).unwrap();
        assert_eq!(store.name(), "redis");
        assert_eq!(store.ttl_secs(), 3600);
    }

    #[test]
    fn test_rejects_malformed_url() {
        let config = QueueConfig {
            redis_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RedisJobStore::new(config),
            Err(QueueError::ConnectionFailed(_))
        ));
    }
}
