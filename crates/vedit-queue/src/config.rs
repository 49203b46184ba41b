//! Job store configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    /// Redis list holding queued job ids
    pub queue_name: String,
    /// Prefix for job record keys
    pub key_prefix: String,
    /// Time-to-live of every job record, refreshed on each write
    pub job_ttl: Duration,
    /// Compare-and-set attempts before an update reports a conflict
    pub max_update_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            queue_name: "vedit:job_queue".to_string(),
            key_prefix: "vedit:".to_string(),
            job_ttl: Duration::from_secs(3600),
            max_update_attempts: 5,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            queue_name: std::env::var("VEDIT_QUEUE_NAME").unwrap_or(defaults.queue_name),
            key_prefix: std::env::var("VEDIT_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            job_ttl: Duration::from_secs(
                std::env::var("VEDIT_JOB_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|s: &u64| *s > 0)
                    .unwrap_or(3600),
            ),
            ..defaults
        }
    }

    /// Key of a job's status record.
    pub fn job_key(&self, id: &str) -> String {
        format!("{}job_status:{}", self.key_prefix, id)
    }

    /// Pattern matching every job status key.
    pub fn job_key_pattern(&self) -> String {
        format!("{}job_status:*", self.key_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let config = QueueConfig::default();
        assert_eq!(config.job_key("abc"), "vedit:job_status:abc");
        assert_eq!(config.job_key_pattern(), "vedit:job_status:*");
    }
}
