use std::time::Duration;

/// Tuning of the asynchronous attempt log.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Bound of the producer queue; a full queue triggers a synchronous write.
    pub queue_capacity: usize,
    /// Flush as soon as this many entries are buffered.
    pub batch_size: usize,
    /// Flush a non-empty buffer at least this often.
    pub flush_interval: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            batch_size: 10,
            flush_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for one operation, lock acquisition included.
    pub operation_timeout: Duration,
    /// Lifetime of cached entity snapshots.
    pub cache_ttl: Duration,
    pub audit: AuditConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(5 * 60),
            audit: AuditConfig::default(),
        }
    }
}
