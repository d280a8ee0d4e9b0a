use serde::Deserialize;

/// Library configuration.
///
/// All knobs have working defaults; [`ReconConfig::from_env`] overrides them
/// from the environment the same way the host process would configure any
/// other collaborator. Nothing here is re-read after construction.
#[derive(Debug, Deserialize, Clone)]
pub struct ReconConfig {
    /// Absolute amount tolerance for every equality check, in minor units.
    pub amount_tolerance_fen: i64,
    /// Page size for the timing sweep over pending orders.
    pub batch_page_size: i64,
    /// Worker pool sizing for async reconciliation.
    pub worker_pool: WorkerPoolConfig,
    /// Start the daily timing trigger task.
    pub timing_enabled: bool,
    /// UTC hour (0-23) at which the daily trigger sweeps the previous day.
    pub timing_hour_utc: u32,
    /// Optional webhook URL for the alarm fan-out.
    pub alarm_webhook_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerPoolConfig {
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    pub queue_capacity: usize,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            amount_tolerance_fen: 1,
            batch_page_size: 100,
            worker_pool: WorkerPoolConfig::default(),
            timing_enabled: false,
            timing_hour_utc: 2,
            alarm_webhook_url: None,
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_pool_size: 4,
            max_pool_size: 8,
            queue_capacity: 256,
        }
    }
}

impl ReconConfig {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            amount_tolerance_fen: env_parse("RECON_AMOUNT_TOLERANCE_FEN", defaults.amount_tolerance_fen)?,
            batch_page_size: env_parse("RECON_BATCH_PAGE_SIZE", defaults.batch_page_size)?,
            worker_pool: WorkerPoolConfig {
                core_pool_size: env_parse("RECON_POOL_CORE_SIZE", defaults.worker_pool.core_pool_size)?,
                max_pool_size: env_parse("RECON_POOL_MAX_SIZE", defaults.worker_pool.max_pool_size)?,
                queue_capacity: env_parse("RECON_POOL_QUEUE_CAPACITY", defaults.worker_pool.queue_capacity)?,
            },
            timing_enabled: env_parse("RECON_TIMING_ENABLED", defaults.timing_enabled)?,
            timing_hour_utc: env_parse("RECON_TIMING_HOUR_UTC", defaults.timing_hour_utc)?,
            alarm_webhook_url: std::env::var("RECON_ALARM_WEBHOOK_URL").ok(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, config::ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("invalid value for {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ReconConfig::default();
        assert_eq!(cfg.amount_tolerance_fen, 1);
        assert_eq!(cfg.batch_page_size, 100);
        assert_eq!(cfg.worker_pool.max_pool_size, 8);
        assert!(!cfg.timing_enabled);
    }
}
