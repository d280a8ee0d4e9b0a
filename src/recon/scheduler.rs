use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info};

use super::timing::TimingReconService;

/// Daily trigger for the timing sweep.
///
/// Cron mechanics live with the host; this task only decides when to call
/// the triggered operation. It sweeps the previous UTC day once per day at
/// the configured hour, off-peak by default.
pub struct TimingTrigger {
    timing: TimingReconService,
    execution_hour_utc: u32,
}

impl TimingTrigger {
    pub fn new(timing: TimingReconService, execution_hour_utc: u32) -> Self {
        Self {
            timing,
            execution_hour_utc: execution_hour_utc % 24,
        }
    }

    /// Start the trigger in the background. Aborting the handle stops
    /// future firings; a sweep already running completes on its own.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = Self::next_execution(now, self.execution_hour_utc);
                let wait = next.signed_duration_since(now);
                if wait.num_seconds() > 0 {
                    info!("next timing sweep scheduled for {} UTC", next.format("%Y-%m-%d %H:%M:%S"));
                    tokio::time::sleep(Duration::from_secs(wait.num_seconds() as u64)).await;
                }

                let sweep_date = (Utc::now() - ChronoDuration::days(1)).date_naive();
                if let Err(e) = self.timing.do_timing_recon(sweep_date).await {
                    error!(%sweep_date, "scheduled timing sweep failed: {e}");
                }
            }
        })
    }

    fn next_execution(now: DateTime<Utc>, execution_hour: u32) -> DateTime<Utc> {
        let today = now
            .date_naive()
            .and_hms_opt(execution_hour, 0, 0)
            .expect("hour is clamped to 0..24");
        let today = Utc.from_utc_datetime(&today);
        if today > now {
            today
        } else {
            let tomorrow = (now.date_naive() + ChronoDuration::days(1))
                .and_hms_opt(execution_hour, 0, 0)
                .expect("hour is clamped to 0..24");
            Utc.from_utc_datetime(&tomorrow)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn next_execution_later_today_or_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        let next = TimingTrigger::next_execution(now, 14);
        assert_eq!(next.hour(), 14);
        assert_eq!(next.day(), 1);

        let next = TimingTrigger::next_execution(now, 9);
        assert_eq!(next.hour(), 9);
        assert_eq!(next.day(), 2);
    }
}
