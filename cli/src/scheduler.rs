//! The daily quota reset trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, TimeZone};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use sandgate_core::api::QuotaLedger;

/// Restore every operator's daily allowance at each local midnight.
///
/// Failures are logged and swallowed; a failed reset never disturbs active
/// sessions or the host process, the next boundary simply tries again.
pub fn spawn_daily_reset(ledger: Arc<dyn QuotaLedger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next_boundary(chrono::Local::now());
            info!(seconds = wait.as_secs(), "next quota reset scheduled");
            tokio::time::sleep(wait).await;
            match ledger.daily_reset().await {
                Ok(()) => info!("daily quota reset complete"),
                Err(err) => warn!(error = %err, "daily quota reset failed"),
            }
        }
    })
}

fn until_next_boundary<Tz: TimeZone>(now: DateTime<Tz>) -> Duration {
    let local_now = now.naive_local();
    let Some(next_midnight) = (local_now.date() + Days::new(1)).and_hms_opt(0, 0, 0) else {
        return Duration::from_secs(3600);
    };
    (next_midnight - local_now)
        .to_std()
        .unwrap_or(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn seconds_until_midnight_are_exact() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 30).unwrap();
        assert_eq!(until_next_boundary(now), Duration::from_secs(30));
    }

    #[test]
    fn a_fresh_day_waits_a_full_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(until_next_boundary(now), Duration::from_secs(86_400));
    }

    #[test]
    fn month_boundaries_roll_over() {
        let now = Utc.with_ymd_and_hms(2026, 1, 31, 22, 0, 0).unwrap();
        assert_eq!(until_next_boundary(now), Duration::from_secs(2 * 3600));
    }
}
