//! Shift tracking: online/offline intervals and login-duration stats.

use crate::db::Repository;
use crate::domain::{day_window, GeoPoint, PartnerId, Shift, ShiftStats, TimeMs};
use crate::engine::IncentiveEvaluator;
use crate::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const WEEK_MS: i64 = 7 * 86_400_000;
const MONTH_MS: i64 = 30 * 86_400_000;

#[derive(Clone)]
pub struct ShiftTracker {
    repo: Arc<Repository>,
    evaluator: Arc<IncentiveEvaluator>,
}

impl ShiftTracker {
    pub fn new(repo: Arc<Repository>, evaluator: Arc<IncentiveEvaluator>) -> Self {
        Self { repo, evaluator }
    }

    /// Open a shift for the partner. Fails with Conflict if one is open.
    pub async fn start_shift(
        &self,
        partner: &PartnerId,
        location: Option<GeoPoint>,
    ) -> Result<Shift, AppError> {
        let shift = self.repo.open_shift(partner, TimeMs::now(), location).await?;
        info!(partner = %partner, shift_id = shift.id, "Shift started");
        Ok(shift)
    }

    /// Close the open shift, then kick off incentive evaluation for the
    /// day's deliveries. The evaluation is fire-and-forget: the close has
    /// already committed, the evaluation is idempotent, and transient store
    /// failures are retried with exponential backoff (the daily sweep is
    /// the net for anything that still slips through).
    pub async fn end_shift(
        &self,
        partner: &PartnerId,
        location: Option<GeoPoint>,
    ) -> Result<Shift, AppError> {
        let now = TimeMs::now();
        let shift = self.repo.close_shift(partner, now, location).await?;
        info!(
            partner = %partner,
            shift_id = shift.id,
            duration_ms = shift.duration_ms(now),
            "Shift ended"
        );

        let evaluator = self.evaluator.clone();
        let partner = partner.clone();
        let date = now.utc_date();
        tokio::spawn(async move {
            let policy = backoff::ExponentialBackoffBuilder::new()
                .with_max_elapsed_time(Some(Duration::from_secs(30)))
                .build();

            let result = backoff::future::retry(policy, || async {
                evaluator.evaluate_and_pay(&partner, date).await.map_err(|e| {
                    if e.is_transient() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            })
            .await;

            match result {
                Ok(Some(payout)) => {
                    info!(partner = %partner, amount = %payout.amount, "Post-shift incentive paid")
                }
                Ok(None) => debug!(partner = %partner, "No incentive due at shift end"),
                Err(e) => {
                    warn!(partner = %partner, error = %e, "Post-shift incentive evaluation failed")
                }
            }
        });

        Ok(shift)
    }

    pub async fn open_shift(&self, partner: &PartnerId) -> Result<Option<Shift>, AppError> {
        self.repo.get_open_shift(partner).await
    }

    /// Login-duration aggregates. Each shift contributes its overlap with
    /// the window, clipped at `now`, so an open shift counts its
    /// elapsed-so-far time and a shift spanning midnight splits correctly.
    pub async fn stats(&self, partner: &PartnerId) -> Result<ShiftStats, AppError> {
        let now = TimeMs::now();
        let month_start = TimeMs::new(now.as_ms() - MONTH_MS);
        let shifts = self.repo.query_shifts_overlapping(partner, month_start).await?;

        let (today_start, _) = day_window(now.utc_date());
        let week_start = TimeMs::new(now.as_ms() - WEEK_MS);

        Ok(ShiftStats {
            today_ms: window_total(&shifts, today_start, now),
            week_ms: window_total(&shifts, week_start, now),
            month_ms: window_total(&shifts, month_start, now),
            shift_count: shifts.len() as i64,
        })
    }
}

fn window_total(shifts: &[Shift], window_start: TimeMs, now: TimeMs) -> i64 {
    shifts
        .iter()
        .map(|s| {
            let end = s.end_ms.unwrap_or(now).as_ms().min(now.as_ms());
            let start = s.start_ms.as_ms().max(window_start.as_ms());
            (end - start).max(0)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(start: i64, end: Option<i64>) -> Shift {
        Shift {
            id: 0,
            partner_id: PartnerId::new("p1"),
            start_ms: TimeMs::new(start),
            end_ms: end.map(TimeMs::new),
            start_location: None,
            end_location: None,
        }
    }

    #[test]
    fn test_window_total_clips_to_window_and_now() {
        let shifts = vec![
            shift(0, Some(1000)),    // entirely before the window
            shift(4000, Some(6000)), // straddles the window start
            shift(7000, None),       // open, counts elapsed time
        ];
        let total = window_total(&shifts, TimeMs::new(5000), TimeMs::new(9000));
        // 1000 from the straddling shift + 2000 from the open shift.
        assert_eq!(total, 3000);
    }

    #[test]
    fn test_window_total_ignores_future_start() {
        let shifts = vec![shift(10_000, None)];
        assert_eq!(window_total(&shifts, TimeMs::new(0), TimeMs::new(9000)), 0);
    }
}
