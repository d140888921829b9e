//! # Dilation-aware, cancellable waiting.

use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use super::{Clock, effective_dilation};
use crate::error::TaskError;

/// Waits until `requested` **simulated** time has passed.
///
/// The wait runs in slices of at most `slice` real time. Each slice reads the
/// dilation factor fresh, sleeps `min(slice, remaining / factor)` and credits
/// `elapsed × factor` of simulated time, so a factor change takes effect at the
/// next slice boundary.
///
/// This is a checkpoint: an already-cancelled `token` returns immediately and
/// cancellation during the wait aborts it, both with [`TaskError::Canceled`].
pub async fn pace(
    clock: &dyn Clock,
    token: &CancellationToken,
    requested: Duration,
    slice: Duration,
) -> Result<(), TaskError> {
    if token.is_cancelled() {
        return Err(TaskError::Canceled);
    }
    let slice = slice.max(Duration::from_millis(1));
    let mut remaining = requested.as_secs_f64();

    while remaining > 0.0 {
        let factor = effective_dilation(clock.dilation());
        let real = Duration::try_from_secs_f64(remaining / factor).map_or(slice, |d| d.min(slice));
        if real.is_zero() {
            break;
        }

        let started = time::Instant::now();
        select! {
            _ = time::sleep(real) => {}
            _ = token.cancelled() => return Err(TaskError::Canceled),
        }
        remaining -= started.elapsed().as_secs_f64() * factor;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    const SLICE: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn test_factor_four_quarters_the_wait() {
        let clock = ManualClock::new(0.0, 4.0);
        let token = CancellationToken::new();

        let started = time::Instant::now();
        pace(&clock, &token, Duration::from_secs(4), SLICE)
            .await
            .expect("pace");
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(990), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(1060), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_factor_change_mid_wait_recalculates() {
        let clock = Arc::new(ManualClock::new(0.0, 4.0));
        let token = CancellationToken::new();

        let changer = {
            let clock = clock.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_millis(525)).await;
                clock.set_dilation(1.0);
            })
        };

        let started = time::Instant::now();
        pace(clock.as_ref(), &token, Duration::from_secs(8), SLICE)
            .await
            .expect("pace");
        let elapsed = started.elapsed();
        changer.await.expect("changer");

        // 550ms at 4x covers 2.2s; the remaining 5.8s run at 1x.
        assert!(elapsed >= Duration::from_millis(6300), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(6420), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_wait() {
        let clock = ManualClock::default();
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_millis(120)).await;
                token.cancel();
            })
        };

        let started = time::Instant::now();
        let res = pace(&clock, &token, Duration::from_secs(60), SLICE).await;
        canceller.await.expect("canceller");

        assert!(matches!(res, Err(TaskError::Canceled)));
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_cancelled_token_is_checkpoint() {
        let clock = ManualClock::default();
        let token = CancellationToken::new();
        token.cancel();

        let res = pace(&clock, &token, Duration::ZERO, SLICE).await;
        assert!(matches!(res, Err(TaskError::Canceled)));
    }

    async fn cancel_after(token: &CancellationToken, after: Duration) {
        let token = token.clone();
        tokio::spawn(async move {
            time::sleep(after).await;
            token.cancel();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_wait_ends_only_by_cancel() {
        let clock = ManualClock::default();
        let token = CancellationToken::new();
        cancel_after(&token, Duration::from_secs(1)).await;

        let res = pace(&clock, &token, Duration::MAX, SLICE).await;
        assert!(matches!(res, Err(TaskError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_factor_keeps_slicing() {
        let clock = ManualClock::new(0.0, 1e-12);
        let token = CancellationToken::new();
        cancel_after(&token, Duration::from_secs(1)).await;

        let year = Duration::from_secs(365 * 24 * 3600);
        let started = time::Instant::now();
        let res = pace(&clock, &token, year, SLICE).await;

        assert!(matches!(res, Err(TaskError::Canceled)));
        assert!(started.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_factor_falls_back_to_real_time() {
        let clock = ManualClock::new(0.0, 0.0);
        let token = CancellationToken::new();

        let started = time::Instant::now();
        pace(&clock, &token, Duration::from_millis(300), SLICE)
            .await
            .expect("pace");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed <= Duration::from_millis(320));
    }
}
