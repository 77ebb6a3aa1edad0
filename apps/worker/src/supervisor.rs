//! Fixed-interval tick loop with panic isolation.

use std::future::Future;
use std::time::Duration;

use rolewarden_application::{ShutdownSignal, TickReport};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Runs `tick` every `period` until shutdown is requested.
///
/// The schedule does not depend on how long a tick takes: a tick that
/// overruns delays the next one instead of triggering a burst. Each tick
/// runs in its own task so a panic is logged and the loop keeps going.
/// Returns the number of ticks started.
pub async fn run_supervised<F, Fut>(period: Duration, mut shutdown: ShutdownSignal, mut tick: F) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TickReport> + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut started = 0_u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            () = shutdown.wait() => break,
        }
        if shutdown.is_triggered() {
            break;
        }

        started += 1;
        match tokio::spawn(tick()).await {
            Ok(report) => log_tick(started, &report),
            Err(join_error) => {
                error!(tick = started, error = %join_error, "reconciliation tick crashed");
            }
        }
    }

    info!(ticks = started, "reconciliation loop stopped");
    started
}

fn log_tick(tick: u64, report: &TickReport) {
    let duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX);

    if report.failed() > 0 || matches!(report.sweep, Some(Err(_))) {
        warn!(
            tick,
            duration_ms,
            succeeded = report.succeeded(),
            failed = report.failed(),
            interrupted = report.interrupted(),
            "reconciliation tick finished with errors"
        );
    } else {
        info!(
            tick,
            duration_ms,
            succeeded = report.succeeded(),
            interrupted = report.interrupted(),
            "reconciliation tick finished"
        );
    }
}
