//! The sequencer's single periodic timer.
//!
//! One ticker runs whenever the playhead is advancing or a cross-fade is in
//! flight; the handler decides what the tick means from sequencer state.
//! Dropping the handle cancels the task, so restarts (frame-rate changes)
//! are just drop-and-respawn.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::Sequencer;

/// Cancellation guard for a running ticker task.
pub(crate) struct TickerHandle {
    cancel: CancellationToken,
    period: Duration,
}

impl TickerHandle {
    /// Period the ticker was started with.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Tick period for a render rate: `max(1, round(1000 / fps))` ms.
pub(crate) fn tick_period(render_fps: u8) -> Duration {
    let ms = (1000.0 / f64::from(render_fps.max(1))).round() as u64;
    Duration::from_millis(ms.max(1))
}

/// Spawns the tick task, invoking `Sequencer::on_tick` every `period`.
///
/// The task holds only a weak reference so a dropped sequencer stops its
/// ticker instead of being kept alive by it. Missed ticks are delayed, not
/// burst: catch-up is bounded by the tick handler's wall-clock delta, so
/// replaying a backlog of ticks would only add overhead.
pub(crate) fn spawn_ticker(sequencer: Weak<Sequencer>, period: Duration) -> TickerHandle {
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a fresh interval completes immediately; consume
        // it so the first real tick lands one period after start.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = guard.cancelled() => break,
                _ = interval.tick() => {
                    let Some(sequencer) = sequencer.upgrade() else { break };
                    sequencer.on_tick();
                }
            }
        }
    });
    TickerHandle { cancel, period }
}
