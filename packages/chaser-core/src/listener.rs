//! Frame listener abstraction for decoupling the sequencer from transports.
//!
//! The sequencer emits one [`RenderFrame`] after every settled state change.
//! Consumers (the renderer, the WebSocket layer, tests) implement
//! [`FrameListener`] and register through `Sequencer::subscribe`.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::model::RenderFrame;

/// Trait for receiving emitted frames.
///
/// Listeners are invoked synchronously, in registration order, while the
/// sequencer holds its state lock. Implementations must not call back into
/// the sequencer from `on_frame`; work that mutates sequencer state is
/// marshalled onto a separate task (see the MQTT bridge's command path).
pub trait FrameListener: Send + Sync {
    /// Called with every emitted frame, in emission order.
    fn on_frame(&self, frame: &Arc<RenderFrame>);
}

/// No-op listener for wiring tests.
pub struct NoopFrameListener;

impl FrameListener for NoopFrameListener {
    fn on_frame(&self, _frame: &Arc<RenderFrame>) {
        // No-op
    }
}

/// Logging listener for debugging frame flow.
pub struct LoggingFrameListener;

impl FrameListener for LoggingFrameListener {
    fn on_frame(&self, frame: &Arc<RenderFrame>) {
        tracing::debug!(
            step = frame.state.step_index,
            position_ms = frame.state.position_ms,
            playing = frame.state.is_playing,
            keys = frame.values.len(),
            "frame"
        );
    }
}

/// Listener that forwards frames into an unbounded channel.
///
/// Used by transports that consume frames on their own task (the external
/// WebSocket broadcaster) and by tests that assert on emission order.
pub struct ChannelFrameListener {
    tx: mpsc::UnboundedSender<Arc<RenderFrame>>,
}

impl ChannelFrameListener {
    /// Creates the listener and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<RenderFrame>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FrameListener for ChannelFrameListener {
    fn on_frame(&self, frame: &Arc<RenderFrame>) {
        // A closed receiver just means the consumer went away.
        let _ = self.tx.send(Arc::clone(frame));
    }
}
