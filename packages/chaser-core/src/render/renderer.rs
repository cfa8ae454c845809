//! Renderer: fans rendered packets out to every registered output.

use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::listener::FrameListener;
use crate::model::RenderFrame;

use super::packet::{build_render_packet, RenderPacket};

/// An output transport receiving rendered packets.
///
/// `push` must not block: transports queue internally and do their I/O on
/// their own tasks (the Art-Net sender caches and flushes, the MQTT bridge
/// publishes fire-and-forget).
pub trait Output: Send + Sync {
    /// Identifier for logs.
    fn name(&self) -> &str;

    /// Accepts one rendered packet.
    fn push(&self, packet: &RenderPacket);
}

/// Builds packets for one environment and pushes them into every output.
///
/// Registered as a frame listener on the sequencer; runs synchronously in
/// the emission path.
pub struct Renderer {
    config: Arc<RuntimeConfig>,
    environment_id: String,
    outputs: Vec<Arc<dyn Output>>,
}

impl Renderer {
    /// Creates a renderer bound to one environment.
    #[must_use]
    pub fn new(
        config: Arc<RuntimeConfig>,
        environment_id: impl Into<String>,
        outputs: Vec<Arc<dyn Output>>,
    ) -> Self {
        Self {
            config,
            environment_id: environment_id.into(),
            outputs,
        }
    }

    /// The outputs packets are pushed into.
    #[must_use]
    pub fn outputs(&self) -> &[Arc<dyn Output>] {
        &self.outputs
    }
}

impl FrameListener for Renderer {
    fn on_frame(&self, frame: &Arc<RenderFrame>) {
        let Some(packet) = build_render_packet(Arc::clone(frame), &self.config, &self.environment_id)
        else {
            log::warn!(
                "[Renderer] Environment '{}' vanished, dropping frame",
                self.environment_id
            );
            return;
        };
        for output in &self.outputs {
            output.push(&packet);
        }
    }
}
