//! Render packet builder: feature values → universe-addressed DMX buffers.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::model::{FeatureRange, RenderFrame};
use crate::protocol_constants::DMX_UNIVERSE_SIZE;

/// One rendered frame expanded into per-universe DMX buffers.
#[derive(Debug, Clone)]
pub struct RenderPacket {
    /// The frame the packet was built from.
    pub frame: Arc<RenderFrame>,
    /// Environment the buffers are addressed for.
    pub environment_id: String,
    /// Universe id → 512-byte DMX frame, in universe order.
    pub dmx_by_universe: BTreeMap<u16, [u8; DMX_UNIVERSE_SIZE]>,
}

/// Builds the DMX buffers for a frame, or `None` if the environment is
/// unknown.
///
/// Every modeled channel of every fixture is written on every build — either
/// its value from the frame or an explicit zero — so downstream devices can
/// never latch stale data from features the frame no longer carries.
/// Structural problems (missing fixture type, unknown feature, out-of-range
/// address) drop the smallest affected unit and keep going.
#[must_use]
pub fn build_render_packet(
    frame: Arc<RenderFrame>,
    config: &RuntimeConfig,
    environment_id: &str,
) -> Option<RenderPacket> {
    let environment = config.environment(environment_id)?;
    let mut dmx_by_universe: BTreeMap<u16, [u8; DMX_UNIVERSE_SIZE]> = BTreeMap::new();

    // Pass 1: zero every modeled channel so unused features go dark.
    for fixture in &environment.fixtures {
        let Some(fixture_type) = config.fixture_type(&fixture.type_id) else {
            continue;
        };
        let buffer = dmx_by_universe
            .entry(fixture.universe)
            .or_insert([0u8; DMX_UNIVERSE_SIZE]);
        for channel in 1..=fixture_type.channels {
            if let Some(index) = dmx_index(fixture.address, channel) {
                buffer[index] = 0;
            }
        }
    }

    // Pass 2: write the frame's visible values through the channel maps.
    for (key, values) in &frame.values {
        let Some(fixture) = environment.fixture(&key.fixture_id) else {
            continue;
        };
        let Some(feature) = config
            .fixture_type(&fixture.type_id)
            .and_then(|t| t.feature(&key.feature_id))
        else {
            continue;
        };
        let Some(buffer) = dmx_by_universe.get_mut(&fixture.universe) else {
            continue;
        };
        for (i, &channel) in feature.channels.iter().enumerate() {
            let raw = values
                .get(i)
                .or_else(|| values.first())
                .copied()
                .unwrap_or(0);
            if let Some(index) = dmx_index(fixture.address, channel) {
                buffer[index] = apply_range(raw, feature.range.as_ref());
            }
        }
    }

    Some(RenderPacket {
        frame,
        environment_id: environment_id.to_string(),
        dmx_by_universe,
    })
}

/// 0-based buffer index for a fixture base address and 1-based channel, or
/// `None` when the resulting DMX address falls outside `[1, 512]`.
fn dmx_index(address: u16, channel: u16) -> Option<usize> {
    let addr = u32::from(address) + u32::from(channel) - 1;
    if (1..=DMX_UNIVERSE_SIZE as u32).contains(&addr) {
        Some(addr as usize - 1)
    } else {
        None
    }
}

/// Maps a DMX-domain byte through a feature's output range.
///
/// A `[0, max)` range scales the full DMX domain down into it; any other
/// range clamps. A nonsensical range (min > max) passes through untouched.
fn apply_range(raw: u8, range: Option<&FeatureRange>) -> u8 {
    match range {
        None => raw,
        Some(r) if r.min == 0 && r.max > 0 && r.max < 255 => {
            (f64::from(raw) / 255.0 * f64::from(r.max)).round() as u8
        }
        Some(r) if r.min <= r.max => raw.clamp(r.min, r.max),
        Some(_) => raw,
    }
}
