//! Fixed protocol and pipeline constants that should NOT be changed.
//!
//! These values are defined by external specifications (DMX512, Art-Net,
//! Home Assistant MQTT discovery) or by the persisted program format, and
//! changing them would break compatibility with deployed fixtures and
//! automations.

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// DMX / Art-Net
// ─────────────────────────────────────────────────────────────────────────────

/// Channels in one DMX universe. Addresses are 1-based within this range.
pub const DMX_UNIVERSE_SIZE: usize = 512;

/// Art-Net OpCode for an OpOutput (Art-DMX) packet, little-endian on the wire.
pub const ARTNET_OPCODE_OUTPUT: u16 = 0x5000;

/// Art-Net protocol revision carried in every packet, big-endian on the wire.
pub const ARTNET_PROTOCOL_VERSION: u16 = 14;

/// Fixed Art-DMX header length preceding the DMX payload.
pub const ARTNET_HEADER_SIZE: usize = 18;

/// Default UDP port for Art-Net nodes.
pub const ARTNET_DEFAULT_PORT: u16 = 6454;

/// Highest addressable Art-Net port-address (15-bit universe).
pub const ARTNET_MAX_UNIVERSE: u16 = 0x7FFF;

/// Default Art-Net retransmit period (milliseconds).
///
/// Fixtures latch the last received frame; without a periodic refresh a lost
/// datagram would freeze them on stale data indefinitely.
pub const DEFAULT_ARTNET_REFRESH_MS: u64 = 40;

/// Lower bound for the configurable refresh period (milliseconds).
pub const MIN_ARTNET_REFRESH_MS: u64 = 20;

/// Environment variable overriding the Art-Net refresh period.
pub const ARTNET_REFRESH_ENV: &str = "CHASER_ARTNET_REFRESH_MS";

/// Resolves the Art-Net refresh period from the environment.
///
/// Unparseable values fall back to the default; parseable values are floored
/// at [`MIN_ARTNET_REFRESH_MS`].
#[must_use]
pub fn artnet_refresh_interval() -> Duration {
    let ms = std::env::var(ARTNET_REFRESH_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_ARTNET_REFRESH_MS)
        .max(MIN_ARTNET_REFRESH_MS);
    Duration::from_millis(ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Sequencer
// ─────────────────────────────────────────────────────────────────────────────

/// Duration of the cross-fade run when the visible mix switches between the
/// static layer and the sequencer layer (milliseconds).
pub const MODE_SWITCH_FADE_MS: u64 = 500;

/// A step's declared `durationMs` is divided by this base to scale the
/// SPM-derived nominal step length (500 ⇒ 1×, 1000 ⇒ 2×).
pub const STEP_DURATION_BASE_MS: f64 = 500.0;

/// Upper clamp on the wall-clock delta applied per tick (milliseconds).
///
/// Bounds catch-up after a suspended executor so a sleeping host does not
/// fast-forward through many steps at once.
pub const MAX_TICK_DELTA_MS: f64 = 1000.0;

/// Steps-per-minute clamp range.
pub const SPM_MIN: u16 = 1;
/// Steps-per-minute clamp range.
pub const SPM_MAX: u16 = 500;

/// Render frame-rate clamp range and default (frames per second).
pub const RENDER_FPS_MIN: u8 = 1;
/// Render frame-rate clamp range and default (frames per second).
pub const RENDER_FPS_MAX: u8 = 120;
/// Render frame-rate clamp range and default (frames per second).
pub const DEFAULT_RENDER_FPS: u8 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// MQTT bridge
// ─────────────────────────────────────────────────────────────────────────────

/// Trailing debounce applied to inbound light commands before they are
/// batched into one layer-A operation list (milliseconds).
pub const LIGHT_COMMAND_BATCH_MS: u64 = 25;

/// Color-temperature range advertised for cct-capable lights (kelvin).
pub const DEFAULT_MIN_KELVIN: f64 = 2700.0;
/// Color-temperature range advertised for cct-capable lights (kelvin).
pub const DEFAULT_MAX_KELVIN: f64 = 6500.0;

/// Default Home Assistant discovery prefix.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Environment variable enabling structured debug logs at all layers.
pub const DEBUG_ENV: &str = "CHASER_DEBUG";

#[cfg(test)]
mod tests {
    use super::*;

    // Single test because the process environment is shared between
    // concurrently running tests.
    #[test]
    fn refresh_interval_resolution() {
        std::env::remove_var(ARTNET_REFRESH_ENV);
        assert_eq!(
            artnet_refresh_interval(),
            Duration::from_millis(DEFAULT_ARTNET_REFRESH_MS)
        );

        std::env::set_var(ARTNET_REFRESH_ENV, "5");
        assert_eq!(
            artnet_refresh_interval(),
            Duration::from_millis(MIN_ARTNET_REFRESH_MS)
        );

        std::env::set_var(ARTNET_REFRESH_ENV, "not-a-number");
        assert_eq!(
            artnet_refresh_interval(),
            Duration::from_millis(DEFAULT_ARTNET_REFRESH_MS)
        );

        std::env::set_var(ARTNET_REFRESH_ENV, "100");
        assert_eq!(artnet_refresh_interval(), Duration::from_millis(100));
        std::env::remove_var(ARTNET_REFRESH_ENV);
    }
}
