//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol_constants::{DEFAULT_MAX_KELVIN, DEFAULT_MIN_KELVIN};

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Value Clamping
// ─────────────────────────────────────────────────────────────────────────────

/// Clamps a ratio to `[0, 1]`. NaN maps to 0.
#[must_use]
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Clamps and rounds an arbitrary number into the DMX channel domain `[0, 255]`.
///
/// NaN maps to 0 so malformed external data degrades to "off" rather than
/// poisoning a frame.
#[must_use]
pub fn clamp_channel(v: f64) -> u8 {
    if v.is_nan() {
        0
    } else {
        v.clamp(0.0, 255.0).round() as u8
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identifier Sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Sanitizes an identifier for use in MQTT topics and discovery object ids.
///
/// Lowercases, collapses any run of characters outside `[a-z0-9_]` into a
/// single `_`, and trims leading/trailing underscores.
#[must_use]
pub fn sanitize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Color Temperature
// ─────────────────────────────────────────────────────────────────────────────

/// Converts kelvin to mireds (reciprocal megakelvin), rounded.
#[must_use]
pub fn kelvin_to_mired(kelvin: f64) -> u16 {
    if kelvin <= 0.0 {
        return 0;
    }
    (1_000_000.0 / kelvin).round() as u16
}

/// Converts mireds back to kelvin, clamped to the advertised range.
#[must_use]
pub fn mired_to_kelvin(mireds: f64) -> f64 {
    if mireds <= 0.0 {
        return DEFAULT_MAX_KELVIN;
    }
    (1_000_000.0 / mireds).clamp(DEFAULT_MIN_KELVIN, DEFAULT_MAX_KELVIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_channel_bounds_and_nan() {
        assert_eq!(clamp_channel(-4.0), 0);
        assert_eq!(clamp_channel(0.4), 0);
        assert_eq!(clamp_channel(127.5), 128);
        assert_eq!(clamp_channel(300.0), 255);
        assert_eq!(clamp_channel(f64::NAN), 0);
    }

    #[test]
    fn clamp01_bounds_and_nan() {
        assert_eq!(clamp01(-1.0), 0.0);
        assert_eq!(clamp01(0.25), 0.25);
        assert_eq!(clamp01(7.0), 1.0);
        assert_eq!(clamp01(f64::NAN), 0.0);
    }

    #[test]
    fn sanitize_collapses_runs_and_trims() {
        assert_eq!(sanitize_id("Living Room / Wash #2"), "living_room_wash_2");
        assert_eq!(sanitize_id("--stage--"), "stage");
        assert_eq!(sanitize_id("already_ok_42"), "already_ok_42");
        assert_eq!(sanitize_id("***"), "");
    }

    #[test]
    fn mired_round_trips_within_range() {
        assert_eq!(kelvin_to_mired(6500.0), 154);
        assert_eq!(kelvin_to_mired(2700.0), 370);
        assert_eq!(mired_to_kelvin(154.0).round(), 6494.0);
        // Out-of-range mireds clamp to the advertised kelvin window.
        assert_eq!(mired_to_kelvin(50.0), DEFAULT_MAX_KELVIN);
        assert_eq!(mired_to_kelvin(1000.0), DEFAULT_MIN_KELVIN);
    }
}
