//! Cross-fade between visible mixes.
//!
//! When the visible mode flips (play/pause, end-of-program) or layer A is
//! edited while static, the new target values are approached over
//! [`MODE_SWITCH_FADE_MS`] from a snapshot of whatever was visible just
//! before the change.

use std::collections::HashSet;

use tokio::time::Instant;

use crate::model::{FeatureKey, LayerValueMap};
use crate::protocol_constants::MODE_SWITCH_FADE_MS;
use crate::utils::{clamp01, clamp_channel};

/// Linear per-key blend of two layer maps.
///
/// Keys present on either side are interpolated element-wise (missing side
/// or missing element counts as 0); all-zero results are elided.
pub(crate) fn lerp_layer_maps(from: &LayerValueMap, to: &LayerValueMap, ratio: f64) -> LayerValueMap {
    let r = clamp01(ratio);
    let keys: HashSet<&FeatureKey> = from.keys().chain(to.keys()).collect();
    let mut out = LayerValueMap::with_capacity(keys.len());
    for key in keys {
        let a = from.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let b = to.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let len = a.len().max(b.len());
        let mixed: Vec<u8> = (0..len)
            .map(|i| {
                let va = a.get(i).copied().unwrap_or(0) as f64;
                let vb = b.get(i).copied().unwrap_or(0) as f64;
                clamp_channel(va + (vb - va) * r)
            })
            .collect();
        if mixed.iter().any(|&v| v != 0) {
            out.insert(key.clone(), mixed);
        }
    }
    out
}

/// An in-flight cross-fade from a captured snapshot toward the live target.
#[derive(Debug, Clone)]
pub(crate) struct MixTransition {
    from: LayerValueMap,
    started_at: Instant,
}

impl MixTransition {
    /// Starts a fade from the given snapshot at the current instant.
    pub fn new(from: LayerValueMap) -> Self {
        Self {
            from,
            started_at: Instant::now(),
        }
    }

    /// Fade progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        clamp01(self.started_at.elapsed().as_secs_f64() * 1000.0 / MODE_SWITCH_FADE_MS as f64)
    }

    /// Whether the fade has reached its target.
    pub fn complete(&self) -> bool {
        self.progress() >= 1.0
    }

    /// Current blend between the captured snapshot and `target`.
    pub fn blend(&self, target: &LayerValueMap) -> LayerValueMap {
        lerp_layer_maps(&self.from, target, self.progress())
    }
}
