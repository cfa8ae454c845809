//! Layer A: the manual override store.
//!
//! Pure data structure; all writes are normalized (clamped, rounded) and
//! all-zero vectors are never stored. The sequencer owns the store and
//! reports whether a write actually changed anything so no-op edits don't
//! emit frames.

use crate::model::{FeatureKey, LayerValueMap};
use crate::utils::clamp_channel;

/// One manual-override mutation.
///
/// Batches of these are applied atomically with respect to frame emission:
/// the whole batch produces at most one frame and one cross-fade start.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerAOp {
    /// Set a feature's channel vector (all-zero acts as a clear).
    Set {
        /// Environment fixture id.
        fixture_id: String,
        /// Feature id.
        feature_id: String,
        /// Raw channel values, clamped and rounded on apply.
        values: Vec<f64>,
    },
    /// Remove one feature's override.
    ClearFeature {
        /// Environment fixture id.
        fixture_id: String,
        /// Feature id.
        feature_id: String,
    },
    /// Remove every override of one fixture.
    ClearFixture {
        /// Environment fixture id.
        fixture_id: String,
    },
}

/// Manual override values keyed by (fixture, feature).
#[derive(Debug, Clone, Default)]
pub(crate) struct LayerStore {
    values: LayerValueMap,
}

impl LayerStore {
    /// Borrow of the stored map (never contains all-zero vectors).
    pub fn values(&self) -> &LayerValueMap {
        &self.values
    }

    /// Cloned snapshot of the stored map.
    pub fn snapshot(&self) -> LayerValueMap {
        self.values.clone()
    }

    /// Sets one feature's vector; returns whether the store changed.
    pub fn set(&mut self, fixture_id: &str, feature_id: &str, raw: &[f64]) -> bool {
        let normalized: Vec<u8> = raw.iter().map(|v| clamp_channel(*v)).collect();
        let key = FeatureKey::new(fixture_id, feature_id);
        if normalized.iter().all(|&v| v == 0) {
            return self.values.remove(&key).is_some();
        }
        match self.values.get(&key) {
            Some(existing) if *existing == normalized => false,
            _ => {
                self.values.insert(key, normalized);
                true
            }
        }
    }

    /// Removes one feature's override; returns whether it was present.
    pub fn clear_feature(&mut self, fixture_id: &str, feature_id: &str) -> bool {
        self.values
            .remove(&FeatureKey::new(fixture_id, feature_id))
            .is_some()
    }

    /// Removes every override of one fixture; returns whether any existed.
    pub fn clear_fixture(&mut self, fixture_id: &str) -> bool {
        let before = self.values.len();
        self.values.retain(|key, _| key.fixture_id != fixture_id);
        self.values.len() < before
    }

    /// Applies one operation; returns whether the store changed.
    pub fn apply(&mut self, op: &LayerAOp) -> bool {
        match op {
            LayerAOp::Set {
                fixture_id,
                feature_id,
                values,
            } => self.set(fixture_id, feature_id, values),
            LayerAOp::ClearFeature {
                fixture_id,
                feature_id,
            } => self.clear_feature(fixture_id, feature_id),
            LayerAOp::ClearFixture { fixture_id } => self.clear_fixture(fixture_id),
        }
    }
}
