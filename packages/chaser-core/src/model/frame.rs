//! Frame snapshot types: playhead state, layer value maps, and the emitted
//! render frame.

use std::collections::HashMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Composite key addressing one feature of one fixture.
///
/// Serialized (and parsed) as `"{fixtureId}:{featureId}"` for compatibility
/// with the persisted layer maps and MQTT payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey {
    /// Environment fixture id.
    pub fixture_id: String,
    /// Feature id on the fixture's type.
    pub feature_id: String,
}

impl FeatureKey {
    /// Creates a key from its parts.
    #[must_use]
    pub fn new(fixture_id: impl Into<String>, feature_id: impl Into<String>) -> Self {
        Self {
            fixture_id: fixture_id.into(),
            feature_id: feature_id.into(),
        }
    }

    /// Parses a `fixture:feature` composite string.
    ///
    /// Splits on the first `:` so feature ids may themselves contain colons.
    #[must_use]
    pub fn parse(composite: &str) -> Option<Self> {
        let (fixture, feature) = composite.split_once(':')?;
        if fixture.is_empty() || feature.is_empty() {
            return None;
        }
        Some(Self::new(fixture, feature))
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.fixture_id, self.feature_id)
    }
}

impl Serialize for FeatureKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Per-feature channel byte vectors, keyed by (fixture, feature).
///
/// Keys with all-zero vectors are elided; an empty map means "everything
/// dark".
pub type LayerValueMap = HashMap<FeatureKey, Vec<u8>>;

/// Serializes a layer map with composite string keys in stable key order.
pub(crate) fn serialize_layer_map<S: Serializer>(
    map: &LayerValueMap,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut keys: Vec<&FeatureKey> = map.keys().collect();
    keys.sort();
    let mut out = serializer.serialize_map(Some(keys.len()))?;
    for key in keys {
        out.serialize_entry(key, &map[key])?;
    }
    out.end()
}

/// Transport and playhead position of the sequencer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayheadState {
    /// Whether the sequencer tick is advancing the playhead.
    pub is_playing: bool,
    /// Whether rendered values are forced dark.
    pub is_blackout: bool,
    /// Active program id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    /// Current step, 0-based.
    pub step_index: usize,
    /// Elapsed time within the current step (milliseconds).
    pub position_ms: f64,
    /// Steps per minute, 1..=500.
    pub spm: u16,
    /// Whether the playhead wraps at the last step.
    #[serde(rename = "loop")]
    pub looping: bool,
}

impl Default for PlayheadState {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_blackout: false,
            program_id: None,
            step_index: 0,
            position_ms: 0.0,
            spm: 120,
            looping: true,
        }
    }
}

/// Snapshot emitted to frame listeners after every state change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    /// Unix timestamp of the emission (milliseconds).
    pub timestamp: u64,
    /// Playhead state at emission time.
    pub state: PlayheadState,
    /// Manual override layer (layer A).
    #[serde(serialize_with = "serialize_layer_map")]
    pub layer_a_values: LayerValueMap,
    /// Sequencer interpolation layer (layer B).
    #[serde(serialize_with = "serialize_layer_map")]
    pub layer_b_values: LayerValueMap,
    /// The visible mix actually rendered to outputs.
    #[serde(serialize_with = "serialize_layer_map")]
    pub values: LayerValueMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_through_display() {
        let key = FeatureKey::new("wash-1", "rgb");
        assert_eq!(key.to_string(), "wash-1:rgb");
        assert_eq!(FeatureKey::parse("wash-1:rgb"), Some(key));
    }

    #[test]
    fn parse_rejects_malformed_composites() {
        assert!(FeatureKey::parse("no-colon").is_none());
        assert!(FeatureKey::parse(":feature").is_none());
        assert!(FeatureKey::parse("fixture:").is_none());
    }

    #[test]
    fn parse_splits_on_first_colon() {
        let key = FeatureKey::parse("fix:fx:warm").unwrap();
        assert_eq!(key.fixture_id, "fix");
        assert_eq!(key.feature_id, "fx:warm");
    }

    #[test]
    fn frame_serializes_with_composite_keys() {
        let mut values = LayerValueMap::new();
        values.insert(FeatureKey::new("f1", "rgb"), vec![10, 20, 30]);
        let frame = RenderFrame {
            timestamp: 42,
            state: PlayheadState::default(),
            layer_a_values: values.clone(),
            layer_b_values: LayerValueMap::new(),
            values,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["values"]["f1:rgb"], serde_json::json!([10, 20, 30]));
        assert_eq!(json["state"]["loop"], serde_json::json!(true));
        assert_eq!(json["state"]["positionMs"], serde_json::json!(0.0));
        assert!(json["state"].get("programId").is_none());
    }
}
