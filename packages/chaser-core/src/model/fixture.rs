//! Fixture type catalog: immutable descriptions of controllable hardware.

use serde::{Deserialize, Serialize};

/// Logical grouping of channels on a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Single channel (dimmer, strobe, ...).
    Scalar,
    /// Red/green/blue triple.
    Rgb,
    /// Warm/cool white pair.
    Cct,
}

impl FeatureKind {
    /// Number of DMX channels a feature of this kind occupies.
    #[must_use]
    pub fn channel_count(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Rgb => 3,
            Self::Cct => 2,
        }
    }
}

/// Optional output range for a feature.
///
/// Some fixtures reserve the top of a channel's range for effects (e.g. a
/// dimmer channel where 135-255 selects strobe speeds); the range keeps
/// rendered values inside the plain-intensity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRange {
    /// Lowest byte the renderer may emit for this feature.
    pub min: u8,
    /// Highest byte the renderer may emit for this feature.
    pub max: u8,
}

/// One logical feature of a fixture type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Feature id, unique within the fixture type.
    pub id: String,
    /// Channel grouping kind.
    pub kind: FeatureKind,
    /// Fixture-local channel indices, 1-based, ordered.
    pub channels: Vec<u16>,
    /// Optional output range restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<FeatureRange>,
}

/// Immutable catalog entry describing a fixture model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureType {
    /// Catalog id referenced by environment fixtures.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Total channel footprint of the fixture.
    pub channels: u16,
    /// Ordered feature list.
    pub features: Vec<Feature>,
}

impl FixtureType {
    /// Looks up a feature by id.
    #[must_use]
    pub fn feature(&self, feature_id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == feature_id)
    }

    /// Returns the first feature of the given kind, in declaration order.
    #[must_use]
    pub fn first_feature_of(&self, kind: FeatureKind) -> Option<&Feature> {
        self.features.iter().find(|f| f.kind == kind)
    }

    /// Checks the catalog invariants.
    ///
    /// Channel counts must match the feature kind, every channel index must
    /// lie in `[1, channels]`, and no channel may belong to two features.
    /// Violations are reported, not repaired: a broken catalog entry is a
    /// data problem for the config author.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for feature in &self.features {
            if feature.channels.len() != feature.kind.channel_count() {
                return Err(format!(
                    "fixture type '{}': feature '{}' has {} channels, expected {}",
                    self.id,
                    feature.id,
                    feature.channels.len(),
                    feature.kind.channel_count()
                ));
            }
            for &ch in &feature.channels {
                if ch == 0 || ch > self.channels {
                    return Err(format!(
                        "fixture type '{}': feature '{}' channel {} outside [1, {}]",
                        self.id, feature.id, ch, self.channels
                    ));
                }
                if !seen.insert(ch) {
                    return Err(format!(
                        "fixture type '{}': channel {} mapped by more than one feature",
                        self.id, ch
                    ));
                }
            }
        }
        Ok(())
    }
}
