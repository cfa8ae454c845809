//! Program model: ordered steps of timed feature keyframes.

use serde::Deserialize;

use crate::protocol_constants::{SPM_MAX, SPM_MIN};
use crate::utils::clamp_channel;

use super::frame::FeatureKey;

/// A feature value as persisted: a scalar or a per-channel vector.
///
/// Values are kept as raw numbers so malformed data (floats, out-of-range,
/// NaN) survives parsing and is clamped at use.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// One value applied to a single-channel feature.
    Scalar(f64),
    /// One value per feature channel.
    Vector(Vec<f64>),
}

impl FeatureValue {
    /// Normalizes the value into clamped DMX channel bytes.
    #[must_use]
    pub fn to_channels(&self) -> Vec<u8> {
        match self {
            Self::Scalar(v) => vec![clamp_channel(*v)],
            Self::Vector(vs) => vs.iter().map(|v| clamp_channel(*v)).collect(),
        }
    }
}

/// One (fixture, feature) keyframe within a step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFrame {
    /// Environment fixture id.
    pub fixture_id: String,
    /// Feature id on the fixture's type.
    pub feature_id: String,
    /// Target value for the step.
    pub value: FeatureValue,
}

impl FeatureFrame {
    /// Composite key for layer maps.
    #[must_use]
    pub fn key(&self) -> FeatureKey {
        FeatureKey::new(&self.fixture_id, &self.feature_id)
    }
}

/// One keyframe of a program with its own duration and fade.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStep {
    /// Step id.
    pub id: String,
    /// Relative step length; 500 means 1× the SPM-derived nominal duration.
    pub duration_ms: u64,
    /// Interpolation window from the previous step's values (milliseconds).
    #[serde(default)]
    pub fade_ms: u64,
    /// Feature keyframes; at most one per (fixture, feature).
    #[serde(default)]
    pub frames: Vec<FeatureFrame>,
}

impl ProgramStep {
    /// Returns the step's keyframes as normalized channel vectors.
    pub fn channel_values(&self) -> impl Iterator<Item = (FeatureKey, Vec<u8>)> + '_ {
        self.frames.iter().map(|f| (f.key(), f.value.to_channels()))
    }
}

/// An ordered list of steps driven by the sequencer.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "ProgramDe")]
pub struct Program {
    /// Program id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Environment the program's frames reference.
    pub environment_id: String,
    /// Steps per minute, clamped to 1..=500.
    pub spm: u16,
    /// Whether the playhead wraps at the last step.
    pub looping: bool,
    /// Ordered steps.
    pub steps: Vec<ProgramStep>,
}

/// Clamps a raw steps-per-minute value into the supported range.
///
/// Non-finite input falls back to the lower bound.
#[must_use]
pub fn clamp_spm(raw: f64) -> u16 {
    if !raw.is_finite() {
        return SPM_MIN;
    }
    (raw.round() as i64).clamp(i64::from(SPM_MIN), i64::from(SPM_MAX)) as u16
}

/// Default pacing when a persisted program carries no tempo at all.
const DEFAULT_SPM: f64 = 120.0;

/// Wire shape of a persisted program.
///
/// Older files carry `tempoBpm` instead of `spm`; `loop` defaults to on.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgramDe {
    id: String,
    name: String,
    environment_id: String,
    #[serde(default)]
    spm: Option<f64>,
    #[serde(default)]
    tempo_bpm: Option<f64>,
    #[serde(default, rename = "loop")]
    looping: Option<bool>,
    #[serde(default)]
    steps: Vec<ProgramStep>,
}

impl From<ProgramDe> for Program {
    fn from(raw: ProgramDe) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            environment_id: raw.environment_id,
            spm: clamp_spm(raw.spm.or(raw.tempo_bpm).unwrap_or(DEFAULT_SPM)),
            looping: raw.looping.unwrap_or(true),
            steps: raw.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_and_vector_values_normalize() {
        assert_eq!(FeatureValue::Scalar(300.0).to_channels(), vec![255]);
        assert_eq!(
            FeatureValue::Vector(vec![-1.0, 127.5, f64::NAN]).to_channels(),
            vec![0, 128, 0]
        );
    }

    #[test]
    fn clamp_spm_range() {
        assert_eq!(clamp_spm(0.0), 1);
        assert_eq!(clamp_spm(120.4), 120);
        assert_eq!(clamp_spm(9000.0), 500);
        assert_eq!(clamp_spm(f64::NAN), 1);
    }

    #[test]
    fn deserializes_modern_schema() {
        let json = r#"{
            "id": "p1", "name": "Chase", "environmentId": "studio",
            "spm": 90, "loop": false,
            "steps": [
                {"id": "s1", "durationMs": 500, "fadeMs": 250, "frames": [
                    {"fixtureId": "wash-1", "featureId": "rgb", "value": [255, 0, 0]}
                ]}
            ]
        }"#;
        let p: Program = serde_json::from_str(json).unwrap();
        assert_eq!(p.spm, 90);
        assert!(!p.looping);
        let (key, values) = p.steps[0].channel_values().next().unwrap();
        assert_eq!(key.to_string(), "wash-1:rgb");
        assert_eq!(values, vec![255, 0, 0]);
    }

    #[test]
    fn legacy_tempo_bpm_and_defaults() {
        let json = r#"{
            "id": "p2", "name": "Old", "environmentId": "studio",
            "tempoBpm": 600,
            "steps": [{"id": "s1", "durationMs": 500}]
        }"#;
        let p: Program = serde_json::from_str(json).unwrap();
        assert_eq!(p.spm, 500);
        assert!(p.looping);
        assert_eq!(p.steps[0].fade_ms, 0);
        assert!(p.steps[0].frames.is_empty());
    }

    #[test]
    fn spm_wins_over_legacy_tempo() {
        let json = r#"{
            "id": "p3", "name": "Both", "environmentId": "studio",
            "spm": 60, "tempoBpm": 120, "steps": []
        }"#;
        let p: Program = serde_json::from_str(json).unwrap();
        assert_eq!(p.spm, 60);
    }
}
