//! Light semantics: command payloads, per-fixture state, and layer-A
//! mirroring.
//!
//! A fixture is driven through at most one color path at a time (rgb, cct,
//! or a plain dimmer); switching paths clears the others so the render
//! builder never mixes two color models on one head.

use serde::Deserialize;
use serde_json::json;

use crate::model::{FeatureKey, LayerValueMap};
use crate::sequencer::LayerAOp;
use crate::utils::{clamp_channel, kelvin_to_mired, mired_to_kelvin};

use super::topics::parse_on_off_payload;

/// Active color path of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightMode {
    /// Driven through the rgb feature.
    Rgb,
    /// Driven through the cct (warm/cool) feature.
    ColorTemp,
    /// Driven through a scalar dimmer.
    Brightness,
}

impl LightMode {
    /// Home Assistant color-mode string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::ColorTemp => "color_temp",
            Self::Brightness => "brightness",
        }
    }
}

/// Which features a fixture exposes as a light.
#[derive(Debug, Clone)]
pub struct LightMeta {
    /// Environment fixture id.
    pub fixture_id: String,
    /// Display name for discovery.
    pub name: String,
    /// First rgb feature, if any.
    pub rgb_feature_id: Option<String>,
    /// First cct feature, if any.
    pub cct_feature_id: Option<String>,
    /// First scalar feature, if any.
    pub dimmer_feature_id: Option<String>,
}

/// Remembered state of one light between commands.
///
/// Base colors are kept at full brightness so brightness-only updates don't
/// erode the hue through repeated scaling.
#[derive(Debug, Clone)]
pub struct FixtureLightState {
    /// Active color path.
    pub mode: LightMode,
    /// 0 means off.
    pub brightness: u8,
    /// Full-brightness rgb color.
    pub base_rgb: [u8; 3],
    /// Full-brightness warm/cool split.
    pub base_cct: [u8; 2],
}

impl FixtureLightState {
    /// Default state for a fixture: full-brightness white, mode picked by
    /// feature preference rgb → cct → dimmer.
    #[must_use]
    pub fn initial(meta: &LightMeta) -> Self {
        let mode = if meta.rgb_feature_id.is_some() {
            LightMode::Rgb
        } else if meta.cct_feature_id.is_some() {
            LightMode::ColorTemp
        } else {
            LightMode::Brightness
        };
        Self {
            mode,
            brightness: 255,
            base_rgb: [255, 255, 255],
            base_cct: [255, 255],
        }
    }
}

/// Inbound light command payload (Home Assistant JSON schema).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LightCommand {
    /// `ON`/`OFF` (or an equivalent boolean-ish string).
    #[serde(default)]
    pub state: Option<String>,
    /// Target brightness 0-255.
    #[serde(default)]
    pub brightness: Option<f64>,
    /// Target color.
    #[serde(default)]
    pub color: Option<RgbColor>,
    /// Target color temperature in mireds.
    #[serde(default)]
    pub color_temp: Option<f64>,
}

/// RGB triple from a light command.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RgbColor {
    /// Red 0-255.
    pub r: f64,
    /// Green 0-255.
    pub g: f64,
    /// Blue 0-255.
    pub b: f64,
}

impl LightCommand {
    /// Parses a JSON command payload; malformed input yields `None` and the
    /// command is silently ignored.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }

    fn is_off(&self) -> bool {
        self.state
            .as_deref()
            .and_then(|s| parse_on_off_payload(s.as_bytes()))
            == Some(false)
    }
}

/// Converts kelvin into a warm/cool channel pair.
///
/// 2700 K is full warm, 6500 K full cool, linear in between.
#[must_use]
pub fn kelvin_to_cct(kelvin: f64) -> [u8; 2] {
    let k = kelvin.clamp(2700.0, 6500.0);
    [
        clamp_channel(255.0 * (6500.0 - k) / 3800.0),
        clamp_channel(255.0 * (k - 2700.0) / 3800.0),
    ]
}

/// Recovers kelvin from a warm/cool pair by the cool share.
#[must_use]
pub fn cct_to_kelvin(cct: [u8; 2]) -> f64 {
    let warm = f64::from(cct[0]);
    let cool = f64::from(cct[1]);
    let total = warm + cool;
    if total <= 0.0 {
        return 6500.0;
    }
    2700.0 + 3800.0 * cool / total
}

/// Translates a light command into layer-A operations, updating the
/// remembered state.
///
/// The returned list replaces any previously queued operations for the same
/// fixture in the debounce window.
pub fn ops_for_command(
    meta: &LightMeta,
    state: &mut FixtureLightState,
    command: &LightCommand,
) -> Vec<LayerAOp> {
    if command.is_off() {
        state.brightness = 0;
        return vec![LayerAOp::ClearFixture {
            fixture_id: meta.fixture_id.clone(),
        }];
    }

    let resuming_from_off = state.brightness == 0;
    if let Some(brightness) = command.brightness {
        state.brightness = clamp_channel(brightness);
    } else if resuming_from_off {
        state.brightness = 255;
    }

    if let Some(color) = &command.color {
        if meta.rgb_feature_id.is_some() {
            state.base_rgb = [
                clamp_channel(color.r),
                clamp_channel(color.g),
                clamp_channel(color.b),
            ];
            state.mode = LightMode::Rgb;
        }
    }
    if let Some(mireds) = command.color_temp {
        if meta.cct_feature_id.is_some() {
            state.base_cct = kelvin_to_cct(mired_to_kelvin(mireds));
            state.mode = LightMode::ColorTemp;
        }
    }

    let scale = f64::from(state.brightness) / 255.0;
    let mut ops = Vec::new();
    match state.mode {
        LightMode::Rgb if meta.rgb_feature_id.is_some() => {
            let feature = meta.rgb_feature_id.clone().unwrap_or_default();
            ops.push(LayerAOp::Set {
                fixture_id: meta.fixture_id.clone(),
                feature_id: feature,
                values: state
                    .base_rgb
                    .iter()
                    .map(|&v| f64::from(v) * scale)
                    .collect(),
            });
            push_clears(&mut ops, meta, &[&meta.cct_feature_id, &meta.dimmer_feature_id]);
        }
        LightMode::ColorTemp if meta.cct_feature_id.is_some() => {
            let feature = meta.cct_feature_id.clone().unwrap_or_default();
            ops.push(LayerAOp::Set {
                fixture_id: meta.fixture_id.clone(),
                feature_id: feature,
                values: state
                    .base_cct
                    .iter()
                    .map(|&v| f64::from(v) * scale)
                    .collect(),
            });
            push_clears(&mut ops, meta, &[&meta.rgb_feature_id, &meta.dimmer_feature_id]);
        }
        _ => {
            // Dimmer-only fixtures, plus the fallback when the latched mode's
            // feature is missing.
            if let Some(dimmer) = &meta.dimmer_feature_id {
                ops.push(LayerAOp::Set {
                    fixture_id: meta.fixture_id.clone(),
                    feature_id: dimmer.clone(),
                    values: vec![f64::from(state.brightness)],
                });
            } else if let Some(cct) = &meta.cct_feature_id {
                ops.push(LayerAOp::Set {
                    fixture_id: meta.fixture_id.clone(),
                    feature_id: cct.clone(),
                    values: state
                        .base_cct
                        .iter()
                        .map(|&v| f64::from(v) * scale)
                        .collect(),
                });
            } else if let Some(rgb) = &meta.rgb_feature_id {
                ops.push(LayerAOp::Set {
                    fixture_id: meta.fixture_id.clone(),
                    feature_id: rgb.clone(),
                    values: state
                        .base_rgb
                        .iter()
                        .map(|&v| f64::from(v) * scale)
                        .collect(),
                });
            }
        }
    }
    ops
}

fn push_clears(ops: &mut Vec<LayerAOp>, meta: &LightMeta, features: &[&Option<String>]) {
    for feature in features.iter().filter_map(|f| f.as_ref()) {
        ops.push(LayerAOp::ClearFeature {
            fixture_id: meta.fixture_id.clone(),
            feature_id: feature.clone(),
        });
    }
}

/// Derives the published light state from the layer-A mirror.
///
/// Mode tiebreak prefers rgb over cct over dimmer; an all-dark fixture keeps
/// its previous mode with brightness 0. Base colors are reconstructed by
/// dividing the observed channels by the brightness ratio so commands and
/// mirrors round-trip without drifting.
pub fn mirror_state(
    meta: &LightMeta,
    layer_a: &LayerValueMap,
    previous: &FixtureLightState,
) -> (FixtureLightState, serde_json::Value) {
    let read = |feature: &Option<String>| -> Vec<u8> {
        feature
            .as_ref()
            .and_then(|id| layer_a.get(&FeatureKey::new(meta.fixture_id.clone(), id.clone())))
            .cloned()
            .unwrap_or_default()
    };

    let rgb = read(&meta.rgb_feature_id);
    let cct = read(&meta.cct_feature_id);
    let dimmer = read(&meta.dimmer_feature_id);
    let rgb_max = rgb.iter().copied().max().unwrap_or(0);
    let cct_max = cct.iter().copied().max().unwrap_or(0);
    let dimmer_value = dimmer.first().copied().unwrap_or(0);

    let mut next = previous.clone();
    if rgb_max > 0 {
        next.mode = LightMode::Rgb;
        next.brightness = if previous.brightness > 0 {
            previous.brightness
        } else {
            rgb_max
        };
        let ratio = f64::from(next.brightness) / 255.0;
        next.base_rgb = [
            rescale(rgb.first().copied(), ratio),
            rescale(rgb.get(1).copied(), ratio),
            rescale(rgb.get(2).copied(), ratio),
        ];
    } else if cct_max > 0 {
        next.mode = LightMode::ColorTemp;
        next.brightness = if previous.brightness > 0 {
            previous.brightness
        } else {
            cct_max
        };
        let ratio = f64::from(next.brightness) / 255.0;
        next.base_cct = [
            rescale(cct.first().copied(), ratio),
            rescale(cct.get(1).copied(), ratio),
        ];
    } else if dimmer_value > 0 {
        next.mode = LightMode::Brightness;
        next.brightness = dimmer_value;
    } else {
        next.brightness = 0;
    }

    let state_str = if next.brightness > 0 { "ON" } else { "OFF" };
    let mut payload = json!({
        "state": state_str,
        "brightness": next.brightness,
        "color_mode": next.mode.as_str(),
    });
    match next.mode {
        LightMode::Rgb => {
            payload["color"] = json!({
                "r": next.base_rgb[0],
                "g": next.base_rgb[1],
                "b": next.base_rgb[2],
            });
        }
        LightMode::ColorTemp => {
            payload["color_temp"] = json!(kelvin_to_mired(cct_to_kelvin(next.base_cct)));
        }
        LightMode::Brightness => {}
    }

    (next, payload)
}

fn rescale(observed: Option<u8>, ratio: f64) -> u8 {
    let observed = f64::from(observed.unwrap_or(0));
    if ratio > 0.0 {
        clamp_channel(observed / ratio)
    } else {
        clamp_channel(observed)
    }
}
