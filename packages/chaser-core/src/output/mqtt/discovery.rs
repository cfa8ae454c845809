//! Home Assistant discovery payloads.
//!
//! Every entity is published retained under
//! `{prefix}/{component}/{node_id}/{object_id}/config`; removal is an empty
//! retained payload on the same topic.

use serde_json::{json, Value};

use crate::config::RuntimeConfig;
use crate::model::{Environment, FeatureKind, Program};
use crate::protocol_constants::{DEFAULT_MAX_KELVIN, DEFAULT_MIN_KELVIN, SPM_MAX, SPM_MIN};
use crate::utils::{kelvin_to_mired, sanitize_id};

use super::light::LightMeta;
use super::topics::TopicScheme;

/// Collects the light-capable fixtures of an environment.
///
/// A fixture qualifies when its type carries at least one rgb, cct, or
/// scalar feature and it has not opted out via `mqttExpose: false`. The
/// first feature of each kind wins.
#[must_use]
pub fn build_light_meta(environment: &Environment, config: &RuntimeConfig) -> Vec<LightMeta> {
    environment
        .fixtures
        .iter()
        .filter(|fixture| fixture.mqtt_expose)
        .filter_map(|fixture| {
            let fixture_type = config.fixture_type(&fixture.type_id)?;
            let rgb = fixture_type.first_feature_of(FeatureKind::Rgb);
            let cct = fixture_type.first_feature_of(FeatureKind::Cct);
            let dimmer = fixture_type.first_feature_of(FeatureKind::Scalar);
            if rgb.is_none() && cct.is_none() && dimmer.is_none() {
                return None;
            }
            Some(LightMeta {
                fixture_id: fixture.id.clone(),
                name: fixture.name.clone(),
                rgb_feature_id: rgb.map(|f| f.id.clone()),
                cct_feature_id: cct.map(|f| f.id.clone()),
                dimmer_feature_id: dimmer.map(|f| f.id.clone()),
            })
        })
        .collect()
}

/// Discovery object id for a light fixture.
#[must_use]
pub fn light_object_id(meta: &LightMeta) -> String {
    sanitize_id(&meta.fixture_id)
}

/// JSON-schema light config for one fixture.
#[must_use]
pub fn light_config_payload(meta: &LightMeta, topics: &TopicScheme) -> Value {
    let mut color_modes = Vec::new();
    if meta.rgb_feature_id.is_some() {
        color_modes.push("rgb");
    }
    if meta.cct_feature_id.is_some() {
        color_modes.push("color_temp");
    }
    if color_modes.is_empty() {
        color_modes.push("brightness");
    }

    let mut payload = json!({
        "name": meta.name,
        "unique_id": format!("{}_{}", topics.node_id, light_object_id(meta)),
        "schema": "json",
        "command_topic": topics.light_set(&meta.fixture_id),
        "state_topic": topics.light_state(&meta.fixture_id),
        "availability_topic": topics.availability(),
        "brightness": true,
        "supported_color_modes": color_modes,
    });
    if meta.cct_feature_id.is_some() {
        payload["min_mireds"] = json!(kelvin_to_mired(DEFAULT_MAX_KELVIN));
        payload["max_mireds"] = json!(kelvin_to_mired(DEFAULT_MIN_KELVIN));
    }
    payload
}

/// Number entity controlling the steps-per-minute pacing.
#[must_use]
pub fn spm_config_payload(topics: &TopicScheme) -> Value {
    json!({
        "name": "SPM",
        "unique_id": format!("{}_spm", topics.node_id),
        "command_topic": topics.control_set("spm"),
        "state_topic": topics.control_state("spm"),
        "availability_topic": topics.availability(),
        "min": SPM_MIN,
        "max": SPM_MAX,
        "step": 1,
    })
}

/// Stateless button entity for a transport control.
#[must_use]
pub fn button_config_payload(topics: &TopicScheme, control: &str, name: &str) -> Value {
    json!({
        "name": name,
        "unique_id": format!("{}_{}", topics.node_id, control),
        "command_topic": topics.control_press(control),
        "availability_topic": topics.availability(),
    })
}

/// Switch entity for blackout.
#[must_use]
pub fn blackout_config_payload(topics: &TopicScheme) -> Value {
    json!({
        "name": "Blackout",
        "unique_id": format!("{}_blackout", topics.node_id),
        "command_topic": topics.control_set("blackout"),
        "state_topic": topics.control_state("blackout"),
        "availability_topic": topics.availability(),
    })
}

/// Discovery object id for a program button.
#[must_use]
pub fn program_object_id(program_id: &str) -> String {
    format!("program_{}", sanitize_id(program_id))
}

/// Button entity triggering one program.
#[must_use]
pub fn program_config_payload(topics: &TopicScheme, program: &Program) -> Value {
    json!({
        "name": program.name,
        "unique_id": format!("{}_{}", topics.node_id, program_object_id(&program.id)),
        "command_topic": topics.program_press(&program.id),
        "availability_topic": topics.availability(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MqttOutputConfig;

    fn topics() -> TopicScheme {
        TopicScheme::new(
            &MqttOutputConfig {
                id: "ha".into(),
                enabled: true,
                url: "mqtt://localhost".into(),
                base_topic: None,
                discovery_prefix: None,
                node_id: None,
                topic: None,
            },
            "studio",
        )
    }

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            fixtures: serde_json::from_str(
                r#"[
                    {"id": "rgbcct", "name": "Full", "channels": 5, "features": [
                        {"id": "rgb", "kind": "rgb", "channels": [1, 2, 3]},
                        {"id": "cct", "kind": "cct", "channels": [4, 5]}
                    ]},
                    {"id": "mover", "name": "Mover", "channels": 2, "features": [
                        {"id": "pan", "kind": "scalar", "channels": [1]},
                        {"id": "tilt", "kind": "scalar", "channels": [2]}
                    ]}
                ]"#,
            )
            .unwrap(),
            environments: serde_json::from_str(
                r#"[{"id": "studio", "fixtures": [
                    {"id": "wash-1", "typeId": "rgbcct", "name": "Wash 1",
                     "universe": 0, "address": 1},
                    {"id": "hidden", "typeId": "rgbcct", "name": "Hidden",
                     "universe": 0, "address": 10, "mqttExpose": false},
                    {"id": "spot", "typeId": "mover", "name": "Spot",
                     "universe": 0, "address": 20},
                    {"id": "ghost", "typeId": "gone", "name": "Ghost",
                     "universe": 0, "address": 30}
                ]}]"#,
            )
            .unwrap(),
            programs: Vec::new(),
        }
    }

    #[test]
    fn meta_respects_expose_flag_and_picks_first_features() {
        let config = config();
        let environment = config.environment("studio").unwrap();
        let metas = build_light_meta(environment, &config);

        let ids: Vec<&str> = metas.iter().map(|m| m.fixture_id.as_str()).collect();
        assert_eq!(ids, vec!["wash-1", "spot"]);

        let wash = &metas[0];
        assert_eq!(wash.rgb_feature_id.as_deref(), Some("rgb"));
        assert_eq!(wash.cct_feature_id.as_deref(), Some("cct"));
        assert!(wash.dimmer_feature_id.is_none());

        let spot = &metas[1];
        assert_eq!(spot.dimmer_feature_id.as_deref(), Some("pan"));
    }

    #[test]
    fn light_config_advertises_color_modes_and_mireds() {
        let config = config();
        let environment = config.environment("studio").unwrap();
        let metas = build_light_meta(environment, &config);
        let payload = light_config_payload(&metas[0], &topics());

        assert_eq!(payload["schema"], "json");
        assert_eq!(payload["brightness"], true);
        assert_eq!(
            payload["supported_color_modes"],
            serde_json::json!(["rgb", "color_temp"])
        );
        assert_eq!(payload["min_mireds"], 154);
        assert_eq!(payload["max_mireds"], 370);
        assert_eq!(
            payload["command_topic"],
            "chaser/studio/ha/light/wash-1/set"
        );

        let scalar_only = light_config_payload(&metas[1], &topics());
        assert_eq!(
            scalar_only["supported_color_modes"],
            serde_json::json!(["brightness"])
        );
        assert!(scalar_only.get("min_mireds").is_none());
    }

    #[test]
    fn control_payloads_carry_expected_topics() {
        let topics = topics();
        let spm = spm_config_payload(&topics);
        assert_eq!(spm["min"], 1);
        assert_eq!(spm["max"], 500);
        assert_eq!(spm["command_topic"], "chaser/studio/ha/control/spm/set");

        let pause = button_config_payload(&topics, "pause", "Pause");
        assert_eq!(
            pause["command_topic"],
            "chaser/studio/ha/control/pause/press"
        );

        let blackout = blackout_config_payload(&topics);
        assert_eq!(
            blackout["state_topic"],
            "chaser/studio/ha/control/blackout/state"
        );
    }

    #[test]
    fn program_button_uses_sanitized_object_id() {
        let program: Program = serde_json::from_str(
            r#"{"id": "My Chase!", "name": "My Chase", "environmentId": "studio", "steps": []}"#,
        )
        .unwrap();
        assert_eq!(program_object_id(&program.id), "program_my_chase");
        let payload = program_config_payload(&topics(), &program);
        assert_eq!(
            payload["command_topic"],
            "chaser/studio/ha/program/My Chase!/press"
        );
    }
}
