//! Topic scheme and command-plane parsing for the MQTT bridge.

use crate::model::MqttOutputConfig;
use crate::protocol_constants::DEFAULT_DISCOVERY_PREFIX;
use crate::utils::sanitize_id;

/// Topic roots for one bridge runtime.
#[derive(Debug, Clone)]
pub struct TopicScheme {
    /// Root of all command/state topics.
    pub base: String,
    /// Home Assistant discovery prefix.
    pub discovery_prefix: String,
    /// Discovery node id grouping all of this sequencer's entities.
    pub node_id: String,
}

impl TopicScheme {
    /// Resolves the scheme from an output config, applying the defaults
    /// `chaser/{env}/{output}`, `homeassistant`, and `chaser_{env}`.
    #[must_use]
    pub fn new(config: &MqttOutputConfig, environment_id: &str) -> Self {
        let base = config.base_topic.clone().unwrap_or_else(|| {
            format!(
                "chaser/{}/{}",
                sanitize_id(environment_id),
                sanitize_id(&config.id)
            )
        });
        let discovery_prefix = config
            .discovery_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_DISCOVERY_PREFIX.to_string());
        let node_id = config
            .node_id
            .clone()
            .unwrap_or_else(|| format!("chaser_{}", sanitize_id(environment_id)));
        Self {
            base,
            discovery_prefix,
            node_id,
        }
    }

    /// Retained availability topic (`online`/`offline`).
    #[must_use]
    pub fn availability(&self) -> String {
        format!("{}/availability", self.base)
    }

    /// Command topic for a light fixture.
    #[must_use]
    pub fn light_set(&self, fixture_id: &str) -> String {
        format!("{}/light/{}/set", self.base, fixture_id)
    }

    /// Retained state topic for a light fixture.
    #[must_use]
    pub fn light_state(&self, fixture_id: &str) -> String {
        format!("{}/light/{}/state", self.base, fixture_id)
    }

    /// Command topic for a settable control (`spm`, `blackout`).
    #[must_use]
    pub fn control_set(&self, control: &str) -> String {
        format!("{}/control/{}/set", self.base, control)
    }

    /// Retained state topic for a control.
    #[must_use]
    pub fn control_state(&self, control: &str) -> String {
        format!("{}/control/{}/state", self.base, control)
    }

    /// Trigger topic for a stateless control button.
    #[must_use]
    pub fn control_press(&self, control: &str) -> String {
        format!("{}/control/{}/press", self.base, control)
    }

    /// Trigger topic for a program button.
    #[must_use]
    pub fn program_press(&self, program_id: &str) -> String {
        format!("{}/program/{}/press", self.base, program_id)
    }

    /// Discovery config topic for a component/object pair.
    #[must_use]
    pub fn discovery_config(&self, component: &str, object_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/config",
            self.discovery_prefix, component, self.node_id, object_id
        )
    }

    /// Topic filters the bridge subscribes to.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        vec![
            self.control_set("spm"),
            self.control_press("play_from_start"),
            self.control_press("pause"),
            self.control_set("blackout"),
            format!("{}/program/+/press", self.base),
            format!("{}/light/+/set", self.base),
        ]
    }

    /// Maps an inbound topic to a command, or `None` for foreign topics.
    #[must_use]
    pub fn parse_command(&self, topic: &str) -> Option<Command> {
        let suffix = topic.strip_prefix(&self.base)?.strip_prefix('/')?;
        let mut parts = suffix.split('/');
        match (parts.next()?, parts.next(), parts.next(), parts.next()) {
            ("control", Some("spm"), Some("set"), None) => Some(Command::SetSpm),
            ("control", Some("play_from_start"), Some("press"), None) => {
                Some(Command::PlayFromStart)
            }
            ("control", Some("pause"), Some("press"), None) => Some(Command::Pause),
            ("control", Some("blackout"), Some("set"), None) => Some(Command::SetBlackout),
            ("program", Some(id), Some("press"), None) if !id.is_empty() => {
                Some(Command::TriggerProgram(id.to_string()))
            }
            ("light", Some(id), Some("set"), None) if !id.is_empty() => {
                Some(Command::LightSet(id.to_string()))
            }
            _ => None,
        }
    }
}

/// Parsed inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set steps-per-minute.
    SetSpm,
    /// Seek to step 0 and resume.
    PlayFromStart,
    /// Pause the transport.
    Pause,
    /// Toggle blackout.
    SetBlackout,
    /// Apply a program and play it from the top.
    TriggerProgram(String),
    /// Queue a light command for a fixture.
    LightSet(String),
}

/// Parses a numeric payload: a bare number or `{"value": n}`.
#[must_use]
pub fn parse_number_payload(payload: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(payload).ok()?.trim();
    if let Ok(value) = text.parse::<f64>() {
        return Some(value);
    }
    let json: serde_json::Value = serde_json::from_str(text).ok()?;
    json.get("value")?.as_f64()
}

/// Parses an on/off payload: `ON`/`OFF`, `true`/`false`, `1`/`0` (any case),
/// or `{"state": …}` wrapping one of those.
#[must_use]
pub fn parse_on_off_payload(payload: &[u8]) -> Option<bool> {
    let text = std::str::from_utf8(payload).ok()?.trim();
    if let Some(parsed) = parse_on_off_str(text) {
        return Some(parsed);
    }
    let json: serde_json::Value = serde_json::from_str(text).ok()?;
    match json.get("state")? {
        serde_json::Value::String(s) => parse_on_off_str(s),
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => Some(n.as_f64()? != 0.0),
        _ => None,
    }
}

fn parse_on_off_str(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}
