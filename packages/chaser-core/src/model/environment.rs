//! Environment model: fixture placements and output targets.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    ARTNET_DEFAULT_PORT, DEFAULT_RENDER_FPS, RENDER_FPS_MAX, RENDER_FPS_MIN,
};

/// 2D position used by the simulator and editor layouts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// Placement of a fixture type in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentFixture {
    /// Unique fixture instance id.
    pub id: String,
    /// Fixture type id resolved against the catalog.
    pub type_id: String,
    /// Display name shown in the editor and MQTT discovery.
    pub name: String,
    /// DMX universe, 0..=32767.
    pub universe: u16,
    /// DMX base address, 1..=512.
    pub address: u16,
    /// Optional 2D position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Whether the fixture is advertised as an MQTT light.
    #[serde(default = "default_true")]
    pub mqtt_expose: bool,
}

/// A world: render rate, fixture placements, and output targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Environment id.
    pub id: String,
    /// Frames per second the sequencer renders at, 1..=120.
    #[serde(default = "default_render_fps")]
    pub render_fps: u8,
    /// Ordered fixture placements.
    pub fixtures: Vec<EnvironmentFixture>,
    /// Output targets receiving rendered packets.
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

impl Environment {
    /// Looks up a fixture placement by id.
    #[must_use]
    pub fn fixture(&self, fixture_id: &str) -> Option<&EnvironmentFixture> {
        self.fixtures.iter().find(|f| f.id == fixture_id)
    }

    /// Render rate clamped into the supported range.
    #[must_use]
    pub fn clamped_render_fps(&self) -> u8 {
        self.render_fps.clamp(RENDER_FPS_MIN, RENDER_FPS_MAX)
    }
}

/// Output target variants, tagged by `type` in the persisted schema.
///
/// Each variant carries its transport configuration; the renderer pushes the
/// same packet into every enabled output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    /// In-browser 2D simulator (rendered by the external editor; the core
    /// accepts and ignores these entries).
    Simulator(SimulatorOutputConfig),
    /// Art-Net UDP sender.
    Artnet(ArtnetOutputConfig),
    /// MQTT control/telemetry bridge.
    Mqtt(MqttOutputConfig),
}

impl OutputConfig {
    /// Output id, unique within the environment.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Simulator(c) => &c.id,
            Self::Artnet(c) => &c.id,
            Self::Mqtt(c) => &c.id,
        }
    }

    /// Whether the output should be instantiated.
    #[must_use]
    pub fn enabled(&self) -> bool {
        match self {
            Self::Simulator(c) => c.enabled,
            Self::Artnet(c) => c.enabled,
            Self::Mqtt(c) => c.enabled,
        }
    }
}

/// Simulator output entry (no transport configuration of its own).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorOutputConfig {
    /// Output id.
    pub id: String,
    /// Whether the output is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Art-Net UDP output target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtnetOutputConfig {
    /// Output id.
    pub id: String,
    /// Whether the output is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Destination host (IP or name; broadcast addresses are allowed).
    pub host: String,
    /// Destination UDP port.
    #[serde(default = "default_artnet_port")]
    pub port: u16,
    /// Optional allow-list of universes this target accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universes: Option<Vec<u16>>,
}

/// MQTT bridge output target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttOutputConfig {
    /// Output id.
    pub id: String,
    /// Whether the output is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Broker URL, `mqtt://host:port`.
    pub url: String,
    /// Topic root; defaults to `chaser/{env}/{output}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_topic: Option<String>,
    /// Home Assistant discovery prefix; defaults to `homeassistant`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_prefix: Option<String>,
    /// Discovery node id; defaults to `chaser_{env}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Legacy raw-frame topic; when set, every frame is published there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_render_fps() -> u8 {
    DEFAULT_RENDER_FPS
}

fn default_artnet_port() -> u16 {
    ARTNET_DEFAULT_PORT
}
