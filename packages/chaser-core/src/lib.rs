//! Chaser Core - shared library for the Chaser lighting sequencer.
//!
//! This crate provides the real-time frame-generation pipeline for Chaser:
//! on every tick of a fixed-rate clock it produces a coherent snapshot of
//! per-fixture feature values by mixing a static manual layer with a
//! sequenced timeline, converts the snapshot into universe-addressed DMX
//! frames, and fans the result out to the configured transports. It is
//! designed to be embedded by the headless server and by tooling.
//!
//! # Architecture
//!
//! - [`model`]: fixture catalog, environments, programs, frame snapshots
//! - [`config`]: three-file JSON runtime configuration loader
//! - [`store`]: in-memory program store
//! - [`sequencer`]: transport state machine, layers, cross-fade, tick clock
//! - [`render`]: render packet builder and output fan-out
//! - [`output`]: Art-Net UDP sender and MQTT control/telemetry bridge
//! - [`bootstrap`]: composition root wiring the above together
//!
//! # Abstraction Traits
//!
//! Core logic is decoupled from transports through a few seams:
//!
//! - [`FrameListener`](listener::FrameListener): frame consumers
//! - [`Output`](render::Output): packet transports
//! - [`ArtNetTransport`](output::artnet::ArtNetTransport): datagram I/O
//! - [`MqttPublisher`](output::mqtt::MqttPublisher): broker publishes
//!
//! Each trait has a default implementation suitable for production; tests
//! inject recording fakes.

#![warn(clippy::all)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod listener;
pub mod model;
pub mod output;
pub mod protocol_constants;
pub mod render;
pub mod sequencer;
pub mod store;
pub mod utils;

// Re-export commonly used types at the crate root
pub use bootstrap::{bootstrap_pipeline, ChaserPipeline};
pub use config::{load_runtime_config, RuntimeConfig};
pub use error::{ChaserError, ChaserResult, ConfigError};
pub use listener::{ChannelFrameListener, FrameListener, LoggingFrameListener, NoopFrameListener};
pub use model::{
    Environment, EnvironmentFixture, Feature, FeatureFrame, FeatureKey, FeatureKind, FixtureType,
    LayerValueMap, OutputConfig, PlayheadState, Program, ProgramStep, RenderFrame,
};
pub use render::{build_render_packet, Output, RenderPacket, Renderer};
pub use sequencer::{LayerAOp, Sequencer, StateSnapshot, SubscriptionId};
pub use store::ProgramStore;
pub use utils::now_millis;

// Re-export output types
pub use output::artnet::ArtNetOutput;
pub use output::mqtt::MqttBridge;
