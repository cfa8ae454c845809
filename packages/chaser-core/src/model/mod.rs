//! Core data model for fixtures, environments, programs, and frames.
//!
//! These types mirror the persisted JSON schema (camelCase field names) used
//! by the editor and the `data/` config files. They are plain data: all
//! behavior lives in the sequencer, render builder, and outputs.

mod environment;
mod fixture;
mod frame;
mod program;

pub use environment::{
    ArtnetOutputConfig, Environment, EnvironmentFixture, MqttOutputConfig, OutputConfig, Position,
    SimulatorOutputConfig,
};
pub use fixture::{Feature, FeatureKind, FeatureRange, FixtureType};
pub use frame::{FeatureKey, LayerValueMap, PlayheadState, RenderFrame};
pub use program::{clamp_spm, FeatureFrame, FeatureValue, Program, ProgramStep};
