//! Application bootstrap and dependency wiring.
//!
//! The composition root: resolves the target environment, builds the
//! sequencer at the environment's render rate, constructs one output per
//! enabled output config, and registers the renderer as a frame listener.
//! Everything downstream hangs off the returned [`ChaserPipeline`].

use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::{ChaserError, ChaserResult};
use crate::model::OutputConfig;
use crate::output::artnet::ArtNetOutput;
use crate::output::mqtt::MqttBridge;
use crate::render::{Output, Renderer};
use crate::sequencer::Sequencer;
use crate::store::ProgramStore;

/// Container for the bootstrapped frame pipeline.
pub struct ChaserPipeline {
    /// The sequencer driving the pipeline.
    pub sequencer: Arc<Sequencer>,
    /// Programs available for triggering.
    pub programs: Arc<ProgramStore>,
    /// The loaded runtime configuration.
    pub config: Arc<RuntimeConfig>,
    /// Id of the environment being rendered.
    pub environment_id: String,
    /// MQTT bridges, kept for graceful shutdown.
    mqtt_bridges: Vec<Arc<MqttBridge>>,
}

impl ChaserPipeline {
    /// Initiates graceful shutdown: stops the transport and marks every
    /// MQTT target offline.
    pub fn shutdown(&self) {
        log::info!("[Bootstrap] Shutting down pipeline");
        self.sequencer.pause();
        for bridge in &self.mqtt_bridges {
            bridge.shutdown();
        }
    }
}

/// Wires up the frame pipeline for one environment.
///
/// `environment_id` of `None` selects the first configured environment.
/// Disabled outputs are skipped; simulator outputs are rendered by the
/// external editor and ignored here. An Art-Net output that fails to bind
/// is an error — a sequencer silently driving nothing is worse than a
/// startup failure.
pub async fn bootstrap_pipeline(
    config: Arc<RuntimeConfig>,
    environment_id: Option<&str>,
) -> ChaserResult<ChaserPipeline> {
    let environment = match environment_id {
        Some(id) => config
            .environment(id)
            .ok_or_else(|| ChaserError::UnknownEnvironment(id.to_string()))?,
        None => config
            .environments
            .first()
            .ok_or_else(|| ChaserError::UnknownEnvironment("<none configured>".to_string()))?,
    }
    .clone();

    let sequencer = Sequencer::new(environment.clamped_render_fps());
    let programs = Arc::new(ProgramStore::new(config.programs.clone()));

    let mut outputs: Vec<Arc<dyn Output>> = Vec::new();
    let mut mqtt_bridges = Vec::new();
    for output in &environment.outputs {
        if !output.enabled() {
            log::info!("[Bootstrap] Output '{}' disabled, skipping", output.id());
            continue;
        }
        match output {
            OutputConfig::Simulator(_) => {
                log::debug!(
                    "[Bootstrap] Simulator output '{}' is editor-rendered, skipping",
                    output.id()
                );
            }
            OutputConfig::Artnet(artnet_config) => {
                let artnet = ArtNetOutput::connect(artnet_config).await?;
                outputs.push(Arc::new(artnet));
            }
            OutputConfig::Mqtt(mqtt_config) => {
                let bridge = MqttBridge::connect(
                    mqtt_config,
                    &environment,
                    &config,
                    Arc::clone(&sequencer),
                    Arc::clone(&programs),
                );
                outputs.push(Arc::clone(&bridge) as Arc<dyn Output>);
                mqtt_bridges.push(bridge);
            }
        }
    }

    log::info!(
        "[Bootstrap] Environment '{}' at {} fps with {} output(s)",
        environment.id,
        environment.clamped_render_fps(),
        outputs.len()
    );

    let renderer = Renderer::new(Arc::clone(&config), environment.id.clone(), outputs);
    sequencer.subscribe(Arc::new(renderer));

    Ok(ChaserPipeline {
        sequencer,
        programs,
        config,
        environment_id: environment.id,
        mqtt_bridges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(outputs_json: &str) -> Arc<RuntimeConfig> {
        Arc::new(RuntimeConfig {
            fixtures: serde_json::from_str(
                r#"[{"id": "par", "name": "Par", "channels": 3, "features": [
                    {"id": "rgb", "kind": "rgb", "channels": [1, 2, 3]}
                ]}]"#,
            )
            .unwrap(),
            environments: serde_json::from_str(&format!(
                r#"[{{"id": "studio", "renderFps": 60, "fixtures": [
                    {{"id": "f1", "typeId": "par", "name": "F1", "universe": 0, "address": 1}}
                ], "outputs": {outputs_json}}}]"#
            ))
            .unwrap(),
            programs: vec![serde_json::from_str(
                r#"{"id": "p1", "name": "P1", "environmentId": "studio", "steps": []}"#,
            )
            .unwrap()],
        })
    }

    #[tokio::test]
    async fn unknown_environment_is_an_error() {
        let result = bootstrap_pipeline(config("[]"), Some("nope")).await;
        assert!(matches!(result, Err(ChaserError::UnknownEnvironment(_))));
    }

    #[tokio::test]
    async fn defaults_to_first_environment() {
        let pipeline = bootstrap_pipeline(config("[]"), None).await.unwrap();
        assert_eq!(pipeline.environment_id, "studio");
        assert!(pipeline.programs.get("p1").is_some());
    }

    #[tokio::test]
    async fn artnet_output_binds_and_disabled_outputs_are_skipped() {
        let pipeline = bootstrap_pipeline(
            config(
                r#"[
                    {"type": "simulator", "id": "sim"},
                    {"type": "artnet", "id": "an", "host": "127.0.0.1", "port": 16454},
                    {"type": "artnet", "id": "off", "host": "127.0.0.1", "enabled": false}
                ]"#,
            ),
            Some("studio"),
        )
        .await
        .unwrap();
        // Only the enabled Art-Net output made it into the fan-out; pushing
        // a frame through must not panic.
        pipeline.sequencer.set_layer_a_value("f1", "rgb", &[1.0, 2.0, 3.0]);
        pipeline.shutdown();
    }
}
