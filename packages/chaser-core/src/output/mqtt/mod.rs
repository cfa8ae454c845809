//! MQTT control/telemetry bridge.
//!
//! Advertises the sequencer to a home-automation broker (Home Assistant
//! discovery), accepts commands that translate into sequencer and layer-A
//! operations, mirrors layer A as per-fixture light states, and optionally
//! publishes a raw per-frame payload.
//!
//! One bridge instance exclusively owns the runtime for one configured
//! output: connection, retained-payload cache, subscriptions, light states,
//! and the pending-operation queue. Inbound commands arrive on the client
//! event-loop task and call into the sequencer there — never from the frame
//! emission path.

mod discovery;
mod light;
mod publisher;
mod topics;

pub use light::{FixtureLightState, LightCommand, LightMeta, LightMode};
pub use publisher::{MqttPublisher, RumqttcPublisher};
pub use topics::{Command, TopicScheme};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::RuntimeConfig;
use crate::model::{Environment, LayerValueMap, MqttOutputConfig, PlayheadState};
use crate::protocol_constants::LIGHT_COMMAND_BATCH_MS;
use crate::render::{Output, RenderPacket};
use crate::sequencer::{LayerAOp, Sequencer};
use crate::store::ProgramStore;
use crate::utils::sanitize_id;

use self::publisher::parse_broker_url;

/// Bridge between the sequencer and one MQTT broker target.
pub struct MqttBridge {
    name: String,
    sequencer: Arc<Sequencer>,
    programs: Arc<ProgramStore>,
    publisher: Arc<dyn MqttPublisher>,
    topics: TopicScheme,
    lights: Vec<LightMeta>,
    legacy_topic: Option<String>,
    /// Topic → last serialized payload; dedups retained publishes and is
    /// replayed wholesale after a reconnect.
    retained: DashMap<String, Vec<u8>>,
    subscriptions: Vec<String>,
    advertised_programs: Mutex<HashSet<String>>,
    light_states: Mutex<HashMap<String, FixtureLightState>>,
    /// Per-fixture queued layer-A ops, in first-command order. A newer
    /// command for a fixture replaces its queued ops.
    pending: Mutex<Vec<(String, Vec<LayerAOp>)>>,
    flush_scheduled: AtomicBool,
    cancel: CancellationToken,
}

impl MqttBridge {
    /// Connects to the broker and starts the client event loop.
    #[must_use]
    pub fn connect(
        config: &MqttOutputConfig,
        environment: &Environment,
        runtime_config: &RuntimeConfig,
        sequencer: Arc<Sequencer>,
        programs: Arc<ProgramStore>,
    ) -> Arc<Self> {
        let (host, port) = parse_broker_url(&config.url);
        let client_id = format!(
            "chaser-{}-{}",
            sanitize_id(&environment.id),
            sanitize_id(&config.id)
        );
        let topics = TopicScheme::new(config, &environment.id);

        let mut options = MqttOptions::new(client_id, host.clone(), port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_last_will(LastWill::new(
            topics.availability(),
            "offline",
            QoS::AtMostOnce,
            true,
        ));
        let (client, mut eventloop) = AsyncClient::new(options, 64);
        log::info!(
            "[Mqtt] Output '{}' connecting to {host}:{port} (base {})",
            config.id,
            topics.base
        );

        let bridge = Self::with_publisher(
            config,
            environment,
            runtime_config,
            sequencer,
            programs,
            Arc::new(RumqttcPublisher::new(client)),
        );

        let weak = Arc::downgrade(&bridge);
        let cancel = bridge.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = eventloop.poll() => match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            let Some(bridge) = weak.upgrade() else { break };
                            log::info!("[Mqtt] Connected, replaying retained state");
                            bridge.handle_connected();
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let Some(bridge) = weak.upgrade() else { break };
                            bridge.handle_message(&publish.topic, &publish.payload);
                        }
                        Ok(_) => {}
                        Err(err) => {
                            // The client reconnects on the next poll; back off
                            // so a dead broker doesn't spin the loop.
                            log::warn!("[Mqtt] Connection error: {err}");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        });

        bridge
    }

    /// Builds the bridge over an arbitrary publisher (tests inject mocks).
    #[must_use]
    pub fn with_publisher(
        config: &MqttOutputConfig,
        environment: &Environment,
        runtime_config: &RuntimeConfig,
        sequencer: Arc<Sequencer>,
        programs: Arc<ProgramStore>,
        publisher: Arc<dyn MqttPublisher>,
    ) -> Arc<Self> {
        let topics = TopicScheme::new(config, &environment.id);
        let lights = discovery::build_light_meta(environment, runtime_config);
        let subscriptions = topics.subscriptions();

        let bridge = Arc::new(Self {
            name: config.id.clone(),
            sequencer,
            programs,
            publisher,
            topics,
            lights,
            legacy_topic: config.topic.clone(),
            retained: DashMap::new(),
            subscriptions,
            advertised_programs: Mutex::new(HashSet::new()),
            light_states: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            flush_scheduled: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        });

        for topic in &bridge.subscriptions {
            bridge.publisher.subscribe(topic);
        }

        bridge
    }

    /// Publishes `offline` and stops the event loop.
    pub fn shutdown(&self) {
        self.publisher
            .publish(&self.topics.availability(), b"offline".to_vec(), true);
        self.cancel.cancel();
    }

    // ────────────────────────────────────────────────────────────────────
    // Connection lifecycle
    // ────────────────────────────────────────────────────────────────────

    /// Re-subscribes and replays every retained payload after a (re)connect.
    pub fn handle_connected(&self) {
        for topic in &self.subscriptions {
            self.publisher.subscribe(topic);
        }
        for entry in self.retained.iter() {
            self.publisher
                .publish(entry.key(), entry.value().clone(), true);
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Inbound commands
    // ────────────────────────────────────────────────────────────────────

    /// Dispatches one inbound message. Unknown topics and malformed
    /// payloads are ignored without touching sequencer state.
    pub fn handle_message(self: &Arc<Self>, topic: &str, payload: &[u8]) {
        match self.topics.parse_command(topic) {
            Some(Command::SetSpm) => {
                if let Some(value) = topics::parse_number_payload(payload) {
                    self.sequencer.set_spm(value);
                }
            }
            Some(Command::PlayFromStart) => {
                self.sequencer.set_step(0);
                self.sequencer.resume();
            }
            Some(Command::Pause) => self.sequencer.pause(),
            Some(Command::SetBlackout) => {
                if let Some(blackout) = topics::parse_on_off_payload(payload) {
                    self.sequencer.set_blackout(blackout);
                }
            }
            Some(Command::TriggerProgram(program_id)) => self.trigger_program(&program_id),
            Some(Command::LightSet(fixture_id)) => self.handle_light_command(&fixture_id, payload),
            None => {}
        }
    }

    fn trigger_program(&self, program_id: &str) {
        let Some(program) = self.programs.get(program_id) else {
            log::debug!("[Mqtt] Trigger for unknown program '{program_id}'");
            return;
        };
        if !self.sequencer.get_state().is_playing {
            self.sequencer.set_spm(f64::from(program.spm));
        }
        self.sequencer.set_program(Arc::clone(&program), false, false);
        self.sequencer.set_step(0);
        self.sequencer.resume();
    }

    fn handle_light_command(self: &Arc<Self>, fixture_id: &str, payload: &[u8]) {
        let Some(meta) = self.lights.iter().find(|m| m.fixture_id == fixture_id) else {
            return;
        };
        let Some(command) = LightCommand::parse(payload) else {
            return;
        };
        let ops = {
            let mut states = self.light_states.lock();
            let state = states
                .entry(meta.fixture_id.clone())
                .or_insert_with(|| FixtureLightState::initial(meta));
            light::ops_for_command(meta, state, &command)
        };
        self.queue_ops(fixture_id, ops);
    }

    /// Queues a fixture's ops and schedules one trailing flush.
    fn queue_ops(self: &Arc<Self>, fixture_id: &str, ops: Vec<LayerAOp>) {
        {
            let mut pending = self.pending.lock();
            match pending.iter_mut().find(|(id, _)| id == fixture_id) {
                Some(entry) => entry.1 = ops,
                None => pending.push((fixture_id.to_string(), ops)),
            }
        }
        if !self.flush_scheduled.swap(true, Ordering::SeqCst) {
            let weak = Arc::downgrade(self);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(LIGHT_COMMAND_BATCH_MS)).await;
                if let Some(bridge) = weak.upgrade() {
                    bridge.flush_pending();
                }
            });
        }
    }

    fn flush_pending(&self) {
        self.flush_scheduled.store(false, Ordering::SeqCst);
        let ops: Vec<LayerAOp> = self
            .pending
            .lock()
            .drain(..)
            .flat_map(|(_, ops)| ops)
            .collect();
        if !ops.is_empty() {
            self.sequencer.apply_layer_a_batch(&ops);
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Outbound state
    // ────────────────────────────────────────────────────────────────────

    /// Retained publish with dedup against the replay cache.
    fn publish_retained(&self, topic: String, payload: Vec<u8>) {
        let unchanged = self
            .retained
            .get(&topic)
            .is_some_and(|existing| *existing == payload);
        if unchanged {
            return;
        }
        self.publisher.publish(&topic, payload.clone(), true);
        self.retained.insert(topic, payload);
    }

    fn publish_retained_json(&self, topic: String, payload: &serde_json::Value) {
        match serde_json::to_vec(payload) {
            Ok(bytes) => self.publish_retained(topic, bytes),
            Err(err) => log::warn!("[Mqtt] Failed to serialize payload for {topic}: {err}"),
        }
    }

    fn sync_discovery(&self) {
        for meta in &self.lights {
            self.publish_retained_json(
                self.topics
                    .discovery_config("light", &discovery::light_object_id(meta)),
                &discovery::light_config_payload(meta, &self.topics),
            );
        }
        self.publish_retained_json(
            self.topics.discovery_config("number", "spm"),
            &discovery::spm_config_payload(&self.topics),
        );
        self.publish_retained_json(
            self.topics.discovery_config("button", "play_from_start"),
            &discovery::button_config_payload(&self.topics, "play_from_start", "Play From Start"),
        );
        self.publish_retained_json(
            self.topics.discovery_config("button", "pause"),
            &discovery::button_config_payload(&self.topics, "pause", "Pause"),
        );
        self.publish_retained_json(
            self.topics.discovery_config("switch", "blackout"),
            &discovery::blackout_config_payload(&self.topics),
        );

        // One trigger button per program; vanished programs get a retained
        // empty payload, which is the discovery removal protocol.
        let programs = self.programs.list();
        let current: HashSet<String> = programs.iter().map(|p| p.id.clone()).collect();
        for program in &programs {
            self.publish_retained_json(
                self.topics
                    .discovery_config("button", &discovery::program_object_id(&program.id)),
                &discovery::program_config_payload(&self.topics, program),
            );
        }
        let mut advertised = self.advertised_programs.lock();
        for stale in advertised.iter().filter(|id| !current.contains(*id)) {
            self.publish_retained(
                self.topics
                    .discovery_config("button", &discovery::program_object_id(stale)),
                Vec::new(),
            );
        }
        *advertised = current;
    }

    fn publish_control_states(&self, state: &PlayheadState) {
        self.publish_retained(self.topics.availability(), b"online".to_vec());
        self.publish_retained(
            self.topics.control_state("blackout"),
            if state.is_blackout { b"ON".to_vec() } else { b"OFF".to_vec() },
        );
        self.publish_retained(
            self.topics.control_state("spm"),
            state.spm.to_string().into_bytes(),
        );
    }

    fn mirror_lights(&self, layer_a: &LayerValueMap) {
        let mut states = self.light_states.lock();
        for meta in &self.lights {
            let previous = states
                .entry(meta.fixture_id.clone())
                .or_insert_with(|| FixtureLightState::initial(meta));
            let (next, payload) = light::mirror_state(meta, layer_a, previous);
            *previous = next;
            self.publish_retained_json(self.topics.light_state(&meta.fixture_id), &payload);
        }
    }

    fn publish_raw_frame(&self, topic: &str, packet: &RenderPacket) {
        let mut value = match serde_json::to_value(&*packet.frame) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("[Mqtt] Failed to serialize frame: {err}");
                return;
            }
        };
        let dmx: serde_json::Map<String, serde_json::Value> = packet
            .dmx_by_universe
            .iter()
            .map(|(universe, buffer)| (universe.to_string(), json!(buffer.to_vec())))
            .collect();
        value["dmxByUniverse"] = serde_json::Value::Object(dmx);
        if let Ok(payload) = serde_json::to_vec(&value) {
            self.publisher.publish(topic, payload, false);
        }
    }
}

impl Output for MqttBridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn push(&self, packet: &RenderPacket) {
        self.sync_discovery();
        self.publish_control_states(&packet.frame.state);
        self.mirror_lights(&packet.frame.layer_a_values);
        if let Some(topic) = &self.legacy_topic {
            self.publish_raw_frame(topic, packet);
        }
    }
}

impl Drop for MqttBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::build_render_packet;
    use tokio::time::sleep;

    struct RecordingPublisher {
        published: Mutex<Vec<(String, Vec<u8>, bool)>>,
        subscribed: Mutex<Vec<String>>,
    }

    impl RecordingPublisher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
                subscribed: Mutex::new(Vec::new()),
            })
        }

        fn payloads_for(&self, topic: &str) -> Vec<Vec<u8>> {
            self.published
                .lock()
                .iter()
                .filter(|(t, _, _)| t == topic)
                .map(|(_, p, _)| p.clone())
                .collect()
        }
    }

    impl MqttPublisher for RecordingPublisher {
        fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) {
            self.published
                .lock()
                .push((topic.to_string(), payload, retain));
        }

        fn subscribe(&self, topic: &str) {
            self.subscribed.lock().push(topic.to_string());
        }
    }

    fn runtime_config() -> Arc<RuntimeConfig> {
        Arc::new(RuntimeConfig {
            fixtures: serde_json::from_str(
                r#"[{"id": "rgbcct", "name": "Full", "channels": 5, "features": [
                    {"id": "rgb", "kind": "rgb", "channels": [1, 2, 3]},
                    {"id": "cct", "kind": "cct", "channels": [4, 5]}
                ]}]"#,
            )
            .unwrap(),
            environments: serde_json::from_str(
                r#"[{"id": "studio", "fixtures": [
                    {"id": "f1", "typeId": "rgbcct", "name": "Wash", "universe": 0, "address": 1}
                ]}]"#,
            )
            .unwrap(),
            programs: Vec::new(),
        })
    }

    fn mqtt_config(legacy_topic: Option<&str>) -> MqttOutputConfig {
        MqttOutputConfig {
            id: "ha".into(),
            enabled: true,
            url: "mqtt://localhost".into(),
            base_topic: None,
            discovery_prefix: None,
            node_id: None,
            topic: legacy_topic.map(str::to_string),
        }
    }

    fn program(id: &str, spm: u16) -> crate::model::Program {
        serde_json::from_str(&format!(
            r#"{{"id": "{id}", "name": "{id}", "environmentId": "studio", "spm": {spm},
                 "steps": [{{"id": "s0", "durationMs": 500}}]}}"#
        ))
        .unwrap()
    }

    struct Harness {
        bridge: Arc<MqttBridge>,
        publisher: Arc<RecordingPublisher>,
        sequencer: Arc<Sequencer>,
        programs: Arc<ProgramStore>,
        config: Arc<RuntimeConfig>,
    }

    fn harness(legacy_topic: Option<&str>, programs: Vec<crate::model::Program>) -> Harness {
        let config = runtime_config();
        let sequencer = Sequencer::new(30);
        let programs = Arc::new(ProgramStore::new(programs));
        let publisher = RecordingPublisher::new();
        let bridge = MqttBridge::with_publisher(
            &mqtt_config(legacy_topic),
            config.environment("studio").unwrap(),
            &config,
            Arc::clone(&sequencer),
            Arc::clone(&programs),
            Arc::clone(&publisher) as Arc<dyn MqttPublisher>,
        );
        Harness {
            bridge,
            publisher,
            sequencer,
            programs,
            config,
        }
    }

    fn push_frame(h: &Harness) {
        let packet =
            build_render_packet(h.sequencer.get_frame(), &h.config, "studio").unwrap();
        h.bridge.push(&packet);
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_is_published_retained_and_deduped() {
        let h = harness(None, vec![program("p1", 90)]);
        push_frame(&h);
        push_frame(&h);

        let light_config = h
            .publisher
            .payloads_for("homeassistant/light/chaser_studio/f1/config");
        assert_eq!(light_config.len(), 1, "identical configs are not re-sent");
        let payload: serde_json::Value = serde_json::from_slice(&light_config[0]).unwrap();
        assert_eq!(payload["schema"], "json");
        assert_eq!(
            payload["command_topic"],
            "chaser/studio/ha/light/f1/set"
        );

        assert_eq!(
            h.publisher
                .payloads_for("homeassistant/number/chaser_studio/spm/config")
                .len(),
            1
        );
        assert_eq!(
            h.publisher
                .payloads_for("homeassistant/button/chaser_studio/program_p1/config")
                .len(),
            1
        );
        assert_eq!(
            h.publisher.payloads_for("chaser/studio/ha/availability"),
            vec![b"online".to_vec()]
        );
        assert_eq!(
            h.publisher
                .payloads_for("chaser/studio/ha/control/blackout/state"),
            vec![b"OFF".to_vec()]
        );
        assert_eq!(
            h.publisher.payloads_for("chaser/studio/ha/control/spm/state"),
            vec![b"120".to_vec()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_programs_get_discovery_removal() {
        let h = harness(None, vec![program("p1", 90)]);
        push_frame(&h);

        h.programs.remove("p1");
        h.programs.upsert(program("p2", 60));
        push_frame(&h);

        let p1_topic = "homeassistant/button/chaser_studio/program_p1/config";
        let payloads = h.publisher.payloads_for(p1_topic);
        assert_eq!(payloads.len(), 2);
        assert!(payloads[1].is_empty(), "removal is an empty retained payload");
        assert_eq!(
            h.publisher
                .payloads_for("homeassistant/button/chaser_studio/program_p2/config")
                .len(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_commands_drive_the_sequencer() {
        let h = harness(None, vec![program("p1", 90)]);
        h.sequencer
            .set_program(Arc::new(program("p1", 90)), false, false);

        h.bridge
            .handle_message("chaser/studio/ha/control/spm/set", b"77");
        assert_eq!(h.sequencer.get_state().spm, 77);

        h.bridge
            .handle_message("chaser/studio/ha/control/blackout/set", b"ON");
        assert!(h.sequencer.get_state().is_blackout);

        h.bridge
            .handle_message("chaser/studio/ha/control/play_from_start/press", b"");
        let state = h.sequencer.get_state();
        assert!(state.is_playing);
        assert_eq!(state.step_index, 0);

        h.bridge
            .handle_message("chaser/studio/ha/control/pause/press", b"");
        assert!(!h.sequencer.get_state().is_playing);

        // Malformed payloads change nothing.
        h.bridge
            .handle_message("chaser/studio/ha/control/spm/set", b"fast");
        assert_eq!(h.sequencer.get_state().spm, 77);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_program_adopts_its_tempo_when_stopped() {
        let h = harness(None, vec![program("p1", 90)]);
        h.bridge
            .handle_message("chaser/studio/ha/program/p1/press", b"");

        let state = h.sequencer.get_state();
        assert!(state.is_playing);
        assert_eq!(state.spm, 90);
        assert_eq!(state.program_id.as_deref(), Some("p1"));
    }

    #[tokio::test(start_paused = true)]
    async fn light_command_batches_into_one_layer_a_batch() {
        let h = harness(None, vec![]);
        let (listener, mut rx) = crate::listener::ChannelFrameListener::new();
        h.sequencer.subscribe(Arc::new(listener));

        h.bridge.handle_message(
            "chaser/studio/ha/light/f1/set",
            br#"{"state": "ON", "brightness": 128, "color": {"r": 255, "g": 0, "b": 0}}"#,
        );
        // Nothing reaches the sequencer inside the debounce window.
        assert!(rx.try_recv().is_err());

        sleep(Duration::from_millis(LIGHT_COMMAND_BATCH_MS + 5)).await;
        let frame = rx.try_recv().expect("flush applies the batch");
        assert!(rx.try_recv().is_err(), "one frame for the whole batch");
        assert_eq!(
            frame.layer_a_values[&crate::model::FeatureKey::new("f1", "rgb")],
            vec![128, 0, 0]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn newer_light_command_replaces_queued_ops() {
        let h = harness(None, vec![]);
        h.bridge.handle_message(
            "chaser/studio/ha/light/f1/set",
            br#"{"state": "ON", "color": {"r": 255, "g": 0, "b": 0}}"#,
        );
        h.bridge.handle_message(
            "chaser/studio/ha/light/f1/set",
            br#"{"state": "ON", "color": {"r": 0, "g": 255, "b": 0}}"#,
        );

        sleep(Duration::from_millis(LIGHT_COMMAND_BATCH_MS + 5)).await;
        let frame = h.sequencer.get_frame();
        assert_eq!(
            frame.layer_a_values[&crate::model::FeatureKey::new("f1", "rgb")],
            vec![0, 255, 0]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn light_round_trip_mirrors_command_back_as_state() {
        let h = harness(None, vec![]);
        h.bridge.handle_message(
            "chaser/studio/ha/light/f1/set",
            br#"{"state": "ON", "brightness": 128, "color": {"r": 255, "g": 0, "b": 0}}"#,
        );
        sleep(Duration::from_millis(LIGHT_COMMAND_BATCH_MS + 5)).await;

        push_frame(&h);
        let states = h.publisher.payloads_for("chaser/studio/ha/light/f1/state");
        let payload: serde_json::Value = serde_json::from_slice(states.last().unwrap()).unwrap();
        assert_eq!(payload["state"], "ON");
        assert_eq!(payload["brightness"], 128);
        assert_eq!(payload["color_mode"], "rgb");
        assert_eq!(payload["color"], json!({"r": 255, "g": 0, "b": 0}));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_replays_subscriptions_and_retained_cache() {
        let h = harness(None, vec![]);
        push_frame(&h);

        let published_before = h.publisher.published.lock().len();
        let subscribed_before = h.publisher.subscribed.lock().len();
        assert_eq!(subscribed_before, 6);

        h.bridge.handle_connected();
        assert_eq!(h.publisher.subscribed.lock().len(), subscribed_before * 2);
        let replayed = h.publisher.published.lock().len() - published_before;
        assert_eq!(replayed, h.bridge.retained.len());
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_topic_gets_raw_frames() {
        let h = harness(Some("chaser/raw"), vec![]);
        h.sequencer.set_layer_a_value("f1", "rgb", &[10.0, 0.0, 0.0]);
        // Let the static-mode cross-fade finish so the visible mix (and the
        // DMX expansion) carries the override.
        sleep(Duration::from_millis(600)).await;
        push_frame(&h);
        push_frame(&h);

        let raw = h.publisher.published.lock().clone();
        let frames: Vec<_> = raw.iter().filter(|(t, _, _)| t == "chaser/raw").collect();
        assert_eq!(frames.len(), 2, "raw frames are not deduped");
        assert!(!frames[0].2, "raw frames are not retained");
        let payload: serde_json::Value = serde_json::from_slice(&frames[0].1).unwrap();
        assert!(payload["state"]["loop"].is_boolean());
        assert_eq!(payload["layerAValues"]["f1:rgb"], json!([10, 0, 0]));
        assert_eq!(payload["dmxByUniverse"]["0"][0], 10);
        assert_eq!(payload["dmxByUniverse"]["0"].as_array().unwrap().len(), 512);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_fixture_light_commands_are_ignored() {
        let h = harness(None, vec![]);
        h.bridge.handle_message(
            "chaser/studio/ha/light/nope/set",
            br#"{"state": "ON"}"#,
        );
        sleep(Duration::from_millis(LIGHT_COMMAND_BATCH_MS + 5)).await;
        assert!(h.sequencer.get_frame().layer_a_values.is_empty());
    }
}
