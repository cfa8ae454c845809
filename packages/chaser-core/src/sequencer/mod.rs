//! The sequencer: transport state machine, two-layer value model, and the
//! fixed-rate tick that drives frame emission.
//!
//! All state lives behind one mutex; every operation — a timer tick, an
//! inbound command, a direct API call — runs to completion (including
//! listener notification) before the next begins, which gives the pipeline
//! its single-threaded cooperative semantics. Operations are synchronous and
//! never suspend while holding state.
//!
//! The visible mix is either layer A (manual overrides, static mode) or
//! layer B (sequenced interpolation); switching between the two cross-fades
//! over 500 ms from a snapshot of whatever was visible at the switch.

mod layer;
mod mix;
mod ticker;
mod timeline;

pub use layer::LayerAOp;
pub use timeline::{build_sequencer_values, previous_step_index, step_target_duration_ms};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::listener::FrameListener;
use crate::model::{
    clamp_spm, LayerValueMap, PlayheadState, Program, ProgramStep, RenderFrame,
};
use crate::protocol_constants::{MAX_TICK_DELTA_MS, RENDER_FPS_MAX, RENDER_FPS_MIN, SPM_MAX, SPM_MIN};
use crate::utils::now_millis;

use layer::LayerStore;
use mix::MixTransition;
use ticker::{spawn_ticker, tick_period, TickerHandle};

/// Which layer the visible mix is sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MixMode {
    /// Layer B: the playing program's interpolated values.
    Sequencer,
    /// Layer A: manual overrides.
    Static,
}

/// Handle returned by [`Sequencer::subscribe`]; pass back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Partial playhead state applied atomically by
/// [`Sequencer::apply_state_snapshot`].
///
/// `None` fields are left untouched. Used by the program store to restore
/// the playhead after rebinding an edited program.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    /// Transport running flag.
    pub is_playing: Option<bool>,
    /// Blackout flag.
    pub is_blackout: Option<bool>,
    /// Step index (clamped to the program).
    pub step_index: Option<usize>,
    /// Position within the step, milliseconds (floored at 0).
    pub position_ms: Option<f64>,
    /// Steps per minute (clamped to 1..=500).
    pub spm: Option<f64>,
    /// Loop flag.
    pub looping: Option<bool>,
}

struct Inner {
    /// Immutable snapshot of the active program; replaced wholesale.
    program: Option<Arc<Program>>,
    state: PlayheadState,
    layer_a: LayerStore,
    transition: Option<MixTransition>,
    /// Whether the playhead reached step 0 by wrapping (vs. being placed).
    wrapped: bool,
    last_tick: Option<Instant>,
    render_fps: u8,
    listeners: Vec<(u64, Arc<dyn FrameListener>)>,
    next_listener_id: u64,
    ticker: Option<TickerHandle>,
}

impl Inner {
    fn step_count(&self) -> usize {
        self.program.as_ref().map_or(0, |p| p.steps.len())
    }

    fn mix_mode(&self) -> MixMode {
        if self.state.is_playing && self.step_count() > 0 {
            MixMode::Sequencer
        } else {
            MixMode::Static
        }
    }

    fn layer_b_values(&self) -> LayerValueMap {
        self.program
            .as_ref()
            .map(|p| build_sequencer_values(p, &self.state, self.wrapped))
            .unwrap_or_default()
    }

    /// The mix that would be rendered right now, including any in-flight
    /// cross-fade.
    fn visible_values(&self) -> LayerValueMap {
        let target = match self.mix_mode() {
            MixMode::Sequencer => self.layer_b_values(),
            MixMode::Static if self.state.is_blackout => LayerValueMap::new(),
            MixMode::Static => self.layer_a.snapshot(),
        };
        match &self.transition {
            Some(t) if !t.complete() => t.blend(&target),
            _ => target,
        }
    }

    fn build_frame(&self) -> Arc<RenderFrame> {
        Arc::new(RenderFrame {
            timestamp: now_millis(),
            state: self.state.clone(),
            layer_a_values: self.layer_a.snapshot(),
            layer_b_values: self.layer_b_values(),
            values: self.visible_values(),
        })
    }
}

/// The sequencer. Construct with [`Sequencer::new`]; share as `Arc`.
///
/// Mutating operations take `&Arc<Self>` because they may (re)start the tick
/// task, which holds a weak back-reference. All operations must run inside a
/// tokio runtime.
pub struct Sequencer {
    inner: Mutex<Inner>,
}

impl Sequencer {
    /// Creates a stopped sequencer rendering at the given frame rate.
    #[must_use]
    pub fn new(render_fps: u8) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                program: None,
                state: PlayheadState::default(),
                layer_a: LayerStore::default(),
                transition: None,
                wrapped: false,
                last_tick: None,
                render_fps: render_fps.clamp(RENDER_FPS_MIN, RENDER_FPS_MAX),
                listeners: Vec::new(),
                next_listener_id: 0,
                ticker: None,
            }),
        })
    }

    // ────────────────────────────────────────────────────────────────────
    // Subscriptions & snapshots
    // ────────────────────────────────────────────────────────────────────

    /// Registers a frame listener; returns a handle for unsubscribing.
    pub fn subscribe(&self, listener: Arc<dyn FrameListener>) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, listener));
        SubscriptionId(id)
    }

    /// Removes a listener; returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id.0);
        inner.listeners.len() < before
    }

    /// Snapshot of the playhead state.
    #[must_use]
    pub fn get_state(&self) -> PlayheadState {
        self.inner.lock().state.clone()
    }

    /// Snapshot of the currently visible frame (does not emit).
    #[must_use]
    pub fn get_frame(&self) -> Arc<RenderFrame> {
        self.inner.lock().build_frame()
    }

    /// Active program snapshot, if any.
    #[must_use]
    pub fn get_program(&self) -> Option<Arc<Program>> {
        self.inner.lock().program.clone()
    }

    // ────────────────────────────────────────────────────────────────────
    // Transport operations
    // ────────────────────────────────────────────────────────────────────

    /// Replaces the active program.
    ///
    /// With `preserve_playhead` the step index is clamped into the new
    /// program; otherwise the playhead resets to step 0. The loop flag is
    /// adopted from the program (it is per-program semantics); SPM stays
    /// owned by the transport and is only re-clamped.
    pub fn set_program(
        self: &Arc<Self>,
        program: Arc<Program>,
        preserve_playhead: bool,
        suppress_emit: bool,
    ) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();

        inner.state.program_id = Some(program.id.clone());
        inner.state.looping = program.looping;
        inner.state.spm = inner.state.spm.clamp(SPM_MIN, SPM_MAX);
        let step_count = program.steps.len();
        inner.program = Some(program);

        if preserve_playhead {
            inner.state.step_index = inner.state.step_index.min(step_count.saturating_sub(1));
        } else {
            inner.state.step_index = 0;
            inner.state.position_ms = 0.0;
            inner.wrapped = false;
        }

        self.finish_op(&mut inner, pre_mode, pre_visible, false, !suppress_emit);
    }

    /// Starts playback from the top of the active program.
    pub fn play(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();

        if !inner.state.is_playing && inner.program.is_some() {
            inner.state.step_index = 0;
            inner.state.position_ms = 0.0;
            inner.wrapped = false;
            inner.state.is_playing = true;
            inner.last_tick = Some(Instant::now());
        }

        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    /// Starts playback without resetting the playhead.
    pub fn resume(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();

        if !inner.state.is_playing && inner.program.is_some() {
            inner.state.is_playing = true;
            inner.last_tick = Some(Instant::now());
        }

        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    /// Stops playback, cross-fading to the static layer.
    pub fn pause(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();

        inner.state.is_playing = false;
        inner.last_tick = None;

        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    /// Advances one step, wrapping only when loop is on.
    pub fn next_step(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();

        let len = inner.step_count();
        if len > 0 {
            if inner.state.step_index + 1 >= len {
                if inner.state.looping {
                    inner.state.step_index = 0;
                    inner.wrapped = true;
                } else {
                    inner.state.step_index = len - 1;
                }
            } else {
                inner.state.step_index += 1;
            }
            inner.state.position_ms = 0.0;
        }

        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    /// Retreats one step, wrapping only when loop is on.
    pub fn previous_step(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();

        let len = inner.step_count();
        if len > 0 {
            inner.state.step_index = if inner.state.step_index == 0 {
                if inner.state.looping {
                    len - 1
                } else {
                    0
                }
            } else {
                inner.state.step_index - 1
            };
            inner.state.position_ms = 0.0;
            // Stepping backwards is a placement, never a wrap source.
            inner.wrapped = false;
        }

        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    /// Seeks to a step, resetting the position.
    ///
    /// An index past the end auto-extends the program with empty steps that
    /// copy the final step's duration and fade — an editor convenience for
    /// sketching programs outward. The extension replaces the program
    /// snapshot; the original `Arc` is untouched.
    pub fn set_step(self: &Arc<Self>, index: usize) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();

        match inner.program.clone() {
            Some(program) if !program.steps.is_empty() => {
                if index >= program.steps.len() {
                    let mut extended = (*program).clone();
                    let template = extended
                        .steps
                        .last()
                        .map(|s| (s.duration_ms, s.fade_ms))
                        .unwrap_or((500, 0));
                    while extended.steps.len() <= index {
                        extended.steps.push(ProgramStep {
                            id: uuid::Uuid::new_v4().to_string(),
                            duration_ms: template.0,
                            fade_ms: template.1,
                            frames: Vec::new(),
                        });
                    }
                    inner.program = Some(Arc::new(extended));
                    inner.state.step_index = index;
                } else {
                    inner.state.step_index = index;
                }
            }
            _ => inner.state.step_index = 0,
        }
        inner.state.position_ms = 0.0;
        inner.wrapped = false;

        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    /// Sets the pacing, clamped to 1..=500 steps per minute.
    pub fn set_spm(self: &Arc<Self>, spm: f64) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();
        inner.state.spm = clamp_spm(spm);
        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    /// Sets the loop flag.
    pub fn set_loop(self: &Arc<Self>, looping: bool) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();
        inner.state.looping = looping;
        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    /// Sets the blackout flag. Blackout is immediate, not cross-faded.
    pub fn set_blackout(self: &Arc<Self>, blackout: bool) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();
        inner.state.is_blackout = blackout;
        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    /// Changes the render rate, restarting whichever timer is active with
    /// the new period. Does not emit.
    pub fn set_frame_rate(self: &Arc<Self>, render_fps: u8) {
        let mut inner = self.inner.lock();
        inner.render_fps = render_fps.clamp(RENDER_FPS_MIN, RENDER_FPS_MAX);
        if inner.ticker.is_some() {
            inner.ticker = None;
            self.sync_ticker(&mut inner);
        }
    }

    /// Applies a partial state snapshot with clamping, restarting the right
    /// timer and cross-fading if the visible mode changed.
    pub fn apply_state_snapshot(self: &Arc<Self>, snapshot: &StateSnapshot) {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();

        if let Some(spm) = snapshot.spm {
            inner.state.spm = clamp_spm(spm);
        }
        if let Some(looping) = snapshot.looping {
            inner.state.looping = looping;
        }
        if let Some(blackout) = snapshot.is_blackout {
            inner.state.is_blackout = blackout;
        }
        if let Some(index) = snapshot.step_index {
            let step_count = inner.step_count();
            inner.state.step_index = index.min(step_count.saturating_sub(1));
            inner.wrapped = false;
        }
        if let Some(position) = snapshot.position_ms {
            inner.state.position_ms = position.max(0.0);
        }
        if let Some(playing) = snapshot.is_playing {
            let playing = playing && inner.program.is_some();
            if playing && !inner.state.is_playing {
                inner.last_tick = Some(Instant::now());
            }
            inner.state.is_playing = playing;
            if !playing {
                inner.last_tick = None;
            }
        }

        self.finish_op(&mut inner, pre_mode, pre_visible, false, true);
    }

    // ────────────────────────────────────────────────────────────────────
    // Layer A operations
    // ────────────────────────────────────────────────────────────────────

    /// Sets one manual override; returns whether anything changed.
    pub fn set_layer_a_value(
        self: &Arc<Self>,
        fixture_id: &str,
        feature_id: &str,
        values: &[f64],
    ) -> bool {
        self.apply_layer_a_batch(&[LayerAOp::Set {
            fixture_id: fixture_id.to_string(),
            feature_id: feature_id.to_string(),
            values: values.to_vec(),
        }])
    }

    /// Clears one feature's override; returns whether anything changed.
    pub fn clear_layer_a_feature(self: &Arc<Self>, fixture_id: &str, feature_id: &str) -> bool {
        self.apply_layer_a_batch(&[LayerAOp::ClearFeature {
            fixture_id: fixture_id.to_string(),
            feature_id: feature_id.to_string(),
        }])
    }

    /// Clears every override of one fixture; returns whether anything changed.
    pub fn clear_layer_a_fixture(self: &Arc<Self>, fixture_id: &str) -> bool {
        self.apply_layer_a_batch(&[LayerAOp::ClearFixture {
            fixture_id: fixture_id.to_string(),
        }])
    }

    /// Applies a batch of overrides atomically with respect to emission:
    /// at most one frame and one cross-fade start for the whole batch.
    pub fn apply_layer_a_batch(self: &Arc<Self>, ops: &[LayerAOp]) -> bool {
        let mut inner = self.inner.lock();
        let pre_mode = inner.mix_mode();
        let pre_visible = inner.visible_values();

        let mut changed = false;
        for op in ops {
            changed |= inner.layer_a.apply(op);
        }

        self.finish_op(&mut inner, pre_mode, pre_visible, changed, changed);
        changed
    }

    // ────────────────────────────────────────────────────────────────────
    // Tick handling
    // ────────────────────────────────────────────────────────────────────

    /// Timer callback: advances the playhead when playing, otherwise drives
    /// an in-flight cross-fade.
    pub(crate) fn on_tick(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        if inner.state.is_playing {
            self.sequencer_tick(&mut inner);
        } else if inner.transition.is_some() {
            Self::emit_frame(&mut inner);
            self.sync_ticker(&mut inner);
        } else {
            // Neither playing nor fading: the ticker has nothing to do.
            self.sync_ticker(&mut inner);
        }
    }

    fn sequencer_tick(self: &Arc<Self>, inner: &mut Inner) {
        let now = Instant::now();
        let dt = inner
            .last_tick
            .map(|t| now.duration_since(t).as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
            .clamp(0.0, MAX_TICK_DELTA_MS);
        inner.last_tick = Some(now);
        inner.state.position_ms += dt;

        if let Some(program) = inner.program.clone() {
            let len = program.steps.len();
            while len > 0 {
                let index = inner.state.step_index.min(len - 1);
                inner.state.step_index = index;
                let target = step_target_duration_ms(&program.steps[index], inner.state.spm);
                if inner.state.position_ms < target {
                    break;
                }
                inner.state.position_ms -= target;
                if index + 1 >= len {
                    if inner.state.looping {
                        inner.state.step_index = 0;
                        inner.wrapped = true;
                    } else {
                        // End of a one-shot program: clamp, stop, and fade
                        // out from the final sequencer values.
                        let from = inner.visible_values();
                        inner.state.step_index = len - 1;
                        inner.state.position_ms = 0.0;
                        inner.state.is_playing = false;
                        inner.last_tick = None;
                        inner.transition = Some(MixTransition::new(from));
                        break;
                    }
                } else {
                    inner.state.step_index = index + 1;
                }
            }
        }

        Self::emit_frame(inner);
        self.sync_ticker(inner);
    }

    // ────────────────────────────────────────────────────────────────────
    // Internals
    // ────────────────────────────────────────────────────────────────────

    /// Completes a mutating operation: starts a cross-fade when the visible
    /// mode flipped (or layer A changed while static), reconciles the
    /// ticker, and emits one frame.
    fn finish_op(
        self: &Arc<Self>,
        inner: &mut Inner,
        pre_mode: MixMode,
        pre_visible: LayerValueMap,
        layer_a_changed: bool,
        emit: bool,
    ) {
        let mode = inner.mix_mode();
        if mode != pre_mode || (layer_a_changed && mode == MixMode::Static) {
            inner.transition = Some(MixTransition::new(pre_visible));
        }
        self.sync_ticker(inner);
        if emit {
            Self::emit_frame(inner);
        }
    }

    /// Ensures exactly one ticker runs iff the playhead is advancing or a
    /// cross-fade is in flight, at the current render period.
    fn sync_ticker(self: &Arc<Self>, inner: &mut Inner) {
        let needs = inner.state.is_playing
            || inner.transition.as_ref().is_some_and(|t| !t.complete());
        if !needs {
            inner.ticker = None;
            return;
        }
        let period = tick_period(inner.render_fps);
        let running = inner.ticker.as_ref().is_some_and(|t| t.period() == period);
        if !running {
            inner.ticker = Some(spawn_ticker(Arc::downgrade(self), period));
        }
    }

    /// Builds and delivers one frame to all listeners, in order. A completed
    /// cross-fade is cleared first so the frame lands exactly on target.
    fn emit_frame(inner: &mut Inner) {
        if inner.transition.as_ref().is_some_and(|t| t.complete()) {
            inner.transition = None;
        }
        let frame = inner.build_frame();
        for (_, listener) in &inner.listeners {
            listener.on_frame(&frame);
        }
    }
}
