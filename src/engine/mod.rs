//! The engine pair: a control-side `Engine` handle and the realtime
//! `EngineCore` that lives in the audio callback. They communicate over
//! lock-free queues only; the render path never locks or allocates.

pub mod spectrum;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, warn};

use crate::dsp::lfo::Lfo;
use crate::dsp::Waveform;
use crate::fx::{EffectsBus, FxParams};
use crate::params::store::ParamDomain;
use crate::params::{ParamStore, PresetError};
use crate::sequencing::pattern::Step;
use crate::sequencing::{NoteEvent, NoteEventKind, SchedulerHandle, SeqState};
use crate::voice::pool::DEFAULT_POLY_VOICES;
use crate::voice::{Lane, VoiceParams, VoicePool};
use crate::MAX_BLOCK_SIZE;

pub use spectrum::Spectrum;

const CMD_QUEUE: usize = 64;
const NOTE_QUEUE: usize = 256;
const SCHED_QUEUE: usize = 512;
const VIZ_QUEUE: usize = 8192;
/// Most events held pending at once; overflow stays in the queues.
const EVENT_BATCH: usize = 128;

/// Control-to-render messages. Whole snapshots, so a lost message is
/// healed by the next one.
#[derive(Debug, Clone, Copy)]
pub enum EngineCommand {
    Voice(VoiceParams),
    Fx(FxParams),
    Lfo { rate_hz: f32, depth: f32 },
    AllNotesOff,
}

/// The control-side handle: parameter store, presets, pattern editing,
/// transport, and manual note input. Clone-free; one owner.
pub struct Engine {
    store: ParamStore,
    sample_rate: f32,
    cmd_tx: Producer<EngineCommand>,
    note_tx: Producer<NoteEvent>,
    scheduler: SchedulerHandle,
    seq_state: Arc<Mutex<SeqState>>,
    clock: Arc<AtomicU64>,
    viz_rx: Consumer<f32>,
}

/// The render half. Owns every audio object; driven by `process_block`
/// from the audio callback.
pub struct EngineCore {
    sample_rate: f32,
    pool: VoicePool,
    bus: EffectsBus,
    lfo: Lfo,
    cmd_rx: Consumer<EngineCommand>,
    sched_rx: Consumer<NoteEvent>,
    note_rx: Consumer<NoteEvent>,
    clock: Arc<AtomicU64>,
    viz_tx: Producer<f32>,
    pending: Vec<NoteEvent>,
}

impl Engine {
    pub fn new(sample_rate: f32) -> (Engine, EngineCore) {
        Engine::with_poly_voices(sample_rate, DEFAULT_POLY_VOICES)
    }

    pub fn with_poly_voices(sample_rate: f32, poly_voices: usize) -> (Engine, EngineCore) {
        let (cmd_tx, cmd_rx) = RingBuffer::new(CMD_QUEUE);
        let (note_tx, note_rx) = RingBuffer::new(NOTE_QUEUE);
        let (sched_tx, sched_rx) = RingBuffer::new(SCHED_QUEUE);
        let (viz_tx, viz_rx) = RingBuffer::new(VIZ_QUEUE);

        let clock = Arc::new(AtomicU64::new(0));
        let seq_state = Arc::new(Mutex::new(SeqState::default()));
        let scheduler = SchedulerHandle::spawn(
            sample_rate,
            Arc::clone(&seq_state),
            Arc::clone(&clock),
            sched_tx,
        );

        let store = ParamStore::default();
        let core = EngineCore {
            sample_rate,
            pool: VoicePool::new(sample_rate, poly_voices),
            bus: EffectsBus::new(sample_rate),
            lfo: Lfo::new(Waveform::Sine, store.lfo_rate_hz, store.lfo_depth),
            cmd_rx,
            sched_rx,
            note_rx,
            clock: Arc::clone(&clock),
            viz_tx,
            pending: Vec::with_capacity(EVENT_BATCH),
        };

        let mut engine = Engine {
            store,
            sample_rate,
            cmd_tx,
            note_tx,
            scheduler,
            seq_state,
            clock,
            viz_rx,
        };
        engine.sync_all();
        (engine, core)
    }

    /// Set a parameter by its flat dotted name. Values are clamped, never
    /// rejected; an unknown name returns false and changes nothing.
    pub fn set_param(&mut self, name: &str, value: f32) -> bool {
        let Some(domain) = self.store.set(name, value) else {
            warn!(name, "unknown parameter");
            return false;
        };
        self.push_domain(domain);
        true
    }

    /// Set a parameter from a string value: waveform and filter-type
    /// names ("oscA.wave" = "saw", "filter1.type" = "highpass"), or a
    /// numeric string for any key.
    pub fn set_param_str(&mut self, name: &str, value: &str) -> bool {
        let Some(domain) = self.store.set_str(name, value) else {
            warn!(name, value, "unknown parameter or value");
            return false;
        };
        self.push_domain(domain);
        true
    }

    pub fn get_param(&self, name: &str) -> Option<f32> {
        self.store.get(name)
    }

    /// Play a note now: stamped from the sample clock, it lands at the
    /// start of the next rendered block.
    pub fn note_on(&mut self, note: i32, velocity: f32, lane: Lane) {
        let now = self.clock.load(Ordering::Acquire);
        self.note_on_at(now, note, velocity, lane);
    }

    pub fn note_off(&mut self, note: i32, lane: Lane) {
        let now = self.clock.load(Ordering::Acquire);
        self.note_off_at(now, note, lane);
    }

    /// Trigger a note at an absolute sample time. Times inside a future
    /// block are honored at their exact intra-block offset; past times
    /// apply at the start of the next block.
    pub fn note_on_at(&mut self, time: u64, note: i32, velocity: f32, lane: Lane) {
        let event = NoteEvent::on(time, note, velocity.clamp(0.0, 1.0), lane);
        if self.note_tx.push(event).is_err() {
            warn!(note, "note queue full, note dropped");
        }
    }

    pub fn note_off_at(&mut self, time: u64, note: i32, lane: Lane) {
        if self.note_tx.push(NoteEvent::off(time, note, lane)).is_err() {
            warn!(note, "note queue full, note-off dropped");
        }
    }

    /// Start the sequencer. Idempotent.
    pub fn play(&self) {
        self.scheduler.start();
    }

    /// Stop the sequencer. Idempotent. Cancels future wakes only:
    /// already-emitted events play out and sounding voices release on
    /// their own gate-offs.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Release every sounding voice, manual notes included.
    pub fn all_notes_off(&mut self) {
        self.send(EngineCommand::AllNotesOff);
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    /// Reroll patterns and timbre from `seed`. Same seed, same result.
    pub fn randomize(&mut self, seed: u64) {
        {
            let mut seq = lock(&self.seq_state);
            crate::params::random::randomize(seed, &mut self.store, &mut seq);
        }
        debug!(seed, "randomized");
        self.sync_all();
    }

    pub fn set_step(&self, lane: Lane, slot: usize, step: Option<Step>) {
        lock(&self.seq_state).pattern_mut(lane).set_step(slot, step);
    }

    pub fn step_at(&self, lane: Lane, index: u64) -> Option<Step> {
        lock(&self.seq_state).pattern(lane).step_at(index)
    }

    pub fn save_preset(&self) -> String {
        self.store.save_state()
    }

    /// Apply a preset. All-or-nothing: a malformed document leaves every
    /// parameter and pattern as it was. A valid one merges over engine
    /// defaults (omitted keys return to their default) and rebuilds the
    /// patterns from the preset's randomizer seed.
    pub fn load_preset(&mut self, json: &str) -> Result<(), PresetError> {
        self.store.load_state(json)?;
        {
            let mut seq = lock(&self.seq_state);
            crate::params::random::generate_patterns(
                self.store.seed,
                self.store.seq_length,
                &mut seq,
            );
        }
        self.sync_all();
        Ok(())
    }

    pub fn current_time(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Drain the visualization tap into `out`; returns how many samples
    /// were available. The tap is lossy by design.
    pub fn take_viz(&mut self, out: &mut Vec<f32>) -> usize {
        let mut taken = 0;
        while let Ok(sample) = self.viz_rx.pop() {
            out.push(sample);
            taken += 1;
        }
        taken
    }

    fn push_domain(&mut self, domain: ParamDomain) {
        match domain {
            ParamDomain::Voice => self.send(EngineCommand::Voice(self.store.voice)),
            ParamDomain::Fx => self.send(EngineCommand::Fx(self.store.fx)),
            ParamDomain::Lfo => self.send(EngineCommand::Lfo {
                rate_hz: self.store.lfo_rate_hz,
                depth: self.store.lfo_depth,
            }),
            ParamDomain::Seq => self.sync_seq(),
        }
    }

    fn send(&mut self, command: EngineCommand) {
        // Dropped commands heal on the next snapshot push
        if self.cmd_tx.push(command).is_err() {
            warn!("command queue full, command dropped");
        }
    }

    fn sync_seq(&self) {
        let mut seq = lock(&self.seq_state);
        seq.bpm = self.store.bpm;
        seq.swing = self.store.swing;
        seq.subdivision = self.store.subdivision;
        let length = self.store.seq_length;
        seq.mono_pattern.set_length(length);
        seq.poly_pattern.set_length(length);
    }

    fn sync_all(&mut self) {
        self.send(EngineCommand::Voice(self.store.voice));
        self.send(EngineCommand::Fx(self.store.fx));
        self.send(EngineCommand::Lfo {
            rate_hz: self.store.lfo_rate_hz,
            depth: self.store.lfo_depth,
        });
        self.sync_seq();
    }
}

fn lock(state: &Mutex<SeqState>) -> MutexGuard<'_, SeqState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl EngineCore {
    /// Render one block of mono audio. Realtime-safe: queue pops, field
    /// writes and DSP only.
    pub fn process_block(&mut self, out: &mut [f32]) {
        let len = out.len().min(MAX_BLOCK_SIZE);
        let out = &mut out[..len];
        out.fill(0.0);

        self.drain_commands();

        let start = self.clock.load(Ordering::Acquire);
        let end = start + len as u64;
        self.collect_events();

        let lfo_value = self.lfo.next_block(len, self.sample_rate);
        let lfo_factor = 2.0_f32.powf(lfo_value);

        // Apply each due event at its exact offset, rendering the span
        // before it; events stamped beyond this block stay pending
        let mut cursor = 0usize;
        let mut applied = 0usize;
        while applied < self.pending.len() {
            let event = self.pending[applied];
            if event.time >= end {
                break;
            }
            let offset = (event.time.saturating_sub(start) as usize).min(len);
            if offset > cursor {
                self.pool.render_block(&mut out[cursor..offset], lfo_factor);
                cursor = offset;
            }
            match event.kind {
                NoteEventKind::On => self.pool.note_on(event.note, event.velocity, event.lane),
                NoteEventKind::Off => self.pool.note_off(event.note),
            }
            applied += 1;
        }
        if cursor < len {
            self.pool.render_block(&mut out[cursor..len], lfo_factor);
        }
        self.pending.drain(..applied);

        self.bus.process_block(out);

        self.clock.store(end, Ordering::Release);

        for &sample in out.iter() {
            if self.viz_tx.push(sample).is_err() {
                break;
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.cmd_rx.pop() {
            match command {
                EngineCommand::Voice(params) => self.pool.set_params(params),
                EngineCommand::Fx(params) => self.bus.apply_params(&params),
                EngineCommand::Lfo { rate_hz, depth } => {
                    self.lfo.rate_hz = rate_hz;
                    self.lfo.depth = depth;
                }
                EngineCommand::AllNotesOff => self.pool.all_notes_off(),
            }
        }
    }

    /// Pop everything the queues hold into `pending` and keep it ordered
    /// by time. The queues are not time-ordered (the scheduler pushes a
    /// swung step's off after the next step's on), so events are held
    /// pending across blocks rather than gated on the queue head; overdue
    /// events (a stalled callback, a late scheduler) sort to the front
    /// and apply at offset 0.
    fn collect_events(&mut self) {
        let pending = &mut self.pending;
        for queue in [&mut self.sched_rx, &mut self.note_rx] {
            while pending.len() < EVENT_BATCH {
                match queue.pop() {
                    Ok(event) => pending.push(event),
                    Err(_) => break,
                }
            }
        }
        pending.sort_by_key(|event| event.time);
    }

    pub fn live_voices(&self, lane: Lane) -> usize {
        self.pool.live_count(lane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn render(core: &mut EngineCore, blocks: usize, block: usize) -> Vec<f32> {
        let mut all = Vec::new();
        for _ in 0..blocks {
            let mut out = vec![0.0f32; block];
            core.process_block(&mut out);
            all.extend(out);
        }
        all
    }

    #[test]
    fn note_on_produces_audio() {
        let (mut engine, mut core) = Engine::new(SAMPLE_RATE);
        engine.note_on(60, 0.9, Lane::Poly);

        let audio = render(&mut core, 8, 512);
        let energy: f32 = audio.iter().map(|x| x * x).sum();
        assert!(energy > 0.001, "a triggered note must be audible");
    }

    #[test]
    fn silent_engine_renders_silence() {
        let (_engine, mut core) = Engine::new(SAMPLE_RATE);
        let audio = render(&mut core, 4, 512);
        assert!(audio.iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn clock_advances_with_rendered_samples() {
        let (engine, mut core) = Engine::new(SAMPLE_RATE);
        render(&mut core, 3, 512);
        assert_eq!(engine.current_time(), 1536);
    }

    #[test]
    fn events_apply_at_their_sample_offset() {
        let (mut engine, mut core) = Engine::new(SAMPLE_RATE);
        render(&mut core, 1, 512); // clock now 512

        // An event stamped mid-way through the next block
        engine.note_on_at(700, 60, 1.0, Lane::Poly);

        let mut out = vec![0.0f32; 512];
        core.process_block(&mut out);

        assert!(
            out[..188].iter().all(|s| s.abs() < 1e-6),
            "no audio before the event offset"
        );
        let after: f32 = out[188..300].iter().map(|x| x.abs()).sum();
        assert!(after > 0.0, "audio must start at the event offset");
    }

    #[test]
    fn future_events_wait_for_their_block() {
        let (mut engine, mut core) = Engine::new(SAMPLE_RATE);
        engine.note_on_at(10_000, 60, 1.0, Lane::Poly);

        let audio = render(&mut core, 4, 512); // covers samples 0..2048
        assert!(audio.iter().all(|s| s.abs() < 1e-6));
        assert_eq!(core.live_voices(Lane::Poly), 0);
    }

    #[test]
    fn earlier_events_queued_behind_later_ones_still_land_on_time() {
        let (mut engine, mut core) = Engine::new(SAMPLE_RATE);
        // The scheduler's swing emission order: a swung step's off is
        // pushed before the next step's on, which carries the earlier time
        engine.note_off_at(13_800, 60, Lane::Poly);
        engine.note_on_at(12_000, 60, 1.0, Lane::Poly);

        render(&mut core, 26, 512); // clock now 13_312
        assert_eq!(
            core.live_voices(Lane::Poly),
            1,
            "note stamped 12_000 must be sounding by sample 13_312"
        );
    }

    #[test]
    fn string_parameters_resolve_names() {
        let (mut engine, _core) = Engine::new(SAMPLE_RATE);
        assert!(engine.set_param_str("filter2.type", "bandpass"));
        assert_eq!(engine.get_param("filter2.type"), Some(2.0));
        assert!(engine.set_param_str("oscB.wave", "square"));
        assert_eq!(engine.get_param("oscB.morph"), Some(3.0));
        assert!(engine.set_param_str("delay.mix", "0.4"));
        assert_eq!(engine.get_param("delay.mix"), Some(0.4));
        assert!(!engine.set_param_str("oscB.wave", "theremin"));
    }

    #[test]
    fn parameter_changes_reach_the_render_side() {
        let (mut engine, mut core) = Engine::new(SAMPLE_RATE);
        engine.set_param("master.gain", 0.0);
        engine.note_on(60, 1.0, Lane::Poly);

        let audio = render(&mut core, 8, 512);
        assert!(audio.iter().all(|s| s.abs() < 1e-5));
    }

    #[test]
    fn all_notes_off_releases_sounding_voices() {
        let (mut engine, mut core) = Engine::new(SAMPLE_RATE);
        engine.note_on(60, 1.0, Lane::Poly);
        render(&mut core, 2, 512);
        assert_eq!(core.live_voices(Lane::Poly), 1);

        engine.all_notes_off();
        // Default release is 250 ms; render past it
        render(&mut core, 40, 512);
        assert_eq!(core.live_voices(Lane::Poly), 0);
    }

    #[test]
    fn transport_stop_keeps_held_notes() {
        let (mut engine, mut core) = Engine::new(SAMPLE_RATE);
        engine.play();
        engine.note_on(60, 1.0, Lane::Poly);
        render(&mut core, 2, 512);

        engine.stop();
        render(&mut core, 2, 512);
        assert_eq!(core.live_voices(Lane::Poly), 1, "stop is transport only");
    }

    #[test]
    fn randomize_is_reproducible_through_the_engine() {
        let (mut a, _core_a) = Engine::new(SAMPLE_RATE);
        let (mut b, _core_b) = Engine::new(SAMPLE_RATE);
        a.randomize(31337);
        b.randomize(31337);

        assert_eq!(a.save_preset(), b.save_preset());
        for index in 0..16 {
            assert_eq!(a.step_at(Lane::Poly, index), b.step_at(Lane::Poly, index));
        }
    }

    #[test]
    fn preset_survives_a_round_trip() {
        let (mut engine, _core) = Engine::new(SAMPLE_RATE);
        engine.randomize(99);
        let saved = engine.save_preset();

        let (mut other, _other_core) = Engine::new(SAMPLE_RATE);
        other.load_preset(&saved).unwrap();

        assert_eq!(other.save_preset(), saved);
        for index in 0..16 {
            assert_eq!(
                engine.step_at(Lane::Mono, index),
                other.step_at(Lane::Mono, index)
            );
        }
    }

    #[test]
    fn viz_tap_carries_the_rendered_signal() {
        let (mut engine, mut core) = Engine::new(SAMPLE_RATE);
        engine.note_on(60, 1.0, Lane::Poly);
        render(&mut core, 2, 512);

        let mut viz = Vec::new();
        let taken = engine.take_viz(&mut viz);
        assert!(taken > 0);
        assert!(viz.iter().any(|s| s.abs() > 0.0));
    }
}
