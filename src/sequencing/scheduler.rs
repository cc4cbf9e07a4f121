use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rtrb::Producer;
use tracing::{debug, warn};

use crate::sequencing::pattern::SeqState;
use crate::sequencing::NoteEvent;
use crate::voice::Lane;

/*
Lookahead Scheduler
===================

A control-side thread wakes every 25 ms and pushes every note event whose
onset falls inside the next 100 ms of the sample clock. Timestamps are
absolute sample counts; the render side applies each event at its exact
offset inside a block, so timing survives any block size and an audio
callback that outruns the wake interval.

If the thread oversleeps, the catch-up loop emits every overdue step in
one poll. Steps are only committed once their events actually fit in the
queue; on overflow the cursor stays put and the next poll retries, so
overflow delays events rather than dropping them.

Swing displaces odd-index onsets by `swing` of a step; the underlying
grid keeps counting unswung, so even steps never move.
*/

const LOOKAHEAD_MS: f64 = 100.0;
const WAKE_INTERVAL: Duration = Duration::from_millis(25);
/// A step holds its note for this share of the step before the off event.
const GATE_RATIO: f64 = 0.8;

/// The pure scheduling state machine. Owns the step cursor and the
/// unswung time of the next step; `poll` is side-effect free apart from
/// queue pushes, which keeps the timing math testable without threads.
pub struct SchedulerCore {
    sample_rate: f64,
    step_index: u64,
    /// Unswung grid time of step `step_index`, in samples.
    next_step_time: f64,
}

impl SchedulerCore {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: f64::from(sample_rate),
            step_index: 0,
            next_step_time: 0.0,
        }
    }

    /// Re-anchor the grid: step 0 lands at `now`.
    pub fn reset(&mut self, now: u64) {
        self.step_index = 0;
        self.next_step_time = now as f64;
    }

    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    /// Emit every step whose onset falls before `now` + lookahead.
    pub fn poll(&mut self, now: u64, state: &SeqState, out: &mut Producer<NoteEvent>) {
        let step_samples = state.step_duration_samples(self.sample_rate as f32);
        let horizon = now as f64 + LOOKAHEAD_MS / 1000.0 * self.sample_rate;
        let swing = f64::from(state.swing.clamp(0.0, 0.99));

        while self.next_step_time < horizon {
            let swing_offset = if self.step_index % 2 == 1 {
                swing * step_samples
            } else {
                0.0
            };
            let on_time = (self.next_step_time + swing_offset).round() as u64;
            let off_time = (self.next_step_time + swing_offset + GATE_RATIO * step_samples)
                .round() as u64;

            let mut events = [None; 4];
            let mut count = 0;
            for lane in [Lane::Mono, Lane::Poly] {
                if let Some(step) = state.pattern(lane).step_at(self.step_index) {
                    events[count] = Some(NoteEvent::on(on_time, step.note, step.velocity, lane));
                    events[count + 1] = Some(NoteEvent::off(off_time, step.note, lane));
                    count += 2;
                }
            }

            // Commit the step only if all of its events fit
            if out.slots() < count {
                warn!(step = self.step_index, "event queue full, step deferred");
                return;
            }
            for event in events.iter().flatten() {
                // Cannot fail: slots were checked above
                let _ = out.push(*event);
            }

            self.step_index += 1;
            self.next_step_time += step_samples;
        }
    }
}

/// Owns the scheduler thread. `start` and `stop` toggle playback and are
/// idempotent; starting re-anchors the grid at the current clock so the
/// pattern always begins on step 0. Dropping the handle shuts the thread
/// down.
pub struct SchedulerHandle {
    playing: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn spawn(
        sample_rate: f32,
        state: Arc<Mutex<SeqState>>,
        clock: Arc<AtomicU64>,
        mut producer: Producer<NoteEvent>,
    ) -> Self {
        let playing = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let playing_flag = Arc::clone(&playing);
        let shutdown_flag = Arc::clone(&shutdown);
        let thread = thread::spawn(move || {
            let mut core = SchedulerCore::new(sample_rate);
            let mut was_playing = false;

            while !shutdown_flag.load(Ordering::Acquire) {
                let now = clock.load(Ordering::Acquire);
                let is_playing = playing_flag.load(Ordering::Acquire);

                if is_playing {
                    if !was_playing {
                        core.reset(now);
                    }
                    let state = match state.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    core.poll(now, &state, &mut producer);
                }
                was_playing = is_playing;

                thread::sleep(WAKE_INTERVAL);
            }
        });

        Self {
            playing,
            shutdown,
            thread: Some(thread),
        }
    }

    pub fn start(&self) {
        if !self.playing.swap(true, Ordering::AcqRel) {
            debug!("sequencer started");
        }
    }

    pub fn stop(&self) {
        if self.playing.swap(false, Ordering::AcqRel) {
            debug!("sequencer stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
