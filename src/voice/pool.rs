use crate::voice::voice::{Voice, VoiceState};
use crate::voice::{Lane, VoiceParams};
use crate::MAX_BLOCK_SIZE;

/*
Voice Pool
==========

Admission control and lifecycle ownership for voices, split into two lanes:

  Mono: at most one SOUNDING voice. A new note force-releases the holder
        immediately (its release tail still runs in a spare slot).
  Poly: fixed slot count (the polyphony cap). A new note takes a free slot
        or steals the OLDEST live voice — FIFO eviction, deterministic,
        never loudness-based, and never a refusal of the new note.

Slots are pre-allocated; note-on never allocates. Because the poly lane is
a fixed slot array, the number of live (sounding + releasing) voices can
never exceed the cap. Every started voice is eventually freed: either its
release tail completes inside render_block, or its slot is stolen.
*/

const MONO_SLOTS: usize = 2; // current voice + one release tail
pub const DEFAULT_POLY_VOICES: usize = 4;

pub struct VoicePool {
    sample_rate: f32,
    params: VoiceParams,
    /// Slots [0, MONO_SLOTS) are the mono lane, the rest the poly lane.
    voices: Vec<Voice>,
    age_counter: u64,
    temp_buffer: Vec<f32>,
}

impl VoicePool {
    pub fn new(sample_rate: f32, poly_voices: usize) -> Self {
        let params = VoiceParams::default();
        let voices = (0..MONO_SLOTS + poly_voices.max(1))
            .map(|_| Voice::new(sample_rate, params))
            .collect();

        Self {
            sample_rate,
            params,
            voices,
            age_counter: 0,
            temp_buffer: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    fn lane_range(&self, lane: Lane) -> std::ops::Range<usize> {
        match lane {
            Lane::Mono => 0..MONO_SLOTS,
            Lane::Poly => MONO_SLOTS..self.voices.len(),
        }
    }

    /// Trigger a note. See the module docs for the per-lane policy.
    pub fn note_on(&mut self, note: i32, velocity: f32, lane: Lane) {
        if lane == Lane::Mono {
            // Cut the current holder before admitting the new note
            for idx in self.lane_range(Lane::Mono) {
                if self.voices[idx].state() == VoiceState::Sounding {
                    self.voices[idx].release();
                }
            }
        }

        let range = self.lane_range(lane);
        let slot = self.voices[range.clone()]
            .iter()
            .position(|v| v.is_free())
            .map(|i| range.start + i)
            .unwrap_or_else(|| {
                // FIFO eviction: the oldest live voice in the lane
                let range = self.lane_range(lane);
                self.voices[range.clone()]
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, v)| v.age())
                    .map(|(i, _)| range.start + i)
                    .unwrap_or(range.start)
            });

        let age = self.age_counter;
        self.age_counter += 1;
        let params = self.params;
        self.voices[slot].start(note, velocity, lane, age, params);
    }

    /// Release every sounding voice matching `note`, across both lanes.
    /// No match is a routine no-op, not an error.
    pub fn note_off(&mut self, note: i32) {
        for voice in &mut self.voices {
            if voice.state() == VoiceState::Sounding && voice.note() == note {
                voice.release();
            }
        }
    }

    /// Release everything that is still sounding.
    pub fn all_notes_off(&mut self) {
        for voice in &mut self.voices {
            if voice.state() == VoiceState::Sounding {
                voice.release();
            }
        }
    }

    /// Store new defaults for future voices and live-apply the filter
    /// section to currently sounding ones.
    pub fn set_params(&mut self, params: VoiceParams) {
        self.params = params;
        for voice in &mut self.voices {
            if voice.is_live() {
                voice.apply_filter_params(&params);
            }
        }
    }

    pub fn params(&self) -> VoiceParams {
        self.params
    }

    /// Mix all live voices into `out` (caller clears the buffer).
    pub fn render_block(&mut self, out: &mut [f32], lfo_factor: f32) {
        let len = out.len().min(MAX_BLOCK_SIZE);
        for voice in &mut self.voices {
            if voice.is_live() {
                let temp = &mut self.temp_buffer[..len];
                temp.fill(0.0);
                voice.render_add(temp, lfo_factor);
                for (o, v) in out[..len].iter_mut().zip(temp.iter()) {
                    *o += v;
                }
            }
        }
    }

    pub fn live_count(&self, lane: Lane) -> usize {
        self.lane_range(lane)
            .filter(|&i| self.voices[i].is_live())
            .count()
    }

    pub fn sounding_count(&self, lane: Lane) -> usize {
        self.lane_range(lane)
            .filter(|&i| self.voices[i].state() == VoiceState::Sounding)
            .count()
    }

    pub fn poly_cap(&self) -> usize {
        self.voices.len() - MONO_SLOTS
    }
}
