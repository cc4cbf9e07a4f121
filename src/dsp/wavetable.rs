use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/*
Wavetable Bank
==============

Oscillator waveshapes are built once from their harmonic-series definitions
and read by phase afterwards. Each table holds one cycle:

  Sine:     fundamental only
  Triangle: odd harmonics, 1/n^2, alternating sign
  Saw:      all harmonics, 1/n
  Square:   odd harmonics, 1/n

Harmonics are capped well below Nyquist for audible fundamentals; aliasing
beyond that is accepted (waveform exactness is not a goal of this engine).

The bank doubles as the morph space: a fractional position in [0, 3] cross-
fades between adjacent tables (sine -> triangle -> saw -> square), which is
what the `oscA.wave` / `oscB.wave` parameters index into.
*/

pub const TABLE_LEN: usize = 2048;
const MAX_HARMONIC: usize = 48;

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
}

impl Waveform {
    /// Position of this waveform in the morph space.
    pub fn morph_position(self) -> f32 {
        match self {
            Waveform::Sine => 0.0,
            Waveform::Triangle => 1.0,
            Waveform::Saw => 2.0,
            Waveform::Square => 3.0,
        }
    }

    /// Resolve a waveform name as used by the string-keyed parameter API.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sine" => Some(Waveform::Sine),
            "triangle" => Some(Waveform::Triangle),
            "saw" | "sawtooth" => Some(Waveform::Saw),
            "square" => Some(Waveform::Square),
            _ => None,
        }
    }
}

/// Amplitude of harmonic `n` (1-based) for a waveform.
fn harmonic_amplitude(wave: Waveform, n: usize) -> f32 {
    let nf = n as f32;
    match wave {
        Waveform::Sine => {
            if n == 1 {
                1.0
            } else {
                0.0
            }
        }
        Waveform::Triangle => {
            if n % 2 == 1 {
                let sign = if (n / 2) % 2 == 0 { 1.0 } else { -1.0 };
                sign / (nf * nf)
            } else {
                0.0
            }
        }
        Waveform::Saw => 1.0 / nf,
        Waveform::Square => {
            if n % 2 == 1 {
                1.0 / nf
            } else {
                0.0
            }
        }
    }
}

fn build_table(wave: Waveform) -> Vec<f32> {
    let mut table = vec![0.0f32; TABLE_LEN];
    for n in 1..=MAX_HARMONIC {
        let amp = harmonic_amplitude(wave, n);
        if amp == 0.0 {
            continue;
        }
        for (i, sample) in table.iter_mut().enumerate() {
            let phase = i as f32 / TABLE_LEN as f32;
            *sample += amp * (std::f32::consts::TAU * n as f32 * phase).sin();
        }
    }

    // Normalize to unit peak so morphing doesn't jump in level
    let peak = table.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
    if peak > 0.0 {
        for sample in table.iter_mut() {
            *sample /= peak;
        }
    }
    table
}

/// The four waveshapes, in morph order.
pub struct WavetableBank {
    tables: [Vec<f32>; 4],
}

impl WavetableBank {
    /// Shared process-wide bank, built on first use.
    pub fn shared() -> &'static WavetableBank {
        static BANK: OnceLock<WavetableBank> = OnceLock::new();
        BANK.get_or_init(|| WavetableBank {
            tables: [
                build_table(Waveform::Sine),
                build_table(Waveform::Triangle),
                build_table(Waveform::Saw),
                build_table(Waveform::Square),
            ],
        })
    }

    /// Read a single table at a fractional phase in [0, 1).
    #[inline]
    pub fn read(&self, wave: Waveform, phase: f32) -> f32 {
        self.read_table(wave.morph_position() as usize, phase)
    }

    /// Read the morph space at `position` in [0, 3], cross-fading between
    /// adjacent tables.
    #[inline]
    pub fn read_morph(&self, position: f32, phase: f32) -> f32 {
        let position = position.clamp(0.0, 3.0);
        let low = position.floor() as usize;
        let high = (low + 1).min(3);
        let frac = position - low as f32;

        let a = self.read_table(low, phase);
        if frac <= f32::EPSILON {
            return a;
        }
        let b = self.read_table(high, phase);
        a + (b - a) * frac
    }

    #[inline]
    fn read_table(&self, index: usize, phase: f32) -> f32 {
        let table = &self.tables[index.min(3)];
        let pos = phase.rem_euclid(1.0) * TABLE_LEN as f32;
        let i0 = pos as usize % TABLE_LEN;
        let i1 = (i0 + 1) % TABLE_LEN;
        let frac = pos - pos.floor();
        table[i0] + (table[i1] - table[i0]) * frac
    }
}
