pub mod dsp;
pub mod engine; // Control handle / render core pair
pub mod fx; // Shared effects bus
pub mod params; // Typed parameter registry, presets, randomizer
pub mod sequencing; // Step patterns and the lookahead scheduler
pub mod voice; // Voice signal graph and per-lane polyphony

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
