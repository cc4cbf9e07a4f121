use serde_json::Value;
use tracing::warn;

use crate::dsp::filter::FilterType;
use crate::dsp::Waveform;
use crate::fx::FxParams;
use crate::params::PresetError;
use crate::voice::VoiceParams;

/*
Parameter Store
===============

The control-side source of truth for every tweakable value, addressed by
flat dotted names ("oscA.morph", "delay.feedback"). Values are clamped
into their declared range on every set; out-of-range input is corrected,
never rejected.

Presets are a flat JSON object of those names plus the randomizer seed.
Loading validates the whole document first and applies it only if every
recognized key holds a number, so a malformed preset leaves the store
untouched. A valid preset merges over engine defaults: keys it omits
return to their default value. Unknown keys are ignored with a warning,
which keeps old presets loadable across releases.
*/

/// Which side of the engine consumes a parameter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDomain {
    Voice,
    Fx,
    Lfo,
    Seq,
}

pub struct ParamDef {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub domain: ParamDomain,
}

const fn def(name: &'static str, min: f32, max: f32, domain: ParamDomain) -> ParamDef {
    ParamDef { name, min, max, domain }
}

use self::ParamDomain::{Fx, Lfo, Seq, Voice};

pub const PARAM_DEFS: &[ParamDef] = &[
    def("oscA.morph", 0.0, 3.0, Voice),
    def("oscA.semitone", -24.0, 24.0, Voice),
    def("oscA.fine", -100.0, 100.0, Voice),
    def("oscA.level", 0.0, 1.0, Voice),
    def("oscA.pan", -1.0, 1.0, Voice),
    def("oscB.morph", 0.0, 3.0, Voice),
    def("oscB.semitone", -24.0, 24.0, Voice),
    def("oscB.fine", -100.0, 100.0, Voice),
    def("oscB.level", 0.0, 1.0, Voice),
    def("oscB.pan", -1.0, 1.0, Voice),
    def("sub.blend", 0.0, 1.0, Voice),
    def("sub.level", 0.0, 1.0, Voice),
    def("fm.ratio", 0.25, 8.0, Voice),
    def("fm.index", 0.0, 10.0, Voice),
    def("fm.attack", 0.1, 2_000.0, Voice),
    def("fm.decay", 0.1, 2_000.0, Voice),
    def("filter1.type", 0.0, 3.0, Voice),
    def("filter1.cutoff", 20.0, 20_000.0, Voice),
    def("filter1.res", 0.0, 0.99, Voice),
    def("filter1.drive", 0.1, 5.0, Voice),
    def("filter2.type", 0.0, 3.0, Voice),
    def("filter2.cutoff", 20.0, 20_000.0, Voice),
    def("filter2.res", 0.0, 0.99, Voice),
    def("filter2.drive", 0.1, 5.0, Voice),
    def("filter.mix", 0.0, 1.0, Voice),
    def("fenv.attack", 0.1, 10_000.0, Voice),
    def("fenv.decay", 0.1, 10_000.0, Voice),
    def("fenv.sustain", 0.0, 1.0, Voice),
    def("fenv.release", 0.1, 10_000.0, Voice),
    def("fenv.amount", -1.0, 1.0, Voice),
    def("fenv.octaves", 0.0, 8.0, Voice),
    def("amp.attack", 0.1, 10_000.0, Voice),
    def("amp.decay", 0.1, 10_000.0, Voice),
    def("amp.sustain", 0.0, 1.0, Voice),
    def("amp.release", 0.1, 10_000.0, Voice),
    def("mod.attack", 0.1, 10_000.0, Voice),
    def("mod.decay", 0.1, 10_000.0, Voice),
    def("mod.sustain", 0.0, 1.0, Voice),
    def("mod.release", 0.1, 10_000.0, Voice),
    def("chorus.rate", 0.1, 10.0, Fx),
    def("chorus.depth", 0.0, 10.0, Fx),
    def("chorus.mix", 0.0, 1.0, Fx),
    def("delay.time", 1.0, 2_000.0, Fx),
    def("delay.feedback", 0.0, 0.95, Fx),
    def("delay.mix", 0.0, 1.0, Fx),
    def("reverb.size", 0.0, 1.0, Fx),
    def("reverb.decay", 0.0, 1.0, Fx),
    def("reverb.predelay", 0.0, 250.0, Fx),
    def("reverb.mix", 0.0, 1.0, Fx),
    def("transient.attack", -1.0, 1.0, Fx),
    def("transient.sustain", -1.0, 1.0, Fx),
    def("master.gain", 0.0, 2.0, Fx),
    def("lfo.rate", 0.01, 20.0, Lfo),
    def("lfo.depth", 0.0, 4.0, Lfo),
    def("seq.bpm", 20.0, 300.0, Seq),
    def("seq.swing", 0.0, 0.99, Seq),
    def("seq.length", 1.0, 64.0, Seq),
    def("seq.subdivision", 1.0, 8.0, Seq),
];

pub fn param_def(name: &str) -> Option<&'static ParamDef> {
    PARAM_DEFS.iter().find(|d| d.name == name)
}

pub struct ParamStore {
    pub voice: VoiceParams,
    pub fx: FxParams,
    pub lfo_rate_hz: f32,
    pub lfo_depth: f32,
    pub bpm: f32,
    pub swing: f32,
    pub seq_length: usize,
    pub subdivision: u32,
    /// Seed of the last randomize, saved with presets.
    pub seed: u64,
}

impl Default for ParamStore {
    fn default() -> Self {
        Self {
            voice: VoiceParams::default(),
            fx: FxParams::default(),
            lfo_rate_hz: 0.25,
            lfo_depth: 0.5,
            bpm: 120.0,
            swing: 0.0,
            seq_length: 16,
            subdivision: 4,
            seed: 1,
        }
    }
}

impl ParamStore {
    pub fn get(&self, name: &str) -> Option<f32> {
        let v = &self.voice;
        Some(match name {
            "oscA.morph" => v.osc_a.morph,
            "oscA.semitone" => v.osc_a.semitone,
            "oscA.fine" => v.osc_a.fine_cents,
            "oscA.level" => v.osc_a.level,
            "oscA.pan" => v.osc_a.pan,
            "oscB.morph" => v.osc_b.morph,
            "oscB.semitone" => v.osc_b.semitone,
            "oscB.fine" => v.osc_b.fine_cents,
            "oscB.level" => v.osc_b.level,
            "oscB.pan" => v.osc_b.pan,
            "sub.blend" => v.sub.blend,
            "sub.level" => v.sub.level,
            "fm.ratio" => v.fm.ratio,
            "fm.index" => v.fm.index,
            "fm.attack" => v.fm.attack_ms,
            "fm.decay" => v.fm.decay_ms,
            "filter1.type" => v.filter1.filter_type.index() as f32,
            "filter1.cutoff" => v.filter1.cutoff_hz,
            "filter1.res" => v.filter1.resonance,
            "filter1.drive" => v.filter1.drive,
            "filter2.type" => v.filter2.filter_type.index() as f32,
            "filter2.cutoff" => v.filter2.cutoff_hz,
            "filter2.res" => v.filter2.resonance,
            "filter2.drive" => v.filter2.drive,
            "filter.mix" => v.filter_mix,
            "fenv.attack" => v.filter_env.env.attack_ms,
            "fenv.decay" => v.filter_env.env.decay_ms,
            "fenv.sustain" => v.filter_env.env.sustain_level,
            "fenv.release" => v.filter_env.env.release_ms,
            "fenv.amount" => v.filter_env.amount,
            "fenv.octaves" => v.filter_env.octave_range,
            "amp.attack" => v.amp_env.attack_ms,
            "amp.decay" => v.amp_env.decay_ms,
            "amp.sustain" => v.amp_env.sustain_level,
            "amp.release" => v.amp_env.release_ms,
            "mod.attack" => v.mod_env.attack_ms,
            "mod.decay" => v.mod_env.decay_ms,
            "mod.sustain" => v.mod_env.sustain_level,
            "mod.release" => v.mod_env.release_ms,
            "chorus.rate" => self.fx.chorus_rate_hz,
            "chorus.depth" => self.fx.chorus_depth_ms,
            "chorus.mix" => self.fx.chorus_mix,
            "delay.time" => self.fx.delay_time_ms,
            "delay.feedback" => self.fx.delay_feedback,
            "delay.mix" => self.fx.delay_mix,
            "reverb.size" => self.fx.reverb_size,
            "reverb.decay" => self.fx.reverb_decay,
            "reverb.predelay" => self.fx.reverb_predelay_ms,
            "reverb.mix" => self.fx.reverb_mix,
            "transient.attack" => self.fx.transient_attack,
            "transient.sustain" => self.fx.transient_sustain,
            "master.gain" => self.fx.master_gain,
            "lfo.rate" => self.lfo_rate_hz,
            "lfo.depth" => self.lfo_depth,
            "seq.bpm" => self.bpm,
            "seq.swing" => self.swing,
            "seq.length" => self.seq_length as f32,
            "seq.subdivision" => self.subdivision as f32,
            _ => return None,
        })
    }

    /// Clamp `value` into the key's range and store it. Returns the domain
    /// the change belongs to, or `None` for an unknown key.
    pub fn set(&mut self, name: &str, value: f32) -> Option<ParamDomain> {
        let def = param_def(name)?;
        let value = value.clamp(def.min, def.max);
        self.apply(name, value);
        Some(def.domain)
    }

    /// Set a parameter from a string. Waveforms and filter types resolve
    /// by name ("saw", "highpass"); any other key accepts a numeric
    /// string. Unresolvable names return `None` and change nothing.
    pub fn set_str(&mut self, name: &str, value: &str) -> Option<ParamDomain> {
        if let Ok(number) = value.parse::<f32>() {
            return self.set(name, number);
        }
        match name {
            "oscA.wave" => self.set("oscA.morph", Waveform::from_name(value)?.morph_position()),
            "oscB.wave" => self.set("oscB.morph", Waveform::from_name(value)?.morph_position()),
            "filter1.type" | "filter2.type" => {
                self.set(name, FilterType::from_name(value)?.index() as f32)
            }
            _ => None,
        }
    }

    fn apply(&mut self, name: &str, value: f32) {
        let v = &mut self.voice;
        match name {
            "oscA.morph" => v.osc_a.morph = value,
            "oscA.semitone" => v.osc_a.semitone = value,
            "oscA.fine" => v.osc_a.fine_cents = value,
            "oscA.level" => v.osc_a.level = value,
            "oscA.pan" => v.osc_a.pan = value,
            "oscB.morph" => v.osc_b.morph = value,
            "oscB.semitone" => v.osc_b.semitone = value,
            "oscB.fine" => v.osc_b.fine_cents = value,
            "oscB.level" => v.osc_b.level = value,
            "oscB.pan" => v.osc_b.pan = value,
            "sub.blend" => v.sub.blend = value,
            "sub.level" => v.sub.level = value,
            "fm.ratio" => v.fm.ratio = value,
            "fm.index" => v.fm.index = value,
            "fm.attack" => v.fm.attack_ms = value,
            "fm.decay" => v.fm.decay_ms = value,
            "filter1.type" => v.filter1.filter_type = FilterType::from_index(value as u32),
            "filter1.cutoff" => v.filter1.cutoff_hz = value,
            "filter1.res" => v.filter1.resonance = value,
            "filter1.drive" => v.filter1.drive = value,
            "filter2.type" => v.filter2.filter_type = FilterType::from_index(value as u32),
            "filter2.cutoff" => v.filter2.cutoff_hz = value,
            "filter2.res" => v.filter2.resonance = value,
            "filter2.drive" => v.filter2.drive = value,
            "filter.mix" => v.filter_mix = value,
            "fenv.attack" => v.filter_env.env.attack_ms = value,
            "fenv.decay" => v.filter_env.env.decay_ms = value,
            "fenv.sustain" => v.filter_env.env.sustain_level = value,
            "fenv.release" => v.filter_env.env.release_ms = value,
            "fenv.amount" => v.filter_env.amount = value,
            "fenv.octaves" => v.filter_env.octave_range = value,
            "amp.attack" => v.amp_env.attack_ms = value,
            "amp.decay" => v.amp_env.decay_ms = value,
            "amp.sustain" => v.amp_env.sustain_level = value,
            "amp.release" => v.amp_env.release_ms = value,
            "mod.attack" => v.mod_env.attack_ms = value,
            "mod.decay" => v.mod_env.decay_ms = value,
            "mod.sustain" => v.mod_env.sustain_level = value,
            "mod.release" => v.mod_env.release_ms = value,
            "chorus.rate" => self.fx.chorus_rate_hz = value,
            "chorus.depth" => self.fx.chorus_depth_ms = value,
            "chorus.mix" => self.fx.chorus_mix = value,
            "delay.time" => self.fx.delay_time_ms = value,
            "delay.feedback" => self.fx.delay_feedback = value,
            "delay.mix" => self.fx.delay_mix = value,
            "reverb.size" => self.fx.reverb_size = value,
            "reverb.decay" => self.fx.reverb_decay = value,
            "reverb.predelay" => self.fx.reverb_predelay_ms = value,
            "reverb.mix" => self.fx.reverb_mix = value,
            "transient.attack" => self.fx.transient_attack = value,
            "transient.sustain" => self.fx.transient_sustain = value,
            "master.gain" => self.fx.master_gain = value,
            "lfo.rate" => self.lfo_rate_hz = value,
            "lfo.depth" => self.lfo_depth = value,
            "seq.bpm" => self.bpm = value,
            "seq.swing" => self.swing = value,
            "seq.length" => self.seq_length = value.round() as usize,
            "seq.subdivision" => self.subdivision = value.round() as u32,
            _ => {}
        }
    }

    /// Serialize every parameter plus the randomizer seed as a flat JSON
    /// object.
    pub fn save_state(&self) -> String {
        let mut map = serde_json::Map::new();
        for def in PARAM_DEFS {
            if let Some(value) = self.get(def.name) {
                map.insert(def.name.to_string(), Value::from(f64::from(value)));
            }
        }
        map.insert("seed".to_string(), Value::from(self.seed));
        // A map of plain numbers cannot fail to serialize
        serde_json::to_string_pretty(&Value::Object(map)).unwrap_or_default()
    }

    /// Parse and apply a preset. All-or-nothing: the store only changes if
    /// the whole document validates. Provided keys are merged over engine
    /// defaults, so a key the preset omits returns to its default.
    pub fn load_state(&mut self, json: &str) -> Result<(), PresetError> {
        let value: Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or(PresetError::NotAnObject)?;

        let mut staged: Vec<(&str, f32)> = Vec::with_capacity(object.len());
        let mut seed = None;
        for (key, value) in object {
            if key == "seed" {
                let parsed = value
                    .as_u64()
                    .ok_or_else(|| PresetError::InvalidValue(key.clone()))?;
                seed = Some(parsed);
                continue;
            }
            if param_def(key).is_none() {
                warn!(key = key.as_str(), "ignoring unknown preset key");
                continue;
            }
            let number = value
                .as_f64()
                .ok_or_else(|| PresetError::InvalidValue(key.clone()))?;
            staged.push((key.as_str(), number as f32));
        }

        *self = ParamStore::default();
        for (key, value) in staged {
            self.set(key, value);
        }
        if let Some(seed) = seed {
            self.seed = seed;
        }
        Ok(())
    }
}
