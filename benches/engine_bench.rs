use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use mothbox::engine::Engine;
use mothbox::fx::EffectsBus;
use mothbox::voice::{Lane, VoicePool};

const SAMPLE_RATE: f32 = 48_000.0;
const BLOCK: usize = 512;

fn bench_voice_pool(c: &mut Criterion) {
    let mut pool = VoicePool::new(SAMPLE_RATE, 8);
    for note in [48, 52, 55, 60, 64, 67, 72, 76] {
        pool.note_on(note, 0.8, Lane::Poly);
    }
    let mut out = vec![0.0f32; BLOCK];

    c.bench_function("voice_pool_8_voices_512", |b| {
        b.iter(|| {
            out.fill(0.0);
            pool.render_block(black_box(&mut out), 1.0);
        })
    });
}

fn bench_effects_bus(c: &mut Criterion) {
    let mut bus = EffectsBus::new(SAMPLE_RATE);
    let signal: Vec<f32> = (0..BLOCK).map(|i| 0.4 * (i as f32 * 0.07).sin()).collect();
    let mut out = vec![0.0f32; BLOCK];

    c.bench_function("effects_bus_512", |b| {
        b.iter(|| {
            out.copy_from_slice(&signal);
            bus.process_block(black_box(&mut out));
        })
    });
}

fn bench_full_engine(c: &mut Criterion) {
    let (mut engine, mut core) = Engine::with_poly_voices(SAMPLE_RATE, 8);
    engine.randomize(7);
    for note in [48, 55, 60, 64] {
        engine.note_on(note, 0.8, Lane::Poly);
    }
    let mut out = vec![0.0f32; BLOCK];
    core.process_block(&mut out); // absorb the note events

    c.bench_function("engine_block_512", |b| {
        b.iter(|| core.process_block(black_box(&mut out)))
    });
}

criterion_group!(benches, bench_voice_pool, bench_effects_bus, bench_full_engine);
criterion_main!(benches);
