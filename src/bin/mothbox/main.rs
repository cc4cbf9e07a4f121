use std::path::PathBuf;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tracing::info;

use mothbox::engine::{Engine, EngineCore, Spectrum};
use mothbox::MAX_BLOCK_SIZE;

/*
Demo player: opens the default output device, wires an EngineCore into the
callback, seeds the randomizer and lets the sequencer run while printing a
level meter and the loudest spectral bin.
*/

struct Args {
    seed: u64,
    bpm: f32,
    swing: f32,
    seconds: u64,
    preset: Option<PathBuf>,
    save: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Args {
            seed: 1,
            bpm: 120.0,
            swing: 0.12,
            seconds: 30,
            preset: None,
            save: None,
        };

        let mut iter = std::env::args().skip(1);
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .ok_or_else(|| eyre!("flag {flag} needs a value"))
            };
            match flag.as_str() {
                "--seed" => args.seed = value()?.parse().wrap_err("bad --seed")?,
                "--bpm" => args.bpm = value()?.parse().wrap_err("bad --bpm")?,
                "--swing" => args.swing = value()?.parse().wrap_err("bad --swing")?,
                "--seconds" => args.seconds = value()?.parse().wrap_err("bad --seconds")?,
                "--preset" => args.preset = Some(PathBuf::from(value()?)),
                "--save" => args.save = Some(PathBuf::from(value()?)),
                other => return Err(eyre!("unknown flag {other}")),
            }
        }
        Ok(args)
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse()?;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no output device available"))?;
    let config = device.default_output_config()?;
    if config.sample_format() != SampleFormat::F32 {
        return Err(eyre!("only f32 output is supported"));
    }
    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;
    info!(sample_rate, channels, "output device ready");

    let (mut engine, core) = Engine::new(sample_rate);

    if let Some(path) = &args.preset {
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading preset {}", path.display()))?;
        engine.load_preset(&json)?;
        info!(path = %path.display(), "preset loaded");
    } else {
        engine.randomize(args.seed);
        info!(seed = args.seed, "patch randomized");
    }
    engine.set_param("seq.bpm", args.bpm);
    engine.set_param("seq.swing", args.swing);

    if let Some(path) = &args.save {
        std::fs::write(path, engine.save_preset())
            .wrap_err_with(|| format!("writing preset {}", path.display()))?;
        info!(path = %path.display(), "preset saved");
    }

    let stream = build_stream(&device, &config.into(), core, channels)?;
    stream.play()?;
    engine.play();

    let mut spectrum = Spectrum::new(1024);
    let mut bins = vec![0.0f32; spectrum.bins()];
    let mut viz = Vec::new();
    for _ in 0..args.seconds {
        std::thread::sleep(Duration::from_secs(1));
        viz.clear();
        engine.take_viz(&mut viz);
        if viz.is_empty() {
            continue;
        }

        let rms = (viz.iter().map(|x| x * x).sum::<f32>() / viz.len() as f32).sqrt();
        spectrum.magnitudes(&viz, &mut bins);
        let peak_bin = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let peak_hz = peak_bin as f32 * sample_rate / spectrum.size() as f32;

        let meter = "#".repeat(((rms * 120.0) as usize).min(40));
        println!("{meter:<40} rms {rms:.3}  peak {peak_hz:>6.0} Hz");
    }

    engine.stop();
    // Let release tails ring out before tearing the stream down
    std::thread::sleep(Duration::from_millis(500));
    Ok(())
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut core: EngineCore,
    channels: usize,
) -> Result<cpal::Stream> {
    let mut mono = vec![0.0f32; MAX_BLOCK_SIZE];
    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _| {
            let frames = data.len() / channels;
            let mut done = 0;
            while done < frames {
                let n = (frames - done).min(MAX_BLOCK_SIZE);
                let block = &mut mono[..n];
                core.process_block(block);
                for (i, &sample) in block.iter().enumerate() {
                    let frame = (done + i) * channels;
                    for ch in data[frame..frame + channels].iter_mut() {
                        *ch = sample;
                    }
                }
                done += n;
            }
        },
        |err| tracing::error!(%err, "output stream error"),
        None,
    )?;
    Ok(stream)
}
