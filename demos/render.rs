//! Renders an impulse and a short noise burst through the reverb engine into a stereo wav file.
//!
//! Example: `cargo run --example render -- -o tail.wav --decay 12 --ghost 0.5 --freeze 3`

use std::path::PathBuf;

use arg::{parse_args, Args};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use duskverb::{telemetry_channel, ControlParameters, ReverbEngine};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const SAMPLE_RATE: u32 = 48000;
const BLOCK_SIZE: usize = 256;

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

// -------------------------------------------------------------------------------------------------

/// Program arguments.
#[derive(Args, Debug, Default)]
struct Arguments {
    #[arg(short = "o", long = "output")]
    /// Path of the wav file to write. By default \"duskverb.wav\".
    output_path: Option<PathBuf>,
    #[arg(short = "d", long = "duration")]
    /// Length of the rendered file in seconds. By default 12.
    duration: Option<f32>,
    #[arg(long = "decay")]
    /// Reverb decay time in seconds.
    decay: Option<f32>,
    #[arg(long = "size")]
    /// Room size factor in range 0.5..=2.0.
    size: Option<f32>,
    #[arg(long = "ghost")]
    /// Ghost engine amount in range 0..=1.
    ghost: Option<f32>,
    #[arg(long = "freeze")]
    /// Engage freeze after the given number of seconds.
    freeze: Option<f32>,
    #[arg(long = "disintegrate")]
    /// Trigger the disintegration looper after the given number of seconds.
    disintegrate: Option<f32>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    log_level: Option<log::Level>,
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args::<Arguments>();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()
        .expect("Failed to set logger");

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("duskverb.wav"));
    let total_frames = (args.duration.unwrap_or(12.0).max(0.1) * SAMPLE_RATE as f32) as usize;
    let seconds_to_frames =
        |seconds: Option<f32>| seconds.map(|s| (s * SAMPLE_RATE as f32) as usize);
    let freeze_frame = seconds_to_frames(args.freeze);
    let disintegrate_frame = seconds_to_frames(args.disintegrate);

    let mut engine = ReverbEngine::new(0x5eed);
    engine.prepare(SAMPLE_RATE, BLOCK_SIZE, 2)?;

    let (producer, consumer) = telemetry_channel(8);
    engine.set_telemetry_producer(Some(producer));

    let mut params = ControlParameters {
        decay: args.decay.unwrap_or(8.0),
        size: args.size.unwrap_or(1.2),
        ghost: args.ghost.unwrap_or(0.25),
        mix: 1.0,
        tempo: 120.0,
        loop_bars: 1,
        entropy_repeats: 6,
        ..Default::default()
    };

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&output_path, spec)?;

    let mut rng = SmallRng::seed_from_u64(1);
    let burst = SAMPLE_RATE as usize..SAMPLE_RATE as usize * 6 / 5;
    let mut left = vec![0.0; BLOCK_SIZE];
    let mut right = vec![0.0; BLOCK_SIZE];
    let mut frame = 0;
    while frame < total_frames {
        let frames = BLOCK_SIZE.min(total_frames - frame);
        for i in 0..frames {
            let position = frame + i;
            let value = if position == 0 {
                1.0
            } else if burst.contains(&position) {
                rng.random_range(-0.3..0.3)
            } else {
                0.0
            };
            left[i] = value;
            right[i] = value;
        }

        let block = frame..frame + frames;
        params.freeze = freeze_frame.is_some_and(|start| start < frame + frames);
        params.loop_trigger = disintegrate_frame.is_some_and(|start| block.contains(&start));
        engine.process(&mut left[..frames], &mut right[..frames], &params);

        for i in 0..frames {
            writer.write_sample(left[i])?;
            writer.write_sample(right[i])?;
        }
        frame += frames;

        if frame % (SAMPLE_RATE as usize) < BLOCK_SIZE {
            if let Some(telemetry) = consumer.latest() {
                log::info!(
                    "{:.0}s: wet {:.1} dB, looper {}, entropy {:.2}, freeze {:.2}",
                    frame as f32 / SAMPLE_RATE as f32,
                    telemetry.wet_level_db,
                    telemetry.state,
                    telemetry.entropy,
                    telemetry.freeze_amount
                );
            }
        }
    }
    writer.finalize()?;

    println!("Rendered {:?}", output_path);
    Ok(())
}
