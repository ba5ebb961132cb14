//! The real-time reverb engine: wires early reflections, the feedback delay network, the ghost,
//! freeze and disintegration engines and the dynamics section into a single stereo processor.

use rand::{rngs::SmallRng, SeedableRng};

use crate::{
    utils::{
        dsp::{
            lfo,
            saturation::{sanitize, soft_clip},
        },
        linear_to_db,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

mod controls;
mod degradation;
mod disintegration;
mod dynamics;
mod early;
mod fdn;
mod freeze;
mod ghost;
mod matrix;
mod modulation;
mod telemetry;

pub use controls::{ControlParameters, EngineConfig};
pub use disintegration::DisintegrationState;
pub use matrix::LINES;
pub use telemetry::{telemetry_channel, Telemetry, TelemetryConsumer, TelemetryProducer};

use disintegration::DisintegrationLooper;
use dynamics::Dynamics;
use early::EarlyReflections;
use fdn::FeedbackDelayNetwork;
use freeze::FreezeLoop;
use ghost::GhostEngine;
use modulation::{ModulationBank, SmoothedControls};

// -------------------------------------------------------------------------------------------------

/// Number of grains in the ghost engine's voice pool.
const GHOST_POOL_SIZE: usize = 16;

type Ghost = GhostEngine<GHOST_POOL_SIZE>;

/// Level of the early reflections which is fed into the network and the ghost history.
const EARLY_SEND: f32 = 0.5;

// -------------------------------------------------------------------------------------------------

/// All sample rate dependent state. Only exists while the engine is prepared.
#[derive(Debug, Clone)]
struct EngineState {
    sample_rate: u32,
    controls: SmoothedControls,
    modulation: ModulationBank,
    modulation_offsets: [f32; LINES],
    early: EarlyReflections,
    fdn: FeedbackDelayNetwork,
    ghost: Ghost,
    freeze: FreezeLoop,
    looper: DisintegrationLooper,
    dynamics: Dynamics,
    snap_pending: bool,
}

impl EngineState {
    fn new(sample_rate: u32, config: &EngineConfig, rng: &mut SmallRng) -> Self {
        let max_modulation = ModulationBank::max_depth_samples(sample_rate);
        Self {
            sample_rate,
            controls: SmoothedControls::new(sample_rate),
            modulation: ModulationBank::new(sample_rate, rng),
            modulation_offsets: [0.0; LINES],
            early: EarlyReflections::new(sample_rate),
            fdn: FeedbackDelayNetwork::new(sample_rate, max_modulation),
            ghost: Ghost::new(sample_rate),
            freeze: FreezeLoop::new(sample_rate, config.freeze_capture_seconds, rng),
            looper: DisintegrationLooper::new(sample_rate, config.max_loop_seconds),
            dynamics: Dynamics::new(sample_rate),
            snap_pending: true,
        }
    }

    fn reset(&mut self, rng: &mut SmallRng) {
        // same rng consumption order as in `new`
        self.modulation.randomize(rng);
        self.freeze.reset();
        self.freeze.randomize(rng);
        self.modulation_offsets = [0.0; LINES];
        self.early.reset();
        self.fdn.reset();
        self.fdn.invalidate_coefficients();
        self.ghost.reset();
        self.looper.reset();
        self.dynamics.reset();
        self.controls.snap();
        self.modulation.snap();
        self.snap_pending = true;
    }
}

// -------------------------------------------------------------------------------------------------

/// Stereo reverb engine.
///
/// The engine must be [prepared](Self::prepare) before it processes anything. All memory gets
/// allocated in `prepare`: [`process`](Self::process) never allocates, never blocks and never
/// fails. Unprepared engines, empty blocks or mismatching channel lengths pass audio through
/// unchanged.
///
/// All randomness comes from a single seeded generator per engine instance, so two engines
/// with the same seed, fed with the same calls, produce bit identical output. [`reset`](Self::reset)
/// restarts the generator from the seed.
///
/// # Example
///
/// ```rust
/// use duskverb::{ControlParameters, ReverbEngine};
///
/// let mut engine = ReverbEngine::new(0x5eed);
/// engine.prepare(48000, 256, 2).unwrap();
///
/// let mut left = vec![0.0; 256];
/// let mut right = vec![0.0; 256];
/// left[0] = 1.0;
/// let params = ControlParameters {
///     decay: 8.0,
///     mix: 0.5,
///     ..Default::default()
/// };
/// engine.process(&mut left, &mut right, &params);
/// assert!(left.iter().chain(right.iter()).all(|s| s.abs() <= 1.0));
/// ```
#[derive(Debug)]
pub struct ReverbEngine {
    seed: u64,
    rng: SmallRng,
    config: EngineConfig,
    state: Option<EngineState>,
    telemetry_producer: Option<TelemetryProducer>,
    telemetry: Telemetry,
}

impl ReverbEngine {
    /// Highest supported sample rate.
    pub const MAX_SAMPLE_RATE: u32 = 768000;

    /// Create a new, unprepared engine with the default configuration.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, EngineConfig::default())
    }

    /// Create a new, unprepared engine with the given configuration.
    pub fn with_config(seed: u64, config: EngineConfig) -> Self {
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
            config: config.clamped(),
            state: None,
            telemetry_producer: None,
            telemetry: Telemetry::default(),
        }
    }

    /// The engine's fixed configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True when [`prepare`](Self::prepare) succeeded.
    pub fn is_prepared(&self) -> bool {
        self.state.is_some()
    }

    /// Sample rate of the prepared engine.
    pub fn sample_rate(&self) -> Option<u32> {
        self.state.as_ref().map(|state| state.sample_rate)
    }

    /// Current state of the disintegration looper.
    pub fn disintegration_state(&self) -> DisintegrationState {
        self.state
            .as_ref()
            .map_or(DisintegrationState::Idle, |state| state.looper.state())
    }

    /// Current disintegration entropy in range \[0, 1\].
    pub fn entropy(&self) -> f32 {
        self.state
            .as_ref()
            .map_or(0.0, |state| state.looper.entropy())
    }

    /// Per line feedback gains of the delay network, as applied in the last processed block.
    pub fn feedback_gains(&self) -> Option<&[f32; LINES]> {
        self.state.as_ref().map(|state| state.fdn.feedback_gains())
    }

    /// Snapshot which got built after the last processed block.
    pub fn telemetry(&self) -> Telemetry {
        self.telemetry
    }

    /// Attach or detach the sending side of a [`telemetry_channel`]. When attached, the engine
    /// publishes one [`Telemetry`] snapshot per processed block.
    pub fn set_telemetry_producer(&mut self, producer: Option<TelemetryProducer>) {
        self.telemetry_producer = producer;
    }

    /// Expected length of the audible tail with the given controls in seconds, or `None` when
    /// the tail is self sustaining (freeze or a running disintegration loop).
    pub fn tail_seconds(&self, params: &ControlParameters) -> Option<f32> {
        let params = params.clamped();
        if params.freeze || self.disintegration_state() != DisintegrationState::Idle {
            return None;
        }
        Some(
            params.pre_delay_ms * 0.001
                + FeedbackDelayNetwork::longest_delay_seconds(params.size)
                + params.decay,
        )
    }

    /// Allocate and size all internal buffers for the given stream layout.
    ///
    /// Must be called before processing and after any sample rate change. On errors the
    /// engine stays inert: it will pass audio through until it got prepared successfully.
    pub fn prepare(
        &mut self,
        sample_rate: u32,
        block_size: usize,
        channel_count: usize,
    ) -> Result<(), Error> {
        let result = if sample_rate == 0 || sample_rate > Self::MAX_SAMPLE_RATE {
            Err(Error::InvalidSampleRate(sample_rate))
        } else if block_size == 0 {
            Err(Error::InvalidBlockSize(block_size))
        } else if channel_count != 2 {
            Err(Error::UnsupportedChannelLayout(channel_count))
        } else {
            Ok(())
        };
        if let Err(err) = result {
            log::warn!("Failed to prepare reverb engine: {err}");
            self.state = None;
            return Err(err);
        }

        // force lazy tables, so nothing gets allocated in the audio thread
        lfo::init_tables();
        Ghost::init_tables();

        self.rng = SmallRng::seed_from_u64(self.seed);
        let state = EngineState::new(sample_rate, &self.config, &mut self.rng);
        log::info!(
            "Prepared reverb engine: {sample_rate} Hz, {block_size} frames per block, \
            {} frames per delay line, {:.1}s loop capture",
            FeedbackDelayNetwork::line_capacity(
                sample_rate,
                ModulationBank::max_depth_samples(sample_rate)
            ),
            self.config.max_loop_seconds
        );
        self.state = Some(state);
        self.telemetry = Telemetry::default();
        Ok(())
    }

    /// Zero all buffers and restart the random generator without reallocating. Smoothers are
    /// re-armed at the targets of the next processed block.
    pub fn reset(&mut self) {
        if let Some(state) = self.state.as_mut() {
            log::debug!("Resetting reverb engine");
            self.rng = SmallRng::seed_from_u64(self.seed);
            state.reset(&mut self.rng);
            self.telemetry = Telemetry::default();
        }
    }

    /// Process the given stereo block in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32], params: &ControlParameters) {
        if left.is_empty() || left.len() != right.len() {
            return;
        }
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let rng = &mut self.rng;
        let config = &self.config;
        let producer = &self.telemetry_producer;
        let telemetry = Self::assert_no_alloc(|| {
            Self::process_block(state, rng, config, left, right, params);
            let telemetry = Self::build_telemetry(state);
            if let Some(producer) = producer {
                producer.push(telemetry);
            }
            telemetry
        });
        self.telemetry = telemetry;
    }

    fn process_block(
        state: &mut EngineState,
        rng: &mut SmallRng,
        config: &EngineConfig,
        left: &mut [f32],
        right: &mut [f32],
        params: &ControlParameters,
    ) {
        // block rate updates
        let params = params.clamped();
        state.controls.set_targets(&params);
        state.modulation.set_drift(params.drift, params.freeze);
        state.early.set_pre_delay(params.pre_delay_ms);
        if state.snap_pending {
            state.controls.snap();
            state.modulation.snap();
            state.early.snap();
            state.snap_pending = false;
        }
        state.fdn.update_coefficients(
            params.decay,
            params.tone,
            state.controls.target_size(),
            params.freeze,
        );
        state.ghost.set_window(params.puck_y);
        state.ghost.set_frozen(params.freeze, rng);
        state.freeze.set_engaged(params.freeze, rng);
        state.looper.update(&params);

        // sample rate processing
        for (left, right) in left.iter_mut().zip(right.iter_mut()) {
            let dry = [sanitize(*left), sanitize(*right)];
            let input_peak = state.dynamics.process_input(dry[0], dry[1]);
            let frame = state.controls.next();
            let gate = frame.freeze_gate;

            let early = state.early.process(dry);
            let early_level = 0.2 + 0.8 * frame.proximity;
            let send = 1.0 - 0.55 * frame.proximity;
            let source = [
                dry[0] + early[0] * EARLY_SEND,
                dry[1] + early[1] * EARLY_SEND,
            ];

            let ghost_input = (source[0] + source[1]) * 0.5 * gate;
            let ghost = state.ghost.process(ghost_input, frame.ghost, rng);

            state.modulation.next(&mut state.modulation_offsets);
            let injection = [
                (source[0] * send + ghost[0]) * gate,
                (source[1] * send + ghost[1]) * gate,
            ];
            let tail = state
                .fdn
                .process(injection, frame.size, &state.modulation_offsets);

            let mut wet = [0.0; 2];
            for channel in 0..2 {
                wet[channel] = tail[channel]
                    + early[channel] * early_level * gate
                    + ghost[channel] * (1.0 - gate);
            }
            let wet = state.freeze.process(wet);
            let wet = state.looper.process(wet, input_peak, rng);

            let duck = state.dynamics.duck_gain(frame.duck, config.min_wet_factor);
            let wet = [wet[0] * duck, wet[1] * duck];
            state.dynamics.process_wet(wet[0], wet[1]);

            let dry_gain = 1.0 - frame.mix;
            *left = sanitize(soft_clip(dry[0] * dry_gain + wet[0] * frame.mix));
            *right = sanitize(soft_clip(dry[1] * dry_gain + wet[1] * frame.mix));
        }
    }

    fn build_telemetry(state: &EngineState) -> Telemetry {
        let input_level = state.dynamics.input_level();
        let wet_level = state.dynamics.wet_level();
        Telemetry {
            input_level,
            wet_level,
            input_level_db: linear_to_db(input_level),
            wet_level_db: linear_to_db(wet_level),
            state: state.looper.state(),
            loop_progress: state.looper.progress(),
            entropy: state.looper.entropy(),
            freeze_amount: state.freeze.blend(),
        }
    }

    fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::assert_no_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const SAMPLE_RATE: u32 = 24000;
    const BLOCK_SIZE: usize = 256;

    fn prepared_engine(seed: u64) -> ReverbEngine {
        let mut engine = ReverbEngine::new(seed);
        engine
            .prepare(SAMPLE_RATE, BLOCK_SIZE, 2)
            .expect("Failed to prepare engine");
        engine
    }

    /// Run `blocks` blocks, filling the input with `input(sample_index)`, and return the
    /// concatenated output.
    fn render(
        engine: &mut ReverbEngine,
        params: &ControlParameters,
        blocks: usize,
        mut input: impl FnMut(usize) -> f32,
    ) -> Vec<[f32; 2]> {
        let mut output = Vec::with_capacity(blocks * BLOCK_SIZE);
        let mut left = vec![0.0; BLOCK_SIZE];
        let mut right = vec![0.0; BLOCK_SIZE];
        for block in 0..blocks {
            for i in 0..BLOCK_SIZE {
                let value = input(block * BLOCK_SIZE + i);
                left[i] = value;
                right[i] = -value;
            }
            engine.process(&mut left, &mut right, params);
            output.extend(left.iter().zip(right.iter()).map(|(l, r)| [*l, *r]));
        }
        output
    }

    fn blocks_for(samples: usize) -> usize {
        samples.div_ceil(BLOCK_SIZE)
    }

    fn rms(frames: &[[f32; 2]]) -> f32 {
        let sum: f32 = frames.iter().map(|[l, r]| l * l + r * r).sum();
        (sum / (frames.len() * 2) as f32).sqrt()
    }

    #[test]
    fn unprepared_engine_passes_through() {
        let mut engine = ReverbEngine::new(1);
        let mut left = vec![0.25; 64];
        let mut right = vec![-0.25; 64];
        engine.process(&mut left, &mut right, &ControlParameters::default());
        assert!(left.iter().all(|s| *s == 0.25));
        assert!(right.iter().all(|s| *s == -0.25));
    }

    #[test]
    fn invalid_prepare_leaves_engine_inert() {
        let mut engine = prepared_engine(1);
        assert_eq!(
            engine.prepare(0, BLOCK_SIZE, 2),
            Err(Error::InvalidSampleRate(0))
        );
        assert!(!engine.is_prepared());
        assert_eq!(
            engine.prepare(SAMPLE_RATE, 0, 2),
            Err(Error::InvalidBlockSize(0))
        );
        assert_eq!(
            engine.prepare(SAMPLE_RATE, BLOCK_SIZE, 1),
            Err(Error::UnsupportedChannelLayout(1))
        );
        let mut left = vec![0.5; 16];
        let mut right = vec![0.5; 16];
        engine.process(&mut left, &mut right, &ControlParameters::default());
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.5));

        assert!(engine.prepare(SAMPLE_RATE, BLOCK_SIZE, 2).is_ok());
        assert_eq!(engine.sample_rate(), Some(SAMPLE_RATE));
    }

    #[test]
    fn mismatching_blocks_pass_through() {
        let mut engine = prepared_engine(1);
        let mut left = vec![0.5; 16];
        let mut right = vec![0.5; 8];
        engine.process(&mut left, &mut right, &ControlParameters::default());
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.5));
    }

    #[test]
    fn output_is_bounded() {
        let mut rng = SmallRng::seed_from_u64(0xb0b);
        let mut engine = prepared_engine(2);
        for _ in 0..40 {
            let params = ControlParameters {
                size: rng.random_range(0.0..3.0),
                decay: rng.random_range(0.0..100.0),
                tone: rng.random_range(-2.0..2.0),
                mix: rng.random_range(0.0..1.0),
                drift: rng.random_range(0.0..1.0),
                puck_x: rng.random_range(-1.0..1.0),
                puck_y: rng.random_range(-1.0..1.0),
                ghost: rng.random_range(0.0..1.0),
                duck: rng.random_range(0.0..1.0),
                freeze: rng.random_bool(0.3),
                loop_trigger: rng.random_bool(0.5),
                pre_delay_ms: rng.random_range(0.0..200.0),
                tempo: rng.random_range(0.0..400.0),
                loop_bars: rng.random_range(0..20),
                entropy_repeats: rng.random_range(0..2000),
            };
            let mut noise = SmallRng::seed_from_u64(rng.random());
            let output = render(&mut engine, &params, 8, |i| {
                if i % 997 == 0 {
                    f32::NAN
                } else {
                    noise.random_range(-4.0..4.0)
                }
            });
            for [l, r] in output {
                assert!(l.is_finite() && r.is_finite());
                assert!(l.abs() <= 1.0 && r.abs() <= 1.0);
            }
        }
    }

    #[test]
    fn silence_decays_to_zero() {
        let mut engine = prepared_engine(3);
        let params = ControlParameters {
            decay: 0.4,
            mix: 1.0,
            ghost: 0.5,
            ..Default::default()
        };
        let mut noise = SmallRng::seed_from_u64(3);
        render(&mut engine, &params, 20, |_| noise.random_range(-0.5..0.5));
        // ghost history is the longest buffer: ~4.8 s
        let seconds = 12;
        let blocks = seconds * SAMPLE_RATE as usize / BLOCK_SIZE;
        let output = render(&mut engine, &params, blocks, |_| 0.0);
        let tail = &output[output.len() - BLOCK_SIZE..];
        assert!(tail.iter().all(|[l, r]| l.abs() < 1e-9 && r.abs() < 1e-9));
    }

    #[test]
    fn freeze_sustains() {
        let mut engine = prepared_engine(4);
        let mut params = ControlParameters {
            decay: 4.0,
            mix: 1.0,
            ..Default::default()
        };
        let mut noise = SmallRng::seed_from_u64(4);
        render(&mut engine, &params, 8, |_| noise.random_range(-0.5..0.5));
        params.freeze = true;
        let second = SAMPLE_RATE as usize;
        let output = render(&mut engine, &params, blocks_for(10 * second), |_| 0.0);
        let early = rms(&output[second..2 * second]);
        let late = rms(&output[9 * second..10 * second]);
        assert!(early > 1e-3, "early rms: {early}");
        assert!(late > early * 0.5, "early: {early}, late: {late}");
        assert!(output.iter().all(|[l, r]| l.abs() <= 1.0 && r.abs() <= 1.0));

        let gains = engine.feedback_gains().expect("Engine is prepared");
        assert!(gains.iter().all(|g| *g == fdn::FREEZE_GAIN_CEILING));
        assert!(engine.tail_seconds(&params).is_none());
    }

    #[test]
    fn frozen_impulse_keeps_ringing() {
        let mut engine = prepared_engine(7);
        let mut params = ControlParameters {
            decay: 4.0,
            mix: 1.0,
            ..Default::default()
        };
        let second = SAMPLE_RATE as usize;
        render(&mut engine, &params, blocks_for(second / 4), |i| {
            if i == 0 {
                1.0
            } else {
                0.0
            }
        });
        params.freeze = true;
        let output = render(&mut engine, &params, blocks_for(20 * second), |_| 0.0);
        let early = rms(&output[second..2 * second]);
        let middle = rms(&output[9 * second..10 * second]);
        let late = rms(&output[19 * second..20 * second]);
        assert!(early > 1e-4, "early rms: {early}");
        assert!(middle > early * 0.5, "early: {early}, middle: {middle}");
        assert!(late > middle * 0.8, "middle: {middle}, late: {late}");
        assert!(output.iter().all(|[l, r]| l.abs() <= 1.0 && r.abs() <= 1.0));
    }

    #[test]
    fn ghost_off_contributes_nothing() {
        let params = ControlParameters {
            ghost: 0.0,
            ..Default::default()
        };
        let mut engine = prepared_engine(5);
        let mut noise = SmallRng::seed_from_u64(5);
        render(&mut engine, &params, 200, |_| noise.random_range(-0.5..0.5));
        let state = engine.state.as_ref().expect("Engine is prepared");
        assert_eq!(state.ghost.active_grains(), 0);
    }

    #[test]
    fn entropy_advances_per_repetition() {
        let mut engine = prepared_engine(6);
        let mut params = ControlParameters {
            tempo: 300.0,
            loop_bars: 1,
            entropy_repeats: 4,
            loop_trigger: true,
            ..Default::default()
        };
        let mut noise = SmallRng::seed_from_u64(6);
        let mut left = vec![0.0; BLOCK_SIZE];
        let mut right = vec![0.0; BLOCK_SIZE];
        let mut last_entropy = 0.0;
        let mut max_entropy = 0.0f32;
        let mut was_looping = false;
        for _ in 0..(20 * SAMPLE_RATE as usize / BLOCK_SIZE) {
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                *l = noise.random_range(-0.5..0.5);
                *r = noise.random_range(-0.5..0.5);
            }
            engine.process(&mut left, &mut right, &params);
            params.loop_trigger = false;

            let entropy = engine.entropy();
            match engine.disintegration_state() {
                DisintegrationState::Idle | DisintegrationState::Recording => {
                    assert_eq!(entropy, 0.0);
                }
                DisintegrationState::Looping => {
                    was_looping = true;
                    assert!(entropy >= last_entropy);
                    assert!(entropy <= 1.0);
                    // one increment per completed repetition
                    assert_eq!((entropy * 4.0).fract(), 0.0);
                }
            }
            max_entropy = max_entropy.max(entropy);
            last_entropy = entropy;
        }
        assert!(was_looping);
        assert_eq!(max_entropy, 1.0);
        // faded out after saturating
        assert_eq!(engine.disintegration_state(), DisintegrationState::Idle);
    }

    #[test]
    fn reset_reproduces_output() {
        let params = ControlParameters {
            ghost: 0.8,
            drift: 0.7,
            decay: 6.0,
            mix: 0.6,
            ..Default::default()
        };
        let input = |i: usize| ((i as f32 * 0.013).sin() * 0.4) * if i < 4000 { 1.0 } else { 0.0 };

        let mut engine = prepared_engine(7);
        let first = render(&mut engine, &params, 100, input);
        engine.reset();
        let second = render(&mut engine, &params, 100, input);
        assert!(first
            .iter()
            .zip(second.iter())
            .all(|(a, b)| a[0].to_bits() == b[0].to_bits() && a[1].to_bits() == b[1].to_bits()));

        let mut other = prepared_engine(7);
        let third = render(&mut other, &params, 100, input);
        assert_eq!(first, third);
    }

    #[test]
    fn telemetry_is_published() {
        let mut engine = prepared_engine(8);
        let (producer, consumer) = telemetry_channel(4);
        engine.set_telemetry_producer(Some(producer));
        let mut noise = SmallRng::seed_from_u64(8);
        render(
            &mut engine,
            &ControlParameters::default(),
            10,
            |_| noise.random_range(-0.5..0.5),
        );
        assert_eq!(consumer.pending(), 4);
        let latest = consumer.latest().expect("Missing telemetry");
        assert_eq!(latest, engine.telemetry());
        assert!(latest.input_level > 0.1);
        assert!(latest.wet_level > 0.0);
        assert_eq!(latest.state, DisintegrationState::Idle);
        assert_eq!(consumer.pending(), 0);
    }
}
