//! Disintegration looper: a tempo synced loop which slowly falls apart with every repetition.

use rand::rngs::SmallRng;

use super::{controls::ControlParameters, degradation::TapeDegradation};
use crate::utils::{
    dsp::capture::CaptureBuffer,
    smoothing::{LinearSmoothedValue, SmoothedValue},
};

// -------------------------------------------------------------------------------------------------

/// States of the [`DisintegrationLooper`].
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
pub enum DisintegrationState {
    /// Passes the standard reverb through.
    #[default]
    Idle,
    /// Capturing a tempo synced number of bars.
    Recording,
    /// Repeating the captured loop while entropy grows.
    Looping,
}

// -------------------------------------------------------------------------------------------------

/// Tempo synced looper with entropy driven tape degradation.
///
/// Rising edges of the loop trigger move the state machine:
/// - Idle: start recording `loop_bars` bars at the current tempo.
/// - Recording: cancel and go back to idle. Recording also gets cancelled after a few seconds
///   without input.
/// - Looping: fade out and go back to idle.
///
/// While looping, entropy is the number of completed repetitions divided by `entropy_repeats`,
/// so the rate of decay is independent of the loop length. When entropy saturates the loop fades back
/// into the live reverb.
#[derive(Debug, Clone)]
pub struct DisintegrationLooper {
    state: DisintegrationState,
    capture: CaptureBuffer<2>,
    loop_len: usize,
    seam_len: usize,
    position: f32,
    entropy: f32,
    repetitions: u32,
    entropy_repeats: u32,
    degradation: TapeDegradation,
    fade: LinearSmoothedValue,
    stopping: bool,
    trigger: bool,
    samples_since_edge: u32,
    debounce_samples: u32,
    silence_samples: u32,
    silence_timeout: u32,
    sample_rate: u32,
}

impl DisintegrationLooper {
    const SEAM_SECONDS: f32 = 0.01;
    const DEBOUNCE_SECONDS: f32 = 0.2;
    const SILENCE_TIMEOUT_SECONDS: f32 = 3.0;
    /// -60 dBFS
    const SILENCE_THRESHOLD: f32 = 0.001;

    const FADE_IN_MS: f32 = 20.0;
    const STOP_FADE_MS: f32 = 1500.0;
    const SATURATED_FADE_MS: f32 = 4000.0;

    pub fn new(sample_rate: u32, max_loop_seconds: f32) -> Self {
        let seam_len = ((Self::SEAM_SECONDS * sample_rate as f32) as usize).max(1);
        let capacity = (max_loop_seconds * sample_rate as f32).ceil() as usize + seam_len + 4;
        let debounce_samples = (Self::DEBOUNCE_SECONDS * sample_rate as f32) as u32;
        Self {
            state: DisintegrationState::Idle,
            capture: CaptureBuffer::new(capacity),
            loop_len: 0,
            seam_len,
            position: 0.0,
            entropy: 0.0,
            repetitions: 0,
            entropy_repeats: ControlParameters::ENTROPY_REPEATS.default_value().max(1) as u32,
            degradation: TapeDegradation::new(sample_rate),
            fade: LinearSmoothedValue::with_duration(0.0, Self::FADE_IN_MS, sample_rate),
            stopping: false,
            trigger: false,
            samples_since_edge: debounce_samples,
            debounce_samples,
            silence_samples: 0,
            silence_timeout: (Self::SILENCE_TIMEOUT_SECONDS * sample_rate as f32) as u32,
            sample_rate,
        }
    }

    pub fn state(&self) -> DisintegrationState {
        self.state
    }

    /// Entropy in range \[0, 1\].
    pub fn entropy(&self) -> f32 {
        self.entropy
    }

    /// Loop length in samples, excluding the seam tail.
    pub fn loop_len(&self) -> usize {
        self.loop_len
    }

    /// Recording progress while recording, playback position while looping, else 0.
    pub fn progress(&self) -> f32 {
        match self.state {
            DisintegrationState::Idle => 0.0,
            DisintegrationState::Recording => {
                self.capture.len() as f32 / (self.loop_len + self.seam_len) as f32
            }
            DisintegrationState::Looping => self.position / self.loop_len as f32,
        }
    }

    /// Back to idle with all buffers and states zeroed. The trigger level is forgotten too, so
    /// a held trigger counts as a new edge afterwards.
    pub fn reset(&mut self) {
        self.enter_idle();
        self.capture.flush();
        self.degradation.reset();
        self.trigger = false;
        self.samples_since_edge = self.debounce_samples;
    }

    /// Apply block controls: edge detection on the trigger, entropy rate and degradation
    /// coefficients. Called at block rate with clamped controls.
    pub fn update(&mut self, params: &ControlParameters) {
        let edge = params.loop_trigger && !self.trigger;
        self.trigger = params.loop_trigger;
        if edge && self.samples_since_edge >= self.debounce_samples {
            self.samples_since_edge = 0;
            match self.state {
                DisintegrationState::Idle => self.start_recording(params),
                DisintegrationState::Recording => self.enter_idle(),
                DisintegrationState::Looping => self.stop(Self::STOP_FADE_MS),
            }
        }
        self.entropy_repeats = params.entropy_repeats.max(1) as u32;
        self.degradation.update(self.entropy, params.puck_x);
    }

    /// Process a single frame of the wet signal. `input_peak` is the dry input's peak level,
    /// used to detect silence while recording.
    #[inline]
    pub fn process(&mut self, wet: [f32; 2], input_peak: f32, rng: &mut SmallRng) -> [f32; 2] {
        self.samples_since_edge = self.samples_since_edge.saturating_add(1);
        match self.state {
            DisintegrationState::Idle => wet,
            DisintegrationState::Recording => {
                self.capture.record(wet);
                if input_peak > Self::SILENCE_THRESHOLD {
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += 1;
                }
                if self.capture.len() >= self.loop_len + self.seam_len {
                    self.start_looping();
                } else if self.silence_samples >= self.silence_timeout {
                    self.enter_idle();
                }
                wet
            }
            DisintegrationState::Looping => {
                let gain = self.fade.next();
                if self.stopping && gain <= 0.0 {
                    self.enter_idle();
                    return wet;
                }
                let looped = self.read_loop();
                let degraded = self.degradation.process(looped, rng);
                self.advance();
                [
                    wet[0] * (1.0 - gain) + degraded[0] * gain,
                    wet[1] * (1.0 - gain) + degraded[1] * gain,
                ]
            }
        }
    }

    fn start_recording(&mut self, params: &ControlParameters) {
        let max_len = self.capture.capacity() - self.seam_len;
        let len = (params.loop_seconds() * self.sample_rate as f32).round() as usize;
        self.loop_len = len.clamp(self.seam_len * 2, max_len);
        self.capture.clear();
        self.silence_samples = 0;
        self.entropy = 0.0;
        self.repetitions = 0;
        self.state = DisintegrationState::Recording;
    }

    fn start_looping(&mut self) {
        self.state = DisintegrationState::Looping;
        self.position = 0.0;
        self.entropy = 0.0;
        self.repetitions = 0;
        self.stopping = false;
        self.degradation.reset();
        self.fade.set_duration_ms(Self::FADE_IN_MS);
        self.fade.init(0.0);
        self.fade.set_target(1.0);
    }

    fn stop(&mut self, fade_ms: f32) {
        if !self.stopping {
            self.stopping = true;
            self.fade.set_duration_ms(fade_ms);
            self.fade.set_target(0.0);
        }
    }

    fn enter_idle(&mut self) {
        self.state = DisintegrationState::Idle;
        self.capture.clear();
        self.loop_len = 0;
        self.position = 0.0;
        self.entropy = 0.0;
        self.repetitions = 0;
        self.stopping = false;
        self.fade.init(0.0);
    }

    /// Read the loop at the current position. The first `seam_len` samples crossfade with the
    /// recorded tail beyond the loop end, so the wraparound is continuous.
    #[inline]
    fn read_loop(&self) -> [f32; 2] {
        let total = self.loop_len + self.seam_len;
        let position = self.position;
        let seam = self.seam_len as f32;
        let mut frame = [0.0; 2];
        for (channel, sample) in frame.iter_mut().enumerate() {
            let head = self.capture.read_cubic(channel, position, total);
            *sample = if position < seam {
                let tail = self
                    .capture
                    .read_cubic(channel, position + self.loop_len as f32, total);
                let t = position / seam;
                head * t + tail * (1.0 - t)
            } else {
                head
            };
        }
        frame
    }

    #[inline]
    fn advance(&mut self) {
        let speed = 1.0 + self.degradation.speed_offset();
        self.position += speed;
        let len = self.loop_len as f32;
        if self.position >= len {
            self.position -= len;
            self.repetitions = self.repetitions.saturating_add(1);
            self.entropy = (self.repetitions as f32 / self.entropy_repeats as f32).min(1.0);
            if self.repetitions >= self.entropy_repeats {
                self.stop(Self::SATURATED_FADE_MS);
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params(trigger: bool) -> ControlParameters {
        ControlParameters {
            loop_trigger: trigger,
            tempo: 240.0,
            loop_bars: 1,
            entropy_repeats: 4,
            ..Default::default()
        }
    }

    fn run(
        looper: &mut DisintegrationLooper,
        params: &ControlParameters,
        samples: usize,
        rng: &mut SmallRng,
    ) {
        looper.update(params);
        for i in 0..samples {
            let value = (i as f32 * 0.05).sin() * 0.5;
            looper.process([value, value], 0.5, rng);
        }
    }

    #[test]
    fn state_transitions() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut looper = DisintegrationLooper::new(8000, 12.0);
        assert_eq!(looper.state(), DisintegrationState::Idle);

        run(&mut looper, &params(true), 100, &mut rng);
        assert_eq!(looper.state(), DisintegrationState::Recording);
        // 1 bar at 240 bpm
        assert_eq!(looper.loop_len(), 8000);

        // held trigger is not an edge
        run(&mut looper, &params(true), 100, &mut rng);
        assert_eq!(looper.state(), DisintegrationState::Recording);

        run(&mut looper, &params(false), 8000, &mut rng);
        assert_eq!(looper.state(), DisintegrationState::Looping);

        // stop with a new edge: fades out, then idle
        run(&mut looper, &params(true), 100, &mut rng);
        assert_eq!(looper.state(), DisintegrationState::Looping);
        run(&mut looper, &params(false), 8000 * 2, &mut rng);
        assert_eq!(looper.state(), DisintegrationState::Idle);
    }

    #[test]
    fn edges_are_debounced() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut looper = DisintegrationLooper::new(8000, 12.0);
        run(&mut looper, &params(true), 10, &mut rng);
        run(&mut looper, &params(false), 10, &mut rng);
        // second edge 20 samples later: ignored
        run(&mut looper, &params(true), 10, &mut rng);
        assert_eq!(looper.state(), DisintegrationState::Recording);
    }

    #[test]
    fn recording_times_out_on_silence() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut looper = DisintegrationLooper::new(8000, 12.0);
        let params = ControlParameters {
            loop_trigger: true,
            tempo: 20.0,
            loop_bars: 1,
            ..Default::default()
        };
        looper.update(&params);
        for _ in 0..8000 * 4 {
            looper.process([0.0, 0.0], 0.0, &mut rng);
        }
        assert_eq!(looper.state(), DisintegrationState::Idle);
    }

    #[test]
    fn entropy_saturates_after_exact_repeats() {
        let mut rng = SmallRng::seed_from_u64(5);
        for repeats in [3, 100, 1000] {
            let mut looper = DisintegrationLooper::new(8000, 12.0);
            let controls = ControlParameters {
                entropy_repeats: repeats,
                ..params(true)
            };
            looper.update(&controls);
            while looper.state() != DisintegrationState::Looping {
                looper.process([0.25, 0.25], 0.5, &mut rng);
            }
            let loop_len = looper.loop_len() as f32;
            let repeats = repeats as u32;
            for repetition in 1..=repeats {
                looper.position = loop_len - 0.5;
                looper.advance();
                assert_eq!(looper.repetitions, repetition);
                if repetition < repeats {
                    assert!(looper.entropy() < 1.0, "{repetition} of {repeats}");
                    assert!(!looper.stopping);
                }
            }
            assert_eq!(looper.entropy(), 1.0);
            assert!(looper.stopping);
        }
    }

    #[test]
    fn seam_is_continuous() {
        let mut rng = SmallRng::seed_from_u64(4);
        let mut looper = DisintegrationLooper::new(8000, 12.0);
        let params = ControlParameters {
            entropy_repeats: 1000,
            ..params(true)
        };
        looper.update(&params);
        // a sine which does not fit the loop length: hard jump at the loop boundary
        let mut phase = 0.0f32;
        while looper.state() != DisintegrationState::Looping {
            phase += 0.013;
            let value = phase.sin() * 0.5;
            looper.process([value, value], 0.5, &mut rng);
        }
        let loop_len = looper.loop_len();
        let mut last: Option<f32> = None;
        let mut max_step = 0.0f32;
        for i in 0..loop_len * 3 {
            let frame = looper.read_loop();
            if let Some(last) = last {
                max_step = max_step.max((frame[0] - last).abs());
            }
            last = Some(frame[0]);
            looper.position += 1.0;
            if looper.position >= loop_len as f32 {
                looper.position -= loop_len as f32;
            }
            assert!(frame[0].is_finite(), "sample {i}");
        }
        // the sine moves by at most 0.5 * 0.013 per sample
        assert!(max_step < 0.05, "max step: {max_step}");
    }
}
