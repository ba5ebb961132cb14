//! Freeze: captures the wet tail and replays it with staggered, drifting multi-head playback.

use rand::{rngs::SmallRng, Rng};

use crate::utils::{
    dsp::{capture::CaptureBuffer, filters::onepole::OnePoleLowpass, lfo::Lfo},
    smoothing::{ExponentialSmoothedValue, SmoothedValue},
};

// -------------------------------------------------------------------------------------------------

/// Number of loop read heads.
pub const HEADS: usize = 4;

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
struct FreezeHead {
    /// Fractional read position in the capture buffer.
    position: f32,
    /// +1 forward, -1 reverse.
    direction: f32,
    /// Slow pitch drift.
    lfo: Lfo,
    /// Relative speed deviation at LFO peaks.
    depth: f32,
}

// -------------------------------------------------------------------------------------------------

/// Multi-head freeze loop.
///
/// While engaged, the wet signal is recorded into the capture buffer. Once enough material is
/// there, [`HEADS`] read heads start playing it back, spread evenly across the captured region,
/// alternating in direction and drifting independently in speed, so the result sounds like a
/// steady pad rather than a repeating loop. The loop is blended over the live signal by a
/// smoothed amount which follows the capture progress, and fades out again when released.
#[derive(Debug, Clone)]
pub struct FreezeLoop {
    capture: CaptureBuffer<2>,
    heads: [FreezeHead; HEADS],
    blend: ExponentialSmoothedValue,
    warmers: [OnePoleLowpass; 2],
    engaged: bool,
    recording: bool,
    playing: bool,
    min_capture: usize,
    seam_samples: f32,
    sample_rate: u32,
}

impl FreezeLoop {
    const MIN_CAPTURE_SECONDS: f32 = 0.5;
    const SEAM_FADE_SECONDS: f32 = 0.01;
    const BLEND_SMOOTHING_MS: f32 = 150.0;
    const WARMING_CUTOFF_HZ: f32 = 6000.0;
    /// 1/√N power normalization for the summed heads.
    const HEAD_WEIGHT: f32 = 0.5;

    const DEPTH_RANGE: (f32, f32) = (0.002, 0.005);
    const RATE_RANGE: (f32, f32) = (0.05, 0.2);

    pub fn new(sample_rate: u32, capture_seconds: f32, rng: &mut SmallRng) -> Self {
        let capacity = (capture_seconds * sample_rate as f32).ceil() as usize;
        let min_capture =
            ((Self::MIN_CAPTURE_SECONDS * sample_rate as f32) as usize).min(capacity);
        let mut freeze = Self {
            capture: CaptureBuffer::new(capacity),
            heads: std::array::from_fn(|_| FreezeHead::default()),
            blend: ExponentialSmoothedValue::with_time(
                0.0,
                Self::BLEND_SMOOTHING_MS,
                sample_rate,
            ),
            warmers: std::array::from_fn(|_| {
                OnePoleLowpass::new(sample_rate, Self::WARMING_CUTOFF_HZ)
            }),
            engaged: false,
            recording: false,
            playing: false,
            min_capture,
            seam_samples: Self::SEAM_FADE_SECONDS * sample_rate as f32,
            sample_rate,
        };
        freeze.randomize(rng);
        freeze
    }

    /// Current blend amount of the loop over the live signal.
    pub fn blend(&self) -> f32 {
        self.blend.current()
    }

    /// Captured fraction of the capture buffer.
    pub fn progress(&self) -> f32 {
        self.capture.len() as f32 / self.capture.capacity() as f32
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Pick new random drift depths, rates and phases for all heads.
    pub fn randomize(&mut self, rng: &mut SmallRng) {
        let (min_depth, max_depth) = Self::DEPTH_RANGE;
        let (min_rate, max_rate) = Self::RATE_RANGE;
        for (index, head) in self.heads.iter_mut().enumerate() {
            head.depth = rng.random_range(min_depth..max_depth);
            head.lfo
                .set_rate(self.sample_rate, rng.random_range(min_rate..max_rate));
            head.lfo.set_phase(rng.random::<f32>());
            head.direction = if index % 2 == 0 { 1.0 } else { -1.0 };
        }
    }

    /// Engage or release the freeze. Called at block rate with the freeze control.
    pub fn set_engaged(&mut self, engaged: bool, rng: &mut SmallRng) {
        if engaged == self.engaged {
            return;
        }
        self.engaged = engaged;
        if engaged {
            if self.playing && self.blend.current() > 0.0 {
                // previous loop still audible: keep playing it
                self.recording = false;
            } else {
                self.capture.clear();
                self.recording = true;
                self.playing = false;
                self.randomize(rng);
            }
        } else {
            self.recording = false;
        }
    }

    /// Zero the capture and all states.
    pub fn reset(&mut self) {
        self.capture.flush();
        self.blend.init(0.0);
        for warmer in &mut self.warmers {
            warmer.reset();
        }
        self.engaged = false;
        self.recording = false;
        self.playing = false;
    }

    /// Record the wet frame if capturing and return it blended with the loop.
    #[inline]
    pub fn process(&mut self, wet: [f32; 2]) -> [f32; 2] {
        if self.recording && !self.capture.record(wet) {
            self.recording = false;
        }
        if self.engaged && !self.playing && self.capture.len() >= self.min_capture {
            self.start_heads();
        }

        let target = if self.engaged && self.playing {
            if self.recording {
                self.progress()
            } else {
                1.0
            }
        } else {
            0.0
        };
        self.blend.set_target(target);
        let blend = self.blend.next();

        if !self.playing {
            return wet;
        }
        if blend == 0.0 && !self.engaged {
            self.playing = false;
            self.capture.clear();
            return wet;
        }

        let looped = self.render_heads();
        [
            wet[0] * (1.0 - blend) + looped[0] * blend,
            wet[1] * (1.0 - blend) + looped[1] * blend,
        ]
    }

    fn start_heads(&mut self) {
        let len = self.capture.len() as f32;
        for (index, head) in self.heads.iter_mut().enumerate() {
            head.position = index as f32 * len / HEADS as f32;
        }
        self.playing = true;
    }

    #[inline]
    fn render_heads(&mut self) -> [f32; 2] {
        let len = self.capture.len();
        let len_f = len as f32;
        let mut output = [0.0f32; 2];
        for head in &mut self.heads {
            let distance_to_seam = head.position.min(len_f - head.position);
            let seam_gain = (distance_to_seam / self.seam_samples).min(1.0);
            for (channel, sample) in output.iter_mut().enumerate() {
                *sample += self.capture.read_cubic(channel, head.position, len) * seam_gain;
            }
            let speed = 1.0 + head.depth * head.lfo.next();
            head.position =
                CaptureBuffer::<2>::wrap_position(head.position + head.direction * speed, len);
        }
        [
            self.warmers[0].process(output[0] * Self::HEAD_WEIGHT),
            self.warmers[1].process(output[1] * Self::HEAD_WEIGHT),
        ]
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn noise(rng: &mut SmallRng) -> [f32; 2] {
        [rng.random_range(-0.5..0.5), rng.random_range(-0.5..0.5)]
    }

    #[test]
    fn passes_through_when_idle() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut freeze = FreezeLoop::new(48000, 4.0, &mut rng);
        for _ in 0..1000 {
            let frame = noise(&mut rng);
            assert_eq!(freeze.process(frame), frame);
        }
        assert_eq!(freeze.blend(), 0.0);
    }

    #[test]
    fn loop_sustains_after_input_stops() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut freeze = FreezeLoop::new(48000, 1.0, &mut rng);
        freeze.set_engaged(true, &mut rng);
        // capture one second of noise, then feed silence
        for _ in 0..48000 {
            let frame = noise(&mut rng);
            freeze.process(frame);
        }
        assert!(freeze.is_playing());
        let mut energy = 0.0;
        for _ in 0..48000 * 2 {
            let [l, r] = freeze.process([0.0, 0.0]);
            energy += l * l + r * r;
        }
        let rms = (energy / (48000.0 * 4.0)).sqrt();
        assert!(rms > 0.05, "rms: {rms}");
    }

    #[test]
    fn release_fades_out_and_discards() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut freeze = FreezeLoop::new(48000, 1.0, &mut rng);
        freeze.set_engaged(true, &mut rng);
        for _ in 0..48000 {
            let frame = noise(&mut rng);
            freeze.process(frame);
        }
        freeze.set_engaged(false, &mut rng);
        let mut last = f32::MAX;
        for _ in 0..48000 * 4 {
            freeze.process([0.0, 0.0]);
            assert!(freeze.blend() <= last);
            last = freeze.blend();
        }
        assert_eq!(freeze.blend(), 0.0);
        assert!(!freeze.is_playing());
        assert_eq!(freeze.progress(), 0.0);
    }
}
