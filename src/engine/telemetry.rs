//! UI facing engine state snapshots and their lock free transport.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use super::disintegration::DisintegrationState;

// -------------------------------------------------------------------------------------------------

/// Plain data snapshot of the engine state, published once per processed block.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Telemetry {
    /// Smoothed input level (linear amplitude).
    pub input_level: f32,
    /// Smoothed wet level (linear amplitude).
    pub wet_level: f32,
    /// Smoothed input level in decibels.
    pub input_level_db: f32,
    /// Smoothed wet level in decibels.
    pub wet_level_db: f32,
    /// Current state of the disintegration looper.
    pub state: DisintegrationState,
    /// Recording or playback progress of the disintegration loop in range \[0, 1\].
    pub loop_progress: f32,
    /// Disintegration entropy in range \[0, 1\].
    pub entropy: f32,
    /// Current freeze loop blend amount in range \[0, 1\].
    pub freeze_amount: f32,
}

// -------------------------------------------------------------------------------------------------

/// Sending side of a telemetry channel. Lives in the audio thread.
///
/// Pushing never blocks: when the queue is full, the oldest snapshot gets dropped.
#[derive(Debug)]
pub struct TelemetryProducer {
    queue: Arc<ArrayQueue<Telemetry>>,
}

impl TelemetryProducer {
    /// Publish a new snapshot, replacing the oldest one when the queue is full.
    #[inline]
    pub fn push(&self, telemetry: Telemetry) {
        let _ = self.queue.force_push(telemetry);
    }
}

/// Receiving side of a telemetry channel. Lives in the UI thread.
#[derive(Debug)]
pub struct TelemetryConsumer {
    queue: Arc<ArrayQueue<Telemetry>>,
}

impl TelemetryConsumer {
    /// Drain all pending snapshots and return the newest one, if any arrived since the last call.
    pub fn latest(&self) -> Option<Telemetry> {
        let mut latest = None;
        while let Some(telemetry) = self.queue.pop() {
            latest = Some(telemetry);
        }
        latest
    }

    /// Number of snapshots which are waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Create a bounded single producer, single consumer telemetry channel.
///
/// Memory for `capacity` snapshots is allocated here, so neither side allocates afterwards.
pub fn telemetry_channel(capacity: usize) -> (TelemetryProducer, TelemetryConsumer) {
    let capacity = capacity.max(1);
    log::debug!("Creating telemetry channel with a capacity of {capacity} snapshots");
    let queue = Arc::new(ArrayQueue::new(capacity));
    (
        TelemetryProducer {
            queue: Arc::clone(&queue),
        },
        TelemetryConsumer { queue },
    )
}

// -------------------------------------------------------------------------------------------------
