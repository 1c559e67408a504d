//! Simulated uplink channel noise

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::trace;
use rand::Rng;

/// Source of the per-packet noise level used by the transcoder.
pub trait NoiseSource: Send + Sync {
    /// One draw in `[0, 1)`, taken once per IP packet.
    fn draw(&self) -> f64;
}

/// A packet is corrupted when its noise level rises above the BER baseline.
pub fn is_transcoding_error(noise_level: f64, ber_baseline: f64) -> bool {
    noise_level > ber_baseline
}

/// Random channel: the noise level is the product of two uniform samples.
#[derive(Debug, Default)]
pub struct SimulatedChannel {
    draws: AtomicU64,
}

impl SimulatedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draws(&self) -> u64 {
        self.draws.load(Ordering::Relaxed)
    }
}

impl NoiseSource for SimulatedChannel {
    fn draw(&self) -> f64 {
        let mut rng = rand::rng();
        let noise = rng.random::<f64>() * rng.random::<f64>();
        let n = self.draws.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("noise draw #{} = {:.4}", n, noise);
        noise
    }
}

/// Always returns the same level.
#[derive(Debug, Clone, Copy)]
pub struct FixedNoise(pub f64);

impl NoiseSource for FixedNoise {
    fn draw(&self) -> f64 {
        self.0
    }
}

/// Replays a fixed series of levels, then settles on `fallback`.
#[derive(Debug)]
pub struct ScriptedNoise {
    levels: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl ScriptedNoise {
    pub fn new(levels: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            levels: Mutex::new(levels.into_iter().collect()),
            fallback,
        }
    }
}

impl NoiseSource for ScriptedNoise {
    fn draw(&self) -> f64 {
        match self.levels.lock() {
            Ok(mut levels) => levels.pop_front().unwrap_or(self.fallback),
            Err(_) => self.fallback,
        }
    }
}
