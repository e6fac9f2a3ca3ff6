//! Shared stream generators for integration tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rulestream::DenseRecord;

/// Install a subscriber so `tracing` output from the learner is visible
/// under `--nocapture`. Idempotent across tests in one binary.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Seeded stream of `y = 3*x0 - 2*x1 + noise` with uniform attributes in
/// [0, 1]. `flip` negates the target, an abrupt concept change.
pub struct LinearStream {
    rng: StdRng,
    noise: f64,
    flipped: bool,
}

impl LinearStream {
    pub fn new(seed: u64, noise: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            noise,
            flipped: false,
        }
    }

    pub fn flip(&mut self) {
        self.flipped = true;
    }

    pub fn next_record(&mut self) -> DenseRecord {
        let x0: f64 = self.rng.gen();
        let x1: f64 = self.rng.gen();
        let e = (self.rng.gen::<f64>() - 0.5) * 2.0 * self.noise;
        let mut y = 3.0 * x0 - 2.0 * x1 + e;
        if self.flipped {
            y = -y;
        }
        DenseRecord::new(vec![x0, x1], y)
    }
}
