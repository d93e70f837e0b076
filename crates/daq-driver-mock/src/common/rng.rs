//! Seeded RNG shared by the mock's signal synthesis and error injection.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::sync::{Mutex, PoisonError};

/// Thread-safe ChaCha8 generator. A fixed seed reproduces every spectrum and
/// every injected failure.
pub struct MockRng {
    inner: Mutex<ChaCha8Rng>,
}

impl MockRng {
    /// Seeded generator, or OS entropy when `seed` is `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            inner: Mutex::new(rng),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// `true` with probability `rate` (clamped to [0, 1]).
    pub fn should_fail(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        self.with(|rng| rng.r#gen::<f64>() < rate)
    }

    /// Uniform value in [0, 1).
    pub fn next_f64(&self) -> f64 {
        self.with(|rng| rng.r#gen())
    }

    /// Uniform value in `range`.
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.with(|rng| rng.gen_range(range))
    }

    /// Normally distributed value. A non-positive width returns `mean`.
    pub fn gaussian(&self, mean: f64, std_dev: f64) -> f64 {
        if std_dev <= 0.0 {
            return mean;
        }
        match Normal::new(mean, std_dev) {
            Ok(normal) => self.with(|rng| normal.sample(rng)),
            Err(_) => mean,
        }
    }
}

impl Default for MockRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for MockRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRng").finish_non_exhaustive()
    }
}
