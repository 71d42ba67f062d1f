//! Shared seedable randomness.
//!
//! Every random choice in the pipeline (item shuffle, proxy pick, WHOIS
//! mirror pick, user-agent pick) goes through one injected source so a test
//! or a reproduction run can pin the seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct SharedRng {
    inner: Arc<Mutex<StdRng>>,
}

impl SharedRng {
    /// Seeded source for reproducible runs, entropy-seeded otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            inner: Arc::new(Mutex::new(rng)),
        }
    }

    /// Uniform index into a collection of `len` items. None for empty.
    pub fn choose_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }

        let mut rng = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Some(rng.gen_range(0..len))
    }

    /// Uniformly chosen reference into a slice.
    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        let idx = self.choose_index(items.len())?;
        items.get(idx)
    }

    /// In-place Fisher-Yates shuffle.
    pub fn shuffle<T>(&self, items: &mut [T]) {
        let mut rng = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        items.shuffle(&mut *rng);
    }
}
