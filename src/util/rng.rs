// Copyright (c) 2024 Mike Tsao

//! Random numbers for noise sources.

use byteorder::{BigEndian, ByteOrder};
use delegate::delegate;

/// A fast, seedable PRNG. Good enough for white noise; not for anything that
/// needs to be secure.
#[derive(Debug)]
pub struct Rng(oorandom::Rand64);
impl Default for Rng {
    fn default() -> Self {
        let seed = Self::generate_seed().unwrap_or_else(|e| {
            log::warn!("couldn't get a random seed from the OS ({e}); using a fixed one");
            Self::FALLBACK_SEED
        });
        Self::new_with_seed(seed)
    }
}
#[allow(missing_docs)]
impl Rng {
    const FALLBACK_SEED: u128 = 0x5eed_0f_a11_7ba5e;

    /// The same seed always produces the same stream.
    pub fn new_with_seed(seed: u128) -> Self {
        Self(oorandom::Rand64::new(seed))
    }

    /// Asks the OS for a seed.
    pub fn generate_seed() -> anyhow::Result<u128> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes)?;
        Ok(BigEndian::read_u128(&bytes))
    }

    /// A sample in [-1.0, 1.0).
    pub fn rand_bipolar(&mut self) -> f64 {
        self.0.rand_float() * 2.0 - 1.0
    }

    delegate! {
        to self.0 {
            pub fn rand_u64(&mut self) -> u64;
            pub fn rand_float(&mut self) -> f64;
            pub fn rand_range(&mut self, range: core::ops::Range<u64>) -> u64;
        }
    }
}
