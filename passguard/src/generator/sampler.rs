use std::ops::RangeInclusive;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("cannot sample from an empty range")]
    EmptyRange,

    #[error("secure random source failed: {0}")]
    Entropy(#[from] rand::Error),
}

/// Uniform selection backed by a cryptographic RNG.
///
/// Only `CryptoRng` sources are accepted. The default is the operating system
/// generator, which carries no state between draws, so two samplers never
/// share a stream.
#[derive(Debug, Clone, Default)]
pub struct SecureSampler<R = OsRng> {
    rng: R,
}

impl SecureSampler<OsRng> {
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl<R: RngCore + CryptoRng> SecureSampler<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    fn next_u64(&mut self) -> Result<u64, SamplerError> {
        let mut buf = [0u8; 8];
        self.rng.try_fill_bytes(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Returns an integer in `[0, n)`.
    ///
    /// Draws falling in the last partial block of `u64` are rejected so that
    /// every residue has the same number of preimages.
    pub fn uniform_index(&mut self, n: usize) -> Result<usize, SamplerError> {
        if n == 0 {
            return Err(SamplerError::EmptyRange);
        }
        let n = n as u64;
        let zone = (u64::MAX / n) * n;
        loop {
            let v = self.next_u64()?;
            if v < zone {
                return Ok((v % n) as usize);
            }
        }
    }

    /// In-place Fisher–Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) -> Result<(), SamplerError> {
        for i in (1..items.len()).rev() {
            let j = self.uniform_index(i + 1)?;
            items.swap(i, j);
        }
        Ok(())
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T, SamplerError> {
        let idx = self.uniform_index(items.len())?;
        Ok(&items[idx])
    }

    pub fn coin_flip(&mut self) -> Result<bool, SamplerError> {
        Ok(self.uniform_index(2)? == 1)
    }

    pub fn number_in(&mut self, range: RangeInclusive<u32>) -> Result<u32, SamplerError> {
        let (lo, hi) = (*range.start(), *range.end());
        if hi < lo {
            return Err(SamplerError::EmptyRange);
        }
        let span = (hi - lo) as usize + 1;
        Ok(lo + self.uniform_index(span)? as u32)
    }
}
