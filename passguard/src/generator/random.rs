use rand::{CryptoRng, RngCore};
use serde::Deserialize;

use super::charset::{self, CharClass};
use super::error::{GeneratorError, ValidationError};
use super::sampler::SecureSampler;

pub const MIN_LENGTH: usize = 4;
pub const MAX_LENGTH: usize = 128;
pub const MIN_QUANTITY: usize = 1;
pub const MAX_QUANTITY: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RandomOptions {
    pub length: usize,
    pub include_uppercase: bool,
    pub include_lowercase: bool,
    pub include_numbers: bool,
    pub include_special: bool,
    pub exclude_ambiguous: bool,
    pub quantity: usize,
}

impl Default for RandomOptions {
    fn default() -> Self {
        Self {
            length: 16,
            include_uppercase: true,
            include_lowercase: true,
            include_numbers: true,
            include_special: true,
            exclude_ambiguous: false,
            quantity: 1,
        }
    }
}

impl RandomOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&self.length) {
            return Err(ValidationError::Length {
                min: MIN_LENGTH,
                max: MAX_LENGTH,
                got: self.length,
            });
        }
        if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&self.quantity) {
            return Err(ValidationError::Quantity {
                min: MIN_QUANTITY,
                max: MAX_QUANTITY,
                got: self.quantity,
            });
        }
        Ok(())
    }

    /// Enabled classes, in a fixed order.
    pub fn classes(&self) -> Vec<CharClass> {
        [
            (self.include_lowercase, CharClass::Lowercase),
            (self.include_uppercase, CharClass::Uppercase),
            (self.include_numbers, CharClass::Digits),
            (self.include_special, CharClass::Special),
        ]
        .into_iter()
        .filter_map(|(on, c)| on.then_some(c))
        .collect()
    }
}

/// Generates `opts.quantity` independent passwords.
pub fn generate_random_passwords(opts: &RandomOptions) -> Result<Vec<String>, GeneratorError> {
    opts.validate()?;
    let mut sampler = SecureSampler::new();
    (0..opts.quantity)
        .map(|_| compose(&mut sampler, opts))
        .collect()
}

pub(crate) fn compose<R: RngCore + CryptoRng>(
    sampler: &mut SecureSampler<R>,
    opts: &RandomOptions,
) -> Result<String, GeneratorError> {
    let classes = opts.classes();
    let active = charset::active(&classes, opts.exclude_ambiguous);

    let mut out: Vec<char> = Vec::with_capacity(opts.length);

    // one guaranteed member per enabled class
    for class in &classes {
        let members = class.members(opts.exclude_ambiguous);
        if !members.is_empty() {
            out.push(*sampler.pick(&members)?);
        }
    }

    while out.len() < opts.length {
        out.push(*sampler.pick(&active)?);
    }

    // guaranteed members must not sit at predictable positions
    sampler.shuffle(&mut out)?;

    Ok(out.into_iter().collect())
}
