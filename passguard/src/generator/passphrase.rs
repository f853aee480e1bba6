use rand::{CryptoRng, RngCore};
use serde::Deserialize;

use super::error::{GeneratorError, ValidationError};
use super::memorable::{capitalize_first, SUFFIX_RANGE};
use super::sampler::SecureSampler;
use super::words::WORDS;

pub const MIN_WORDS: usize = 3;
pub const MAX_WORDS: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PassphraseOptions {
    pub word_count: usize,
    pub separator: char,
    pub add_numbers: bool,
    pub capitalize: bool,
}

impl Default for PassphraseOptions {
    fn default() -> Self {
        Self {
            word_count: 4,
            separator: '-',
            add_numbers: true,
            capitalize: true,
        }
    }
}

impl PassphraseOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_WORDS..=MAX_WORDS).contains(&self.word_count) {
            return Err(ValidationError::WordCount {
                min: MIN_WORDS,
                max: MAX_WORDS,
                got: self.word_count,
            });
        }
        if self.separator.is_control() {
            return Err(ValidationError::Separator);
        }
        Ok(())
    }
}

pub fn generate_passphrase(opts: &PassphraseOptions) -> Result<String, GeneratorError> {
    opts.validate()?;
    let mut sampler = SecureSampler::new();
    compose(&mut sampler, opts)
}

fn compose<R: RngCore + CryptoRng>(
    sampler: &mut SecureSampler<R>,
    opts: &PassphraseOptions,
) -> Result<String, GeneratorError> {
    let mut words = Vec::with_capacity(opts.word_count);
    for _ in 0..opts.word_count {
        let w = *sampler.pick(WORDS)?;
        words.push(if opts.capitalize {
            capitalize_first(w)
        } else {
            w.to_string()
        });
    }

    let mut out = words.join(&opts.separator.to_string());
    if opts.add_numbers {
        out.push(opts.separator);
        out.push_str(&sampler.number_in(SUFFIX_RANGE)?.to_string());
    }
    Ok(out)
}
