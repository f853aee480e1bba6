use rand::{CryptoRng, RngCore};
use serde::Deserialize;

use super::charset::TRAILING_SPECIAL;
use super::error::{GeneratorError, ValidationError};
use super::sampler::SecureSampler;

pub const MAX_KEYWORDS: usize = 10;
pub const MAX_KEYWORD_CHARS: usize = 50;

/// Suffix numbers are 3 or 4 digits.
pub const SUFFIX_RANGE: std::ops::RangeInclusive<u32> = 100..=9999;

const LEET: [(char, char); 5] = [('a', '@'), ('e', '3'), ('i', '!'), ('o', '0'), ('s', '$')];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemorableOptions {
    pub keywords: Vec<String>,
    pub separator: char,
    pub add_numbers: bool,
    pub add_special: bool,
    pub capitalize: bool,
}

impl Default for MemorableOptions {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            separator: '-',
            add_numbers: true,
            add_special: false,
            capitalize: true,
        }
    }
}

impl MemorableOptions {
    /// Validates bounds and returns the sanitized keywords.
    pub fn sanitized_keywords(&self) -> Result<Vec<String>, ValidationError> {
        if self.keywords.is_empty() {
            return Err(ValidationError::NoKeywords);
        }
        if self.keywords.len() > MAX_KEYWORDS {
            return Err(ValidationError::TooManyKeywords {
                max: MAX_KEYWORDS,
                got: self.keywords.len(),
            });
        }
        if self.separator.is_control() {
            return Err(ValidationError::Separator);
        }

        self.keywords
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let word = sanitize(raw);
                if word.is_empty() {
                    return Err(ValidationError::EmptyKeyword { index });
                }
                if word.chars().count() > MAX_KEYWORD_CHARS {
                    return Err(ValidationError::KeywordTooLong {
                        index,
                        max: MAX_KEYWORD_CHARS,
                    });
                }
                Ok(word)
            })
            .collect()
    }
}

/// Strips control characters and surrounding whitespace.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn generate_memorable_password(opts: &MemorableOptions) -> Result<String, GeneratorError> {
    let words = opts.sanitized_keywords()?;
    let mut sampler = SecureSampler::new();
    compose(&mut sampler, opts, &words)
}

fn compose<R: RngCore + CryptoRng>(
    sampler: &mut SecureSampler<R>,
    opts: &MemorableOptions,
    words: &[String],
) -> Result<String, GeneratorError> {
    let mut parts = Vec::with_capacity(words.len());
    for w in words {
        let mut word = w.to_lowercase();
        if opts.capitalize {
            word = capitalize_first(&word);
        }
        if sampler.coin_flip()? {
            word = leetify(sampler, &word)?;
        }
        parts.push(word);
    }

    let sep = opts.separator.to_string();
    let mut out = parts.join(&sep);

    if opts.add_numbers {
        out.push(opts.separator);
        out.push_str(&sampler.number_in(SUFFIX_RANGE)?.to_string());
    }
    if opts.add_special {
        let pool: Vec<char> = TRAILING_SPECIAL.chars().collect();
        out.push(*sampler.pick(&pool)?);
    }
    Ok(out)
}

pub(crate) fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Each rule is flipped on its own; an enabled rule rewrites every
/// occurrence of its letter.
fn leetify<R: RngCore + CryptoRng>(
    sampler: &mut SecureSampler<R>,
    word: &str,
) -> Result<String, GeneratorError> {
    let mut out = word.to_string();
    for (from, to) in LEET {
        if sampler.coin_flip()? {
            out = out.replace(from, &to.to_string());
        }
    }
    Ok(out)
}
