//! Password generation on top of a cryptographically secure sampler.
//!
//! Every entry point validates its options before drawing any randomness and
//! keeps no state between calls.

pub mod charset;
pub mod error;
pub mod memorable;
pub mod passphrase;
pub mod random;
pub mod sampler;
mod words;

pub use error::{GeneratorError, ValidationError};
pub use memorable::{generate_memorable_password, MemorableOptions};
pub use passphrase::{generate_passphrase, PassphraseOptions};
pub use random::{generate_random_passwords, RandomOptions};
pub use sampler::{SamplerError, SecureSampler};
