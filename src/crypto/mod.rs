//! Cryptographic collaborators behind the facade.
//!
//! Provides the salt/hash string codec, the bcrypt engine and the random source.

pub mod codec;
pub mod engine;
pub mod random;

pub use codec::{HashParts, Minor, SaltParts, Version};
pub use engine::{BcryptEngine, Engine};
pub use random::{OsRandom, RandomSource};

/// Length of the random seed material in a salt (16 bytes).
pub const SEED_LEN: usize = 16;
/// Length of the encoded salt segment (22 characters).
pub const SALT_CHARS: usize = 22;
/// Length of the encoded digest segment (31 characters).
pub const DIGEST_CHARS: usize = 31;
/// Smallest cost factor the engine accepts.
pub const MIN_COST: u32 = 4;
/// Largest cost factor the engine accepts.
pub const MAX_COST: u32 = 31;
/// Cost factor used when the caller supplies none.
pub const DEFAULT_COST: u32 = 10;
