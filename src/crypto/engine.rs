use bcrypt::BcryptError;
use tracing::trace;

use super::codec::{HashParts, Minor, SaltParts};
use super::{MAX_COST, MIN_COST, SEED_LEN};
use crate::error::{Error, Result};

/// The password-hashing primitive the facade fronts.
///
/// Implementations are stateless per call and shared read-only across
/// threads.
pub trait Engine: Send + Sync {
    /// Encode `seed` into a salt string for the given revision and cost.
    fn gen_salt(&self, minor: Minor, cost: u32, seed: &[u8; SEED_LEN]) -> Result<String>;

    /// Hash `data` with a salt string (a full hash is accepted too; only
    /// its salt prefix is used).
    fn encrypt(&self, data: &str, salt: &str) -> Result<String>;

    /// Check `data` against `hash` in constant time with respect to `data`.
    fn compare(&self, data: &str, hash: &str) -> Result<bool>;

    /// Cost factor embedded in a salt or hash string.
    fn get_rounds(&self, hash: &str) -> Result<u32>;
}

/// [`Engine`] backed by the `bcrypt` crate's EksBlowfish implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct BcryptEngine;

fn check_cost(cost: u32) -> Result<()> {
    if !(MIN_COST..=MAX_COST).contains(&cost) {
        return Err(Error::Engine(BcryptError::CostNotAllowed(cost)));
    }
    Ok(())
}

impl Engine for BcryptEngine {
    fn gen_salt(&self, minor: Minor, cost: u32, seed: &[u8; SEED_LEN]) -> Result<String> {
        check_cost(cost)?;
        Ok(SaltParts::new(minor, cost, *seed).encode())
    }

    fn encrypt(&self, data: &str, salt: &str) -> Result<String> {
        let salt = SaltParts::parse(salt)?;
        check_cost(salt.cost())?;

        trace!(cost = salt.cost(), version = salt.version().tag(), "running key schedule");
        let parts = bcrypt::hash_with_salt(data.as_bytes(), salt.cost(), *salt.seed())?;
        Ok(parts.format_for_version(salt.version().into()))
    }

    fn compare(&self, data: &str, hash: &str) -> Result<bool> {
        let parts = HashParts::parse(hash)?;
        if parts.digest().is_none() {
            return Err(Error::malformed("hash carries no digest"));
        }
        check_cost(parts.cost())?;

        trace!(cost = parts.cost(), "verifying digest");
        Ok(bcrypt::verify(data.as_bytes(), hash)?)
    }

    fn get_rounds(&self, hash: &str) -> Result<u32> {
        HashParts::parse(hash).map(|parts| parts.cost())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const KNOWN_HASH: &str = "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW";

    #[test]
    fn known_vector_matches() {
        assert!(BcryptEngine.compare("U*U", KNOWN_HASH).unwrap());
        assert!(!BcryptEngine.compare("U*U*", KNOWN_HASH).unwrap());
    }

    #[test]
    fn encrypt_reproduces_known_vector() {
        let salt = &KNOWN_HASH[..29];
        assert_eq!(BcryptEngine.encrypt("U*U", salt).unwrap(), KNOWN_HASH);
    }

    #[test]
    fn encrypt_accepts_full_hash_as_salt() {
        assert_eq!(BcryptEngine.encrypt("U*U", KNOWN_HASH).unwrap(), KNOWN_HASH);
    }

    #[test]
    fn gen_salt_rejects_cost_out_of_range() {
        for cost in [0, 3, 32] {
            let err = BcryptEngine.gen_salt(Minor::B, cost, &[0u8; SEED_LEN]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::EngineFailure, "cost {cost}");
        }
    }

    #[test]
    fn compare_needs_a_digest() {
        let err = BcryptEngine.compare("U*U", &KNOWN_HASH[..29]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHash);
    }

    #[test]
    fn get_rounds_reads_salts_and_hashes() {
        assert_eq!(BcryptEngine.get_rounds(KNOWN_HASH).unwrap(), 5);
        assert_eq!(BcryptEngine.get_rounds(&KNOWN_HASH[..29]).unwrap(), 5);
    }
}
