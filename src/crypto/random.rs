use super::SEED_LEN;
use crate::error::{Error, Result};

/// Source of cryptographically secure random bytes.
pub trait RandomSource: Send + Sync {
    /// Fill `buf` completely or fail without partial use.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        getrandom::fill(buf).map_err(|e| Error::Randomness(Box::new(e)))
    }
}

/// Draw fresh seed material for one salt
pub(crate) fn draw_seed(source: &dyn RandomSource) -> Result<[u8; SEED_LEN]> {
    let mut seed = [0u8; SEED_LEN];
    source.fill(&mut seed)?;
    Ok(seed)
}
