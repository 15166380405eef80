//! Salt and hash string format.
//!
//! ```text
//! $ VERSION (2) $ COST (2 digits) $ SALT (22) [ DIGEST (31) ]
//! ```
//!
//! Salt and digest use the bcrypt base-64 alphabet (`./A-Za-z0-9`), unpadded.

use std::fmt;
use std::str::FromStr;

use base64::{
    Engine as _,
    alphabet::BCRYPT,
    engine::{GeneralPurpose, general_purpose::NO_PAD},
};
use serde::{Deserialize, Serialize};

use super::{DIGEST_CHARS, SALT_CHARS, SEED_LEN};
use crate::error::{Error, Result};

pub(crate) const BCRYPT_BASE64: GeneralPurpose = GeneralPurpose::new(&BCRYPT, NO_PAD);

/// Minor revision selectable when generating a salt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Minor {
    A,
    #[default]
    B,
}

impl Minor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Minor::A => "a",
            Minor::B => "b",
        }
    }
}

impl fmt::Display for Minor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Minor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "a" => Ok(Minor::A),
            "b" => Ok(Minor::B),
            _ => Err(Error::invalid(crate::validate::MINOR_INVALID)),
        }
    }
}

/// Version tag found on a parsed salt or hash.
///
/// `2y` is produced by PHP and computes exactly like `2b`, so it is
/// accepted when parsing. `2x` marks the sign-extension bug of old
/// crypt_blowfish releases and is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    TwoA,
    TwoB,
    TwoY,
}

impl Version {
    pub fn tag(&self) -> &'static str {
        match self {
            Version::TwoA => "2a",
            Version::TwoB => "2b",
            Version::TwoY => "2y",
        }
    }

    fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "2a" => Ok(Version::TwoA),
            "2b" => Ok(Version::TwoB),
            "2y" => Ok(Version::TwoY),
            other => Err(Error::malformed(format!("unsupported version tag {other:?}"))),
        }
    }
}

impl From<Minor> for Version {
    fn from(minor: Minor) -> Self {
        match minor {
            Minor::A => Version::TwoA,
            Minor::B => Version::TwoB,
        }
    }
}

impl From<Version> for bcrypt::Version {
    fn from(version: Version) -> Self {
        match version {
            Version::TwoA => bcrypt::Version::TwoA,
            Version::TwoB => bcrypt::Version::TwoB,
            Version::TwoY => bcrypt::Version::TwoY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltParts {
    version: Version,
    cost: u32,
    seed: [u8; SEED_LEN],
}

impl SaltParts {
    pub fn new(minor: Minor, cost: u32, seed: [u8; SEED_LEN]) -> Self {
        Self {
            version: minor.into(),
            cost,
            seed,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn seed(&self) -> &[u8; SEED_LEN] {
        &self.seed
    }

    pub fn encode(&self) -> String {
        format!(
            "${}${:02}${}",
            self.version.tag(),
            self.cost,
            BCRYPT_BASE64.encode(self.seed)
        )
    }

    /// Parses the salt prefix of a salt or full hash string.
    pub fn parse(s: &str) -> Result<Self> {
        HashParts::parse(s).map(|parts| parts.salt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashParts {
    salt: SaltParts,
    digest: Option<String>,
}

impl HashParts {
    pub fn salt(&self) -> &SaltParts {
        &self.salt
    }

    pub fn version(&self) -> Version {
        self.salt.version
    }

    pub fn cost(&self) -> u32 {
        self.salt.cost
    }

    /// The encoded digest, absent when the string is a bare salt.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    pub fn parse(s: &str) -> Result<Self> {
        let Some(rest) = s.strip_prefix('$') else {
            return Err(Error::malformed("missing '$' prefix"));
        };

        let mut fields = rest.splitn(3, '$');
        let (Some(tag), Some(cost), Some(tail)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::malformed("wrong number of fields"));
        };

        let version = Version::from_tag(tag)?;

        if cost.len() != 2 || !cost.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::malformed("cost must be two decimal digits"));
        }
        let cost: u32 = cost
            .parse()
            .map_err(|_| Error::malformed("cost must be two decimal digits"))?;

        if !tail.is_ascii() || (tail.len() != SALT_CHARS && tail.len() != SALT_CHARS + DIGEST_CHARS)
        {
            return Err(Error::malformed(format!(
                "expected {SALT_CHARS} salt characters optionally followed by {DIGEST_CHARS} digest characters"
            )));
        }

        let (salt, digest) = tail.split_at(SALT_CHARS);

        let decoded = BCRYPT_BASE64
            .decode(salt)
            .map_err(|e| Error::malformed(format!("invalid salt encoding: {e}")))?;
        let seed: [u8; SEED_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| Error::malformed("invalid salt length"))?;

        let digest = if digest.is_empty() {
            None
        } else {
            BCRYPT_BASE64
                .decode(digest)
                .map_err(|e| Error::malformed(format!("invalid digest encoding: {e}")))?;
            Some(digest.to_string())
        };

        Ok(Self {
            salt: SaltParts {
                version,
                cost,
                seed,
            },
            digest,
        })
    }
}

impl FromStr for HashParts {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        HashParts::parse(s)
    }
}
