//! Presence and type checks shared by the blocking and async forms.
//!
//! Every check runs before any random bytes are drawn or the engine is
//! touched. A null [`Input`] stands for an argument that was not supplied.

use serde_json::Value;
use zeroize::Zeroizing;

use crate::args::Input;
use crate::config::Config;
use crate::crypto::Minor;
use crate::error::{Error, Result};

pub(crate) const ROUNDS_NOT_NUMBER: &str = "rounds must be a number";
pub(crate) const ROUNDS_NOT_INTEGER: &str = "rounds must be a non-negative integer";
pub(crate) const MINOR_INVALID: &str = r#"minor must be either "a" or "b""#;
pub(crate) const HASH_ARGS_REQUIRED: &str = "data and salt arguments required";
pub(crate) const HASH_ARGS_TYPES: &str =
    "data must be a string and salt must either be a salt string or a number of rounds";
pub(crate) const COMPARE_ARGS_REQUIRED: &str = "data and hash arguments required";
pub(crate) const COMPARE_ARGS_TYPES: &str = "data and hash must be strings";
pub(crate) const ROUNDS_HASH_REQUIRED: &str = "hash argument required";
pub(crate) const ROUNDS_HASH_TYPE: &str = "hash must be a string";

/// Plaintext handed to the engine; wiped on drop.
pub(crate) type Plaintext = Zeroizing<String>;

/// Second operand of `hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SaltInput {
    Salt(String),
    Rounds(u32),
}

fn rounds_from_number(n: &serde_json::Number) -> Result<u32> {
    if let Some(r) = n.as_u64() {
        // Oversized costs still reach the engine, which rejects them.
        return Ok(u32::try_from(r).unwrap_or(u32::MAX));
    }
    match n.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(if f > u32::MAX as f64 {
            u32::MAX
        } else {
            f as u32
        }),
        _ => Err(Error::invalid(ROUNDS_NOT_INTEGER)),
    }
}

/// Resolve `gen_salt` parameters against the handle defaults.
///
/// Only an absent value selects the default; an explicit `0` is kept and
/// left for the engine to reject.
pub(crate) fn salt_params(
    rounds: &Input,
    minor: &Input,
    defaults: &Config,
) -> Result<(u32, Minor)> {
    let rounds = match rounds {
        Input::Value(Value::Null) => defaults.rounds(),
        Input::Value(Value::Number(n)) => rounds_from_number(n)?,
        Input::NonFinite(_) => return Err(Error::invalid(ROUNDS_NOT_INTEGER)),
        Input::Value(_) => return Err(Error::invalid(ROUNDS_NOT_NUMBER)),
    };

    let minor = match minor {
        Input::Value(Value::Null) => defaults.minor(),
        Input::Value(Value::String(s)) => s.parse()?,
        _ => return Err(Error::invalid(MINOR_INVALID)),
    };

    Ok((rounds, minor))
}

pub(crate) fn hash_params(data: Input, salt: Input) -> Result<(Plaintext, SaltInput)> {
    if data.is_null() || salt.is_null() {
        return Err(Error::invalid(HASH_ARGS_REQUIRED));
    }

    match (data, salt) {
        (Input::Value(Value::String(data)), Input::Value(Value::String(salt))) => {
            Ok((Zeroizing::new(data), SaltInput::Salt(salt)))
        }
        (Input::Value(Value::String(data)), Input::Value(Value::Number(n))) => {
            let rounds = rounds_from_number(&n)?;
            Ok((Zeroizing::new(data), SaltInput::Rounds(rounds)))
        }
        (Input::Value(Value::String(_)), Input::NonFinite(_)) => {
            Err(Error::invalid(ROUNDS_NOT_INTEGER))
        }
        _ => Err(Error::invalid(HASH_ARGS_TYPES)),
    }
}

pub(crate) fn compare_params(data: Input, hash: Input) -> Result<(Plaintext, String)> {
    if data.is_null() || hash.is_null() {
        return Err(Error::invalid(COMPARE_ARGS_REQUIRED));
    }

    match (data, hash) {
        (Input::Value(Value::String(data)), Input::Value(Value::String(hash))) => {
            Ok((Zeroizing::new(data), hash))
        }
        _ => Err(Error::invalid(COMPARE_ARGS_TYPES)),
    }
}

pub(crate) fn rounds_param(hash: Input) -> Result<String> {
    match hash {
        Input::Value(Value::Null) => Err(Error::invalid(ROUNDS_HASH_REQUIRED)),
        Input::Value(Value::String(hash)) => Ok(hash),
        _ => Err(Error::invalid(ROUNDS_HASH_TYPE)),
    }
}
