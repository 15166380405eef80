//! bcrypt password hashing with three calling conventions.
//!
//! Every operation exists as a blocking `*_sync` function and as an
//! async-capable function that either reports through a callback or, when
//! no callback is given, returns a [`Deferred`] future:
//!
//! ```no_run
//! use bcryptkit::{Arg, Bcrypt};
//!
//! # async fn demo() -> bcryptkit::Result<()> {
//! let bcrypt = Bcrypt::global();
//!
//! let hash = bcrypt.hash_sync("hunter2", 10)?;
//! assert!(bcrypt.compare_sync("hunter2", hash.as_str())?);
//!
//! let _ = bcrypt.gen_salt(
//!     12,
//!     "b",
//!     Arg::callback(|salt: bcryptkit::Result<String>| println!("{salt:?}")),
//! );
//!
//! let hash = bcrypt.hash("hunter2", 10, ()).into_deferred().unwrap().await?;
//! assert_eq!(bcrypt.get_rounds(hash.as_str())?, 10);
//! # Ok(())
//! # }
//! ```

mod args;
mod config;
pub mod crypto;
mod dispatch;
mod error;
mod validate;
mod worker;

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

pub use crate::args::{Arg, Callback, Input};
pub use crate::config::{Config, ConfigError};
pub use crate::crypto::{BcryptEngine, Engine, Minor, OsRandom, RandomSource};
pub use crate::dispatch::{Completion, Deferred};
pub use crate::error::{Error, ErrorKind, RandomError, Result};
use crate::dispatch::{Mode, PairCall, SaltCall};
use crate::validate::{COMPARE_ARGS_REQUIRED, HASH_ARGS_TYPES, SaltInput};
use crate::worker::WorkerPool;

struct Inner {
    engine: Arc<dyn Engine>,
    random: Arc<dyn RandomSource>,
    config: Config,
    pool: WorkerPool,
}

impl Inner {
    fn gen_salt(&self, rounds: u32, minor: Minor) -> Result<String> {
        let seed = crypto::random::draw_seed(self.random.as_ref())?;
        debug!(rounds, %minor, "generating salt");
        self.engine.gen_salt(minor, rounds, &seed)
    }

    fn hash(&self, data: &str, salt: SaltInput) -> Result<String> {
        let salt = match salt {
            SaltInput::Rounds(rounds) => self.gen_salt(rounds, self.config.minor())?,
            SaltInput::Salt(salt) => salt,
        };
        debug!("hashing");
        self.engine.encrypt(data, &salt)
    }

    fn compare(&self, data: &str, hash: &str) -> Result<bool> {
        debug!("comparing");
        self.engine.compare(data, hash)
    }
}

/// Handle to the engine, random source and worker pool.
///
/// Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct Bcrypt {
    inner: Arc<Inner>,
}

impl fmt::Debug for Bcrypt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bcrypt")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Default for Bcrypt {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct Builder {
    config: Config,
    engine: Option<Arc<dyn Engine>>,
    random: Option<Arc<dyn RandomSource>>,
}

impl Builder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn engine(mut self, engine: impl Engine + 'static) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    pub fn random_source(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Some(Arc::new(random));
        self
    }

    pub fn build(self) -> Bcrypt {
        Bcrypt {
            inner: Arc::new(Inner {
                engine: self.engine.unwrap_or_else(|| Arc::new(BcryptEngine)),
                random: self.random.unwrap_or_else(|| Arc::new(OsRandom)),
                pool: WorkerPool::new(self.config.worker_threads()),
                config: self.config,
            }),
        }
    }
}

impl Bcrypt {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Process-wide handle with default configuration, created on first use.
    pub fn global() -> &'static Bcrypt {
        static GLOBAL: OnceLock<Bcrypt> = OnceLock::new();
        GLOBAL.get_or_init(Bcrypt::new)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Generate a salt on the calling thread.
    ///
    /// `rounds` and `minor` default to the configured values (10 and `"b"`
    /// unless changed) when null.
    pub fn gen_salt_sync(
        &self,
        rounds: impl Into<Input>,
        minor: impl Into<Input>,
    ) -> Result<String> {
        let (rounds, minor) =
            validate::salt_params(&rounds.into(), &minor.into(), &self.inner.config)?;
        self.inner.gen_salt(rounds, minor)
    }

    /// Generate a salt in the background.
    ///
    /// Accepts `(cb)`, `(rounds, cb)`, `(rounds, minor, cb)` or no callback
    /// at all, in which case a [`Deferred`] is returned.
    pub fn gen_salt(
        &self,
        rounds: impl Into<Arg<String>>,
        minor: impl Into<Arg<String>>,
        cb: impl Into<Arg<String>>,
    ) -> Completion<String> {
        let SaltCall { rounds, minor, mode } =
            dispatch::classify_salt(rounds.into(), minor.into(), cb.into());

        let cb = match mode {
            Mode::Callback(cb) => cb,
            Mode::Deferred => return dispatch::defer(|cb| self.gen_salt(rounds, minor, cb)),
            Mode::Rejected(err) => return Completion::Deferred(Deferred::rejected(err)),
        };

        match validate::salt_params(&rounds, &minor, &self.inner.config) {
            Ok((rounds, minor)) => {
                let inner = Arc::clone(&self.inner);
                self.inner.pool.run(cb, move || inner.gen_salt(rounds, minor));
            }
            Err(err) => self.inner.pool.settle(cb, Err(err)),
        }
        Completion::Scheduled
    }

    /// Hash `data` with a salt string, or with a fresh salt of the given
    /// cost when `salt` is a number.
    pub fn hash_sync(&self, data: impl Into<Input>, salt: impl Into<Input>) -> Result<String> {
        let (data, salt) = validate::hash_params(data.into(), salt.into())?;
        self.inner.hash(&data, salt)
    }

    pub fn hash(
        &self,
        data: impl Into<Arg<String>>,
        salt: impl Into<Arg<String>>,
        cb: impl Into<Arg<String>>,
    ) -> Completion<String> {
        let (data, salt, mode) = match dispatch::classify_pair(data.into(), salt.into(), cb.into())
        {
            PairCall::Misplaced(cb) => {
                self.inner.pool.settle(cb, Err(Error::invalid(HASH_ARGS_TYPES)));
                return Completion::Scheduled;
            }
            PairCall::Call {
                first,
                second,
                mode,
            } => (first, second, mode),
        };

        let cb = match mode {
            Mode::Callback(cb) => cb,
            Mode::Deferred => return dispatch::defer(|cb| self.hash(data, salt, cb)),
            Mode::Rejected(err) => return Completion::Deferred(Deferred::rejected(err)),
        };

        match validate::hash_params(data, salt) {
            Ok((data, salt)) => {
                let inner = Arc::clone(&self.inner);
                self.inner.pool.run(cb, move || inner.hash(&data, salt));
            }
            Err(err) => self.inner.pool.settle(cb, Err(err)),
        }
        Completion::Scheduled
    }

    /// Check `data` against `hash`. A mismatch is `Ok(false)`, never an error.
    pub fn compare_sync(&self, data: impl Into<Input>, hash: impl Into<Input>) -> Result<bool> {
        let (data, hash) = validate::compare_params(data.into(), hash.into())?;
        self.inner.compare(&data, &hash)
    }

    pub fn compare(
        &self,
        data: impl Into<Arg<bool>>,
        hash: impl Into<Arg<bool>>,
        cb: impl Into<Arg<bool>>,
    ) -> Completion<bool> {
        let (data, hash, mode) = match dispatch::classify_pair(data.into(), hash.into(), cb.into())
        {
            PairCall::Misplaced(cb) => {
                self.inner
                    .pool
                    .settle(cb, Err(Error::invalid(COMPARE_ARGS_REQUIRED)));
                return Completion::Scheduled;
            }
            PairCall::Call {
                first,
                second,
                mode,
            } => (first, second, mode),
        };

        let cb = match mode {
            Mode::Callback(cb) => cb,
            Mode::Deferred => return dispatch::defer(|cb| self.compare(data, hash, cb)),
            Mode::Rejected(err) => return Completion::Deferred(Deferred::rejected(err)),
        };

        match validate::compare_params(data, hash) {
            Ok((data, hash)) => {
                let inner = Arc::clone(&self.inner);
                self.inner.pool.run(cb, move || inner.compare(&data, &hash));
            }
            Err(err) => self.inner.pool.settle(cb, Err(err)),
        }
        Completion::Scheduled
    }

    /// Cost factor embedded in a salt or hash. Blocking only.
    pub fn get_rounds(&self, hash: impl Into<Input>) -> Result<u32> {
        let hash = validate::rounds_param(hash.into())?;
        self.inner.engine.get_rounds(&hash)
    }
}

/// [`Bcrypt::gen_salt_sync`] on the [global](Bcrypt::global) handle.
pub fn gen_salt_sync(rounds: impl Into<Input>, minor: impl Into<Input>) -> Result<String> {
    Bcrypt::global().gen_salt_sync(rounds, minor)
}

/// [`Bcrypt::gen_salt`] on the [global](Bcrypt::global) handle.
pub fn gen_salt(
    rounds: impl Into<Arg<String>>,
    minor: impl Into<Arg<String>>,
    cb: impl Into<Arg<String>>,
) -> Completion<String> {
    Bcrypt::global().gen_salt(rounds, minor, cb)
}

/// [`Bcrypt::hash_sync`] on the [global](Bcrypt::global) handle.
pub fn hash_sync(data: impl Into<Input>, salt: impl Into<Input>) -> Result<String> {
    Bcrypt::global().hash_sync(data, salt)
}

/// [`Bcrypt::hash`] on the [global](Bcrypt::global) handle.
pub fn hash(
    data: impl Into<Arg<String>>,
    salt: impl Into<Arg<String>>,
    cb: impl Into<Arg<String>>,
) -> Completion<String> {
    Bcrypt::global().hash(data, salt, cb)
}

/// [`Bcrypt::compare_sync`] on the [global](Bcrypt::global) handle.
pub fn compare_sync(data: impl Into<Input>, hash: impl Into<Input>) -> Result<bool> {
    Bcrypt::global().compare_sync(data, hash)
}

/// [`Bcrypt::compare`] on the [global](Bcrypt::global) handle.
pub fn compare(
    data: impl Into<Arg<bool>>,
    hash: impl Into<Arg<bool>>,
    cb: impl Into<Arg<bool>>,
) -> Completion<bool> {
    Bcrypt::global().compare(data, hash, cb)
}

/// [`Bcrypt::get_rounds`] on the [global](Bcrypt::global) handle.
pub fn get_rounds(hash: impl Into<Input>) -> Result<u32> {
    Bcrypt::global().get_rounds(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SEED_LEN;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Calls(Arc<AtomicUsize>);

    impl Calls {
        fn bump(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Records calls and produces recognizable strings without hashing.
    struct FakeEngine(Calls);

    impl Engine for FakeEngine {
        fn gen_salt(&self, minor: Minor, cost: u32, _seed: &[u8; SEED_LEN]) -> Result<String> {
            self.0.bump();
            Ok(format!("salt:{minor}:{cost}"))
        }

        fn encrypt(&self, data: &str, salt: &str) -> Result<String> {
            self.0.bump();
            Ok(format!("hash:{salt}:{data}"))
        }

        fn compare(&self, data: &str, hash: &str) -> Result<bool> {
            self.0.bump();
            Ok(hash.ends_with(&format!(":{data}")))
        }

        fn get_rounds(&self, _hash: &str) -> Result<u32> {
            self.0.bump();
            Ok(7)
        }
    }

    struct CountingRandom(Calls);

    impl RandomSource for CountingRandom {
        fn fill(&self, buf: &mut [u8]) -> Result<()> {
            self.0.bump();
            buf.fill(1);
            Ok(())
        }
    }

    struct BrokenRandom;

    impl RandomSource for BrokenRandom {
        fn fill(&self, _buf: &mut [u8]) -> Result<()> {
            Err(Error::Randomness("entropy source offline".into()))
        }
    }

    fn fake() -> (Bcrypt, Calls, Calls) {
        let engine = Calls::default();
        let random = Calls::default();
        let bcrypt = Bcrypt::builder()
            .engine(FakeEngine(engine.clone()))
            .random_source(CountingRandom(random.clone()))
            .build();
        (bcrypt, engine, random)
    }

    fn recv<T>(rx: &mpsc::Receiver<Result<T>>) -> Result<T> {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    fn channel_cb<T: Send + 'static>() -> (Arg<T>, mpsc::Receiver<Result<T>>) {
        let (tx, rx) = mpsc::channel();
        (Arg::callback(move |res| tx.send(res).unwrap()), rx)
    }

    #[test]
    fn gen_salt_sync_uses_defaults() {
        let (bcrypt, engine, random) = fake();
        assert_eq!(bcrypt.gen_salt_sync((), ()).unwrap(), "salt:b:10");
        assert_eq!(engine.count(), 1);
        assert_eq!(random.count(), 1);
    }

    #[test]
    fn configured_defaults_apply() {
        let config = Config::default().with_rounds(12).unwrap().with_minor(Minor::A);
        let bcrypt = Bcrypt::builder()
            .config(config)
            .engine(FakeEngine(Calls::default()))
            .build();
        assert_eq!(bcrypt.gen_salt_sync((), ()).unwrap(), "salt:a:12");
        assert_eq!(bcrypt.hash_sync("pw", 5).unwrap(), "hash:salt:a:5:pw");
    }

    #[test]
    fn invalid_input_draws_no_randomness() {
        let (bcrypt, engine, random) = fake();

        assert!(bcrypt.gen_salt_sync("ten", ()).is_err());
        assert!(bcrypt.gen_salt_sync(10, "c").is_err());
        assert!(bcrypt.hash_sync(Value::Null, 10).is_err());
        assert!(bcrypt.hash_sync("pw", true).is_err());

        let (cb, rx) = channel_cb::<String>();
        assert!(bcrypt.gen_salt("ten", (), cb).is_scheduled());
        assert_eq!(recv(&rx).unwrap_err().to_string(), "rounds must be a number");

        assert_eq!(engine.count(), 0);
        assert_eq!(random.count(), 0);
    }

    #[test]
    fn non_finite_rounds_never_fall_back_to_the_default() {
        let (bcrypt, engine, random) = fake();

        for rounds in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = bcrypt.gen_salt_sync(rounds, ()).unwrap_err();
            assert_eq!(err.to_string(), "rounds must be a non-negative integer");

            let err = bcrypt.hash_sync("pw", rounds).unwrap_err();
            assert_eq!(err.to_string(), "rounds must be a non-negative integer");

            let (cb, rx) = channel_cb::<String>();
            let _ = bcrypt.gen_salt(rounds, (), cb);
            assert_eq!(recv(&rx).unwrap_err().kind(), ErrorKind::InvalidArgument);
        }

        assert_eq!(engine.count(), 0);
        assert_eq!(random.count(), 0);
    }

    #[test]
    fn hash_with_rounds_draws_a_fresh_salt_each_time() {
        let (bcrypt, _, random) = fake();
        bcrypt.hash_sync("pw", 6).unwrap();
        bcrypt.hash_sync("pw", 6).unwrap();
        assert_eq!(random.count(), 2);
    }

    #[test]
    fn hash_with_salt_string_skips_randomness() {
        let (bcrypt, _, random) = fake();
        assert_eq!(bcrypt.hash_sync("pw", "S").unwrap(), "hash:S:pw");
        assert_eq!(random.count(), 0);
    }

    #[test]
    fn gen_salt_callback_only_form() {
        let (bcrypt, _, _) = fake();
        let (cb, rx) = channel_cb::<String>();
        let _ = bcrypt.gen_salt(cb, (), ());
        assert_eq!(recv(&rx).unwrap(), "salt:b:10");
    }

    #[test]
    fn gen_salt_rounds_and_callback_form() {
        let (bcrypt, _, _) = fake();
        let (cb, rx) = channel_cb::<String>();
        let _ = bcrypt.gen_salt(8, cb, ());
        assert_eq!(recv(&rx).unwrap(), "salt:b:8");
    }

    #[test]
    fn callback_fires_off_the_calling_thread() {
        let (bcrypt, _, _) = fake();
        let caller = std::thread::current().id();
        let (tx, rx) = mpsc::channel();

        let _ = bcrypt.hash(
            Value::Null,
            "salt",
            Arg::callback(move |res: Result<String>| {
                tx.send((std::thread::current().id(), res.is_err())).unwrap();
            }),
        );

        let (thread, failed) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(thread, caller);
        assert!(failed);
    }

    #[test]
    fn randomness_failure_skips_engine() {
        let engine = Calls::default();
        let bcrypt = Bcrypt::builder()
            .engine(FakeEngine(engine.clone()))
            .random_source(BrokenRandom)
            .build();

        let err = bcrypt.gen_salt_sync((), ()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RandomnessFailure);

        let (cb, rx) = channel_cb::<String>();
        let _ = bcrypt.gen_salt((), (), cb);
        assert_eq!(recv(&rx).unwrap_err().to_string(), "entropy source offline");

        let (cb, rx) = channel_cb::<String>();
        let _ = bcrypt.hash("pw", 10, cb);
        assert_eq!(recv(&rx).unwrap_err().kind(), ErrorKind::RandomnessFailure);

        assert_eq!(engine.count(), 0);
    }

    #[test]
    fn misplaced_callback_receives_type_error() {
        let (bcrypt, engine, _) = fake();

        let (cb, rx) = channel_cb::<String>();
        assert!(bcrypt.hash(cb, (), ()).is_scheduled());
        assert_eq!(
            recv(&rx).unwrap_err().to_string(),
            "data must be a string and salt must either be a salt string or a number of rounds"
        );

        let (cb, rx) = channel_cb::<bool>();
        assert!(bcrypt.compare("pw", cb, ()).is_scheduled());
        assert_eq!(
            recv(&rx).unwrap_err().to_string(),
            "data and hash arguments required"
        );

        assert_eq!(engine.count(), 0);
    }

    #[test]
    fn deferred_forms_settle_with_sync_results() {
        let (bcrypt, _, _) = fake();

        let salt = bcrypt.gen_salt(5, "a", ()).into_deferred().unwrap().wait();
        assert_eq!(salt.unwrap(), "salt:a:5");

        let hash = bcrypt.hash("pw", "S", ()).into_deferred().unwrap().wait();
        assert_eq!(hash.unwrap(), bcrypt.hash_sync("pw", "S").unwrap());

        let matched = bcrypt.compare("pw", "hash:S:pw", ()).into_deferred().unwrap().wait();
        assert!(matched.unwrap());
    }

    #[test]
    fn non_callable_callback_rejects_without_work() {
        let (bcrypt, engine, random) = fake();

        let err = bcrypt
            .hash("pw", 10, "not a function")
            .into_deferred()
            .unwrap()
            .wait()
            .unwrap_err();
        assert_eq!(err.to_string(), "cb must be a function or null to return a Promise");

        let err = bcrypt
            .gen_salt(10, "b", 3)
            .into_deferred()
            .unwrap()
            .wait()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert_eq!(engine.count(), 0);
        assert_eq!(random.count(), 0);
    }

    #[test]
    fn deferred_validation_errors_reject() {
        let (bcrypt, _, _) = fake();
        let err = bcrypt
            .compare("pw", 5, ())
            .into_deferred()
            .unwrap()
            .wait()
            .unwrap_err();
        assert_eq!(err.to_string(), "data and hash must be strings");
    }

    #[test]
    fn get_rounds_validates_then_delegates() {
        let (bcrypt, engine, _) = fake();
        assert_eq!(
            bcrypt.get_rounds(()).unwrap_err().to_string(),
            "hash argument required"
        );
        assert_eq!(
            bcrypt.get_rounds(12).unwrap_err().to_string(),
            "hash must be a string"
        );
        assert_eq!(engine.count(), 0);
        assert_eq!(bcrypt.get_rounds("anything").unwrap(), 7);
    }

    #[test]
    fn global_handle_is_shared() {
        assert!(std::ptr::eq(Bcrypt::global(), Bcrypt::global()));
        assert_eq!(Bcrypt::global().config(), &Config::default());
    }
}
