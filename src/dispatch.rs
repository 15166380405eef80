//! Calling-convention selection.
//!
//! Each async-capable call is classified once, at entry, into a [`Mode`]:
//! a caller callback, a deferred result, or an immediate rejection. The
//! deferred path re-enters the same operation with a synthesized callback
//! that settles the returned [`Deferred`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::args::{Arg, Callback, Input};
use crate::error::{Error, Result};

pub(crate) const CALLBACK_INVALID: &str = "cb must be a function or null to return a Promise";

pub(crate) enum Mode<T> {
    Callback(Callback<T>),
    Deferred,
    Rejected(Error),
}

impl<T> Mode<T> {
    fn label(&self) -> &'static str {
        match self {
            Mode::Callback(_) => "callback",
            Mode::Deferred => "deferred",
            Mode::Rejected(_) => "rejected",
        }
    }
}

/// Interpret the trailing callback slot.
fn callback_slot<T>(slot: Arg<T>) -> Mode<T> {
    match slot {
        Arg::Callback(cb) => Mode::Callback(cb),
        Arg::Value(v) if v.is_null() => Mode::Deferred,
        Arg::Value(_) => Mode::Rejected(Error::invalid(CALLBACK_INVALID)),
    }
}

/// Classified `gen_salt(rounds, minor, cb)` call.
pub(crate) struct SaltCall<T> {
    pub rounds: Input,
    pub minor: Input,
    pub mode: Mode<T>,
}

pub(crate) fn classify_salt<T>(rounds: Arg<T>, minor: Arg<T>, cb: Arg<T>) -> SaltCall<T> {
    let call = match (rounds, minor) {
        // gen_salt(cb): every parameter takes its default
        (Arg::Callback(cb), _) => SaltCall {
            rounds: Input::null(),
            minor: Input::null(),
            mode: Mode::Callback(cb),
        },
        // gen_salt(rounds, cb)
        (Arg::Value(rounds), Arg::Callback(cb)) => SaltCall {
            rounds,
            minor: Input::null(),
            mode: Mode::Callback(cb),
        },
        (Arg::Value(rounds), Arg::Value(minor)) => SaltCall {
            rounds,
            minor,
            mode: callback_slot(cb),
        },
    };
    tracing::trace!(mode = call.mode.label(), "classified gen_salt");
    call
}

/// Classified two-operand call (`hash`, `compare`).
pub(crate) enum PairCall<T> {
    /// A callable was passed where an operand belongs; it receives the
    /// type error and nothing else runs.
    Misplaced(Callback<T>),
    Call {
        first: Input,
        second: Input,
        mode: Mode<T>,
    },
}

pub(crate) fn classify_pair<T>(first: Arg<T>, second: Arg<T>, cb: Arg<T>) -> PairCall<T> {
    match (first, second) {
        (Arg::Callback(misplaced), _) | (_, Arg::Callback(misplaced)) => {
            tracing::trace!("callback found in operand slot");
            PairCall::Misplaced(misplaced)
        }
        (Arg::Value(first), Arg::Value(second)) => {
            let mode = callback_slot(cb);
            tracing::trace!(mode = mode.label(), "classified call");
            PairCall::Call {
                first,
                second,
                mode,
            }
        }
    }
}

/// What an async-capable operation hands back.
#[must_use = "a deferred result must be awaited or waited on"]
pub enum Completion<T> {
    /// The supplied callback will be invoked exactly once.
    Scheduled,
    /// No callback was supplied; the outcome settles this value.
    Deferred(Deferred<T>),
}

impl<T> Completion<T> {
    pub fn into_deferred(self) -> Option<Deferred<T>> {
        match self {
            Completion::Scheduled => None,
            Completion::Deferred(deferred) => Some(deferred),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Completion::Scheduled)
    }
}

/// Single-settlement result of a call made without a callback.
#[must_use = "futures do nothing unless awaited"]
pub struct Deferred<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T: Send + 'static> Deferred<T> {
    /// A pending value and the callback that settles it.
    pub(crate) fn channel() -> (Self, Callback<T>) {
        let (tx, rx) = oneshot::channel();
        let settle: Callback<T> = Box::new(move |outcome| {
            // The receiver may have been dropped; nobody is listening then.
            let _ = tx.send(outcome);
        });
        (Self { rx }, settle)
    }

    pub(crate) fn rejected(err: Error) -> Self {
        let (deferred, settle) = Self::channel();
        settle(Err(err));
        deferred
    }

    /// Block the current thread until the value settles.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context;
    /// `.await` the value there instead.
    pub fn wait(self) -> Result<T> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(lost()))
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(lost())))
    }
}

fn lost() -> Error {
    Error::Worker("call ended without settling".into())
}

/// Build the deferred form of an operation by re-entering it with a
/// settling callback.
pub(crate) fn defer<T, F>(reenter: F) -> Completion<T>
where
    T: Send + 'static,
    F: FnOnce(Arg<T>) -> Completion<T>,
{
    let (deferred, settle) = Deferred::channel();
    // With a callback supplied the operation always schedules.
    let _ = reenter(Arg::Callback(settle));
    Completion::Deferred(deferred)
}
