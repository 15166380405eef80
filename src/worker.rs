//! Background execution for the callback/future forms.
//!
//! Jobs run through `spawn_blocking` on the caller's Tokio runtime when
//! there is one. Callers outside any runtime get a lazily built runtime
//! owned by the pool.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, warn};

use crate::args::Callback;
use crate::error::{Error, Result};

pub(crate) struct WorkerPool {
    worker_threads: Option<usize>,
    runtime: OnceLock<Runtime>,
}

impl WorkerPool {
    pub(crate) fn new(worker_threads: Option<usize>) -> Self {
        Self {
            worker_threads,
            runtime: OnceLock::new(),
        }
    }

    fn handle(&self) -> Result<Handle> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(handle);
        }

        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime.handle().clone());
        }

        let mut builder = Builder::new_multi_thread();
        builder.thread_name("bcryptkit-worker").enable_all();
        if let Some(threads) = self.worker_threads {
            builder.worker_threads(threads).max_blocking_threads(threads);
        }
        let runtime = builder
            .build()
            .map_err(|e| Error::Worker(format!("failed to start worker runtime: {e}")))?;
        debug!(threads = ?self.worker_threads, "started fallback worker runtime");

        // A concurrent caller may have won the race; theirs is kept.
        let runtime = match self.runtime.set(runtime) {
            Ok(()) => self.runtime.get(),
            Err(ours) => {
                ours.shutdown_background();
                self.runtime.get()
            }
        };
        runtime
            .map(|rt| rt.handle().clone())
            .ok_or_else(|| Error::Worker("worker runtime unavailable".into()))
    }

    /// Run `job` off the calling thread and hand its outcome to `cb`.
    ///
    /// `cb` fires exactly once, also when `job` panics. Without a runtime
    /// the error is still delivered from another thread; only when the OS
    /// refuses to spawn one does `cb` run on the caller thread.
    pub(crate) fn run<T, F>(&self, cb: Callback<T>, job: F)
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let handle = match self.handle() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "no worker runtime, reporting from a detached thread");
                deliver_detached(cb, Err(e));
                return;
            }
        };

        handle.spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                let msg = panic_message(payload.as_ref());
                warn!(panic = %msg, "worker job panicked");
                Err(Error::Worker(msg))
            });
            cb(outcome);
        });
    }

    /// Deliver an already known outcome from a worker thread.
    pub(crate) fn settle<T>(&self, cb: Callback<T>, outcome: Result<T>)
    where
        T: Send + 'static,
    {
        self.run(cb, move || outcome);
    }
}

/// Hand `outcome` to `cb` on a plain thread of its own.
fn deliver_detached<T: Send + 'static>(cb: Callback<T>, outcome: Result<T>) {
    let slot = Arc::new(Mutex::new(Some((cb, outcome))));
    let theirs = Arc::clone(&slot);

    let spawned = thread::Builder::new()
        .name("bcryptkit-worker".into())
        .spawn(move || {
            if let Some((cb, outcome)) = take(&theirs) {
                cb(outcome);
            }
        });

    if let Err(e) = spawned {
        warn!(error = %e, "cannot spawn a thread, settling on caller thread");
        if let Some((cb, outcome)) = take(&slot) {
            cb(outcome);
        }
    }
}

fn take<V>(slot: &Mutex<Option<V>>) -> Option<V> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn runs_off_the_calling_thread_without_a_runtime() {
        let pool = WorkerPool::new(Some(1));
        let caller = thread::current().id();
        let (tx, rx) = mpsc::channel();

        let cb: Callback<thread::ThreadId> = Box::new(move |res| tx.send(res).unwrap());
        pool.run(cb, || Ok(thread::current().id()));

        let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn panics_are_reported_once() {
        let pool = WorkerPool::new(None);
        let (tx, rx) = mpsc::channel();

        let cb: Callback<()> = Box::new(move |res| tx.send(res).unwrap());
        pool.run(cb, || panic!("engine exploded"));

        let err = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap_err();
        assert!(matches!(err, Error::Worker(ref m) if m == "engine exploded"));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn detached_delivery_leaves_the_calling_thread() {
        let caller = thread::current().id();
        let (tx, rx) = mpsc::channel();

        let cb: Callback<u8> = Box::new(move |res| {
            tx.send((thread::current().id(), res)).unwrap();
        });
        deliver_detached(cb, Err(Error::Worker("no runtime".into())));

        let (thread, res) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(thread, caller);
        assert!(matches!(res, Err(Error::Worker(_))));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[tokio::test]
    async fn uses_the_ambient_runtime() {
        let pool = WorkerPool::new(None);
        let (tx, rx) = tokio::sync::oneshot::channel();

        let cb: Callback<u8> = Box::new(move |res| {
            let _ = tx.send(res);
        });
        pool.settle(cb, Ok(7));

        assert_eq!(rx.await.unwrap().unwrap(), 7);
        assert!(pool.runtime.get().is_none());
    }
}
