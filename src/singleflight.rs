//! # Duplicate Call Suppression
//!
//! Collapses concurrent calls for the same key into one execution whose
//! result is handed to every caller.
//!
//! ## Architecture
//!
//! ```text
//!   caller A ──work("Tom")──┐
//!   caller B ──work("Tom")──┼──► calls: FxHashMap<String, (id, watch::Receiver)>
//!   caller C ──work("Tom")──┘              │
//!                                          │ first caller registers and runs f()
//!                                          ▼
//!                           ┌──────────────────────────────┐
//!                           │ leader: f().await            │
//!                           │ tx.send_replace(Some(result))│──► B, C wake with a clone
//!                           │ registration removed         │
//!                           └──────────────────────────────┘
//! ```
//!
//! Waiters park on a `tokio::sync::watch` channel, so there is no polling and
//! the map lock is only held for the lookup or insert itself.
//!
//! ## Semantics
//!
//! - Results are not memoized: once the leader finishes, the next call for
//!   the same key runs `f` again.
//! - Distinct keys never wait on each other.
//! - If the leader's future is dropped before finishing, its registration is
//!   removed and the waiters start over. One of them becomes the new leader.
//!
//! ## Example Usage
//!
//! ```
//! use peercache::singleflight::SingleFlight;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let flight: SingleFlight<u32, String> = SingleFlight::new();
//! let value = flight.work("answer", || async { Ok(42) }).await;
//! assert_eq!(value, Ok(42));
//! assert_eq!(flight.in_flight(), 0);
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::watch;

type Outcome<T, E> = Option<Result<T, E>>;

struct Call<T, E> {
    id: u64,
    rx: watch::Receiver<Outcome<T, E>>,
}

/// Per-key in-flight call registry.
pub struct SingleFlight<T, E> {
    calls: Mutex<FxHashMap<String, Call<T, E>>>,
    next_id: AtomicU64,
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Runs `f` once per key across concurrent callers.
    pub async fn work<F, Fut>(&self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.work_shared(key, f).await.0
    }

    /// Like [`work`](Self::work), also reporting whether the result came
    /// from another caller's execution.
    pub async fn work_shared<F, Fut>(&self, key: &str, f: F) -> (Result<T, E>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (tx, id) = loop {
            let (mut rx, id) = {
                let mut calls = self.calls.lock();
                match calls.get(key) {
                    Some(call) => (call.rx.clone(), call.id),
                    None => {
                        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                        let (tx, rx) = watch::channel(None);
                        calls.insert(key.to_owned(), Call { id, rx });
                        break (tx, id);
                    },
                }
            };

            let published = rx.wait_for(Option::is_some).await.map(|v| (*v).clone());
            let outcome = match published {
                Ok(outcome) => outcome,
                Err(_) => rx.borrow().clone(),
            };
            if let Some(result) = outcome {
                return (result, true);
            }

            // Leader went away without publishing.
            self.forget(key, id);
        };

        let registration = Registration {
            flight: self,
            key,
            id,
        };
        let result = f().await;
        tx.send_replace(Some(result.clone()));
        drop(registration);
        (result, false)
    }

    /// Number of keys with a call currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn forget(&self, key: &str, id: u64) {
        let mut calls = self.calls.lock();
        if calls.get(key).is_some_and(|call| call.id == id) {
            calls.remove(key);
        }
    }
}

impl<T, E> Default for SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for SingleFlight<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

// Removes the leader's registration on completion or when its future is dropped.
struct Registration<'a, T, E>
where
    T: Clone,
    E: Clone,
{
    flight: &'a SingleFlight<T, E>,
    key: &'a str,
    id: u64,
}

impl<T, E> Drop for Registration<'_, T, E>
where
    T: Clone,
    E: Clone,
{
    fn drop(&mut self) {
        self.flight.forget(self.key, self.id);
    }
}
