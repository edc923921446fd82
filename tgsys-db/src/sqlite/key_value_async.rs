//! Write-coalescing asynchronous key-value front end.
//!
//! Writes are proxied to a dedicated actor that gathers operations over
//! a tunable window and issues them as one grouped transaction,
//! completing promises afterwards. Reads are served synchronously from
//! the pending-write shadow when the key has an unflushed write, else
//! from the table.

// Layer 1: Standard library
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party
use parking_lot::RwLock;

// Layer 3: Internal
use super::connection_safe::SqliteKeyValueSafe;
use tgsys_actor::{Actor, ActorContext, ActorOwn, Promise, PromiseFuture, Scheduler};
use tgsys_utils::CoreError;

/// Default write-coalescing window.
pub const DEFAULT_FLUSH_WINDOW: Duration = Duration::from_millis(50);

/// Configuration of [`SqliteKeyValueAsync`].
#[derive(Debug, Clone)]
pub struct SqliteKeyValueAsyncConfig {
    /// How long writes may linger before the grouped transaction runs.
    pub flush_window: Duration,
}

impl Default for SqliteKeyValueAsyncConfig {
    fn default() -> Self {
        Self {
            flush_window: DEFAULT_FLUSH_WINDOW,
        }
    }
}

impl SqliteKeyValueAsyncConfig {
    /// Override the coalescing window.
    pub fn with_flush_window(mut self, flush_window: Duration) -> Self {
        self.flush_window = flush_window;
        self
    }
}

/// Pending writes: `Some(value)` is an unflushed set, `None` an
/// unflushed erase.
type Shadow = HashMap<String, Option<String>>;

struct FlushActor {
    kv: Arc<SqliteKeyValueSafe>,
    shadow: Arc<RwLock<Shadow>>,
    waiters: Vec<Promise<()>>,
    flush_window: Duration,
}

impl FlushActor {
    fn note_write(&mut self, ctx: &mut ActorContext, promise: Promise<()>) {
        self.waiters.push(promise);
        if !ctx.has_timeout() {
            ctx.set_timeout_in(self.flush_window);
        }
    }

    fn flush(&mut self) {
        let pending: Shadow = std::mem::take(&mut *self.shadow.write());

        let mut sets = HashMap::new();
        let mut erases = Vec::new();
        for (key, value) in pending {
            match value {
                Some(value) => {
                    sets.insert(key, value);
                }
                None => erases.push(key),
            }
        }

        let result = if sets.is_empty() && erases.is_empty() {
            Ok(())
        } else {
            self.kv.apply_batch(sets, erases).map_err(CoreError::from)
        };
        for waiter in self.waiters.drain(..) {
            waiter.set_result(result.clone());
        }
    }
}

impl Actor for FlushActor {
    fn timeout_expired(&mut self, _ctx: &mut ActorContext) {
        self.flush();
    }

    fn tear_down(&mut self, _ctx: &mut ActorContext) {
        self.flush();
    }
}

/// Asynchronous, write-coalescing view over a [`SqliteKeyValueSafe`].
pub struct SqliteKeyValueAsync {
    actor: ActorOwn<FlushActor>,
    shadow: Arc<RwLock<Shadow>>,
    kv: Arc<SqliteKeyValueSafe>,
}

impl SqliteKeyValueAsync {
    /// Wrap `kv`, batching writes on a dedicated actor on `scheduler`.
    pub fn new(
        scheduler: &Scheduler,
        kv: Arc<SqliteKeyValueSafe>,
        config: SqliteKeyValueAsyncConfig,
    ) -> Self {
        let shadow: Arc<RwLock<Shadow>> = Arc::new(RwLock::new(HashMap::new()));
        let actor = scheduler.create_actor(
            "sqlite-kv-flush",
            FlushActor {
                kv: Arc::clone(&kv),
                shadow: Arc::clone(&shadow),
                waiters: Vec::new(),
                flush_window: config.flush_window,
            },
        );
        Self { actor, shadow, kv }
    }

    /// Store `value` under `key`; the future completes once the grouped
    /// transaction committed.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> PromiseFuture<()> {
        self.shadow
            .write()
            .insert(key.into(), Some(value.into()));
        self.enqueue()
    }

    /// Remove `key`; completion as for [`set`](Self::set).
    pub fn erase(&self, key: impl Into<String>) -> PromiseFuture<()> {
        self.shadow.write().insert(key.into(), None);
        self.enqueue()
    }

    /// The latest written value, observing unflushed writes.
    pub fn get(&self, key: &str) -> String {
        if let Some(pending) = self.shadow.read().get(key) {
            return pending.clone().unwrap_or_default();
        }
        self.kv.get(key)
    }

    /// Force the pending batch out now.
    pub fn flush_now(&self) -> PromiseFuture<()> {
        let (promise, future) = Promise::new();
        self.actor.send_closure(move |actor, _ctx| {
            actor.waiters.push(promise);
            actor.flush();
        });
        future
    }

    fn enqueue(&self) -> PromiseFuture<()> {
        let (promise, future) = Promise::new();
        self.actor
            .send_closure(move |actor, ctx| actor.note_write(ctx, promise));
        future
    }
}
