//! Thread-safe binlog with write batching.
//!
//! All appends funnel through a dedicated writer actor, which coalesces
//! records arriving within a short window into one write-plus-fsync.
//! Event ids are claimed under a lock held across the post, so ids on
//! disk equal arrival order.

// Layer 1: Standard library
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party
use bytes::Bytes;
use parking_lot::Mutex;

// Layer 3: Internal
use super::event::{BinlogDebugInfo, BinlogEvent};
use super::log::Binlog;
use crate::db_key::DbKey;
use crate::errors::DbError;
use tgsys_actor::{Actor, ActorContext, ActorOwn, Promise, PromiseFuture, Scheduler};
use tgsys_utils::{CoreError, CoreResult};

/// Window during which appends are coalesced before one fsync.
const FLUSH_WINDOW: Duration = Duration::from_millis(1);

struct WriterActor {
    binlog: Option<Binlog>,
    pending: Vec<(BinlogEvent, BinlogDebugInfo)>,
    waiters: Vec<Promise<()>>,
}

impl WriterActor {
    fn enqueue(
        &mut self,
        ctx: &mut ActorContext,
        event: BinlogEvent,
        debug_info: BinlogDebugInfo,
    ) {
        if self.pending.is_empty() && !ctx.has_timeout() {
            ctx.set_timeout_in(FLUSH_WINDOW);
        }
        self.pending.push((event, debug_info));
    }

    fn flush_batch(&mut self) -> CoreResult<()> {
        let result = match &mut self.binlog {
            Some(binlog) => {
                let mut result = Ok(());
                for (event, debug_info) in self.pending.drain(..) {
                    if let Err(err) = binlog.add_raw_event(event, debug_info) {
                        tracing::error!(%err, "dropping batched binlog event");
                        result = Err(CoreError::from(err));
                    }
                }
                match binlog.flush() {
                    Ok(()) => result,
                    Err(err) => Err(CoreError::from(err)),
                }
            }
            None => {
                self.pending.clear();
                Err(CoreError::from(DbError::Closed))
            }
        };
        for waiter in self.waiters.drain(..) {
            waiter.set_result(result.clone());
        }
        result
    }
}

impl Actor for WriterActor {
    fn timeout_expired(&mut self, _ctx: &mut ActorContext) {
        let _ = self.flush_batch();
    }

    fn tear_down(&mut self, _ctx: &mut ActorContext) {
        let _ = self.flush_batch();
        if let Some(binlog) = self.binlog.take() {
            if let Err(err) = binlog.close() {
                tracing::error!(%err, "binlog close failed during writer teardown");
            }
        }
    }
}

/// A binlog whose append surface is safe from any thread.
///
/// Internally a single writer actor owns the [`Binlog`]; appends claim
/// their event id and post to the writer, which batches writes under a
/// ≤1 ms window to amortize fsyncs.
pub struct ConcurrentBinlog {
    writer: ActorOwn<WriterActor>,
    next_event_id: Mutex<u64>,
    rekey_in_progress: Arc<AtomicBool>,
}

impl ConcurrentBinlog {
    /// Open the binlog at `path` (replaying synchronously on the calling
    /// thread) and hand it to a writer actor on `scheduler`.
    pub fn init<F>(
        scheduler: &Scheduler,
        path: impl AsRef<Path>,
        replay: F,
        db_key: DbKey,
    ) -> Result<Self, DbError>
    where
        F: FnMut(&BinlogEvent) -> CoreResult<()>,
    {
        let binlog = Binlog::init(path, replay, db_key)?;
        let next_event_id = binlog.next_event_id();
        let writer = scheduler.create_actor(
            "binlog-writer",
            WriterActor {
                binlog: Some(binlog),
                pending: Vec::new(),
                waiters: Vec::new(),
            },
        );
        Ok(Self {
            writer,
            next_event_id: Mutex::new(next_event_id),
            rekey_in_progress: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The id the next appended event will receive.
    pub fn next_event_id(&self) -> u64 {
        *self.next_event_id.lock()
    }

    /// Append a record from any thread; returns the assigned event id.
    /// Durable once a subsequent [`sync`](Self::sync) completes.
    #[track_caller]
    pub fn add_raw_event(&self, event_type: u32, flags: u32, extra: u64, payload: Bytes) -> u64 {
        let debug_info = BinlogDebugInfo::here();
        // The lock spans the post so arrival order equals id order.
        let mut next = self.next_event_id.lock();
        let event_id = *next;
        *next += 1;
        let event = BinlogEvent::new(event_id, event_type, flags, extra, payload);
        self.writer
            .send_closure(move |actor, ctx| actor.enqueue(ctx, event, debug_info));
        event_id
    }

    /// Flush everything appended so far; the future completes after the
    /// fsync.
    pub fn sync(&self) -> PromiseFuture<()> {
        let (promise, future) = Promise::new();
        self.writer.send_closure(move |actor, _ctx| {
            actor.waiters.push(promise);
            let _ = actor.flush_batch();
        });
        future
    }

    /// Rewrite the file under `new_key`. Only one key change may run at
    /// a time; a concurrent call fails with
    /// [`DbError::KeyChangeInProgress`].
    pub fn change_key(&self, new_key: DbKey) -> Result<PromiseFuture<()>, DbError> {
        if self.rekey_in_progress.swap(true, Ordering::SeqCst) {
            return Err(DbError::KeyChangeInProgress);
        }
        let (promise, future) = Promise::new();
        let flag = Arc::clone(&self.rekey_in_progress);
        self.writer.send_closure(move |actor, _ctx| {
            let result = actor.flush_batch().and_then(|()| match &mut actor.binlog {
                Some(binlog) => binlog.change_key(new_key).map_err(CoreError::from),
                None => Err(CoreError::from(DbError::Closed)),
            });
            flag.store(false, Ordering::SeqCst);
            promise.set_result(result);
        });
        Ok(future)
    }

    /// Flush, close the underlying file and stop the writer.
    pub fn close(self) -> PromiseFuture<()> {
        let (promise, future) = Promise::new();
        self.writer.send_closure(move |actor, ctx| {
            let result = actor.flush_batch();
            if let Some(binlog) = actor.binlog.take() {
                match binlog.close() {
                    Ok(()) => promise.set_result(result),
                    Err(err) => promise.set_error(CoreError::from(err)),
                }
            } else {
                promise.set_result(result);
            }
            ctx.stop();
        });
        future
    }

    /// Remove the binlog and its sidecar files.
    pub fn destroy(path: impl AsRef<Path>) -> Result<(), DbError> {
        Binlog::destroy(path)
    }
}
