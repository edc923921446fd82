//! The N+1-thread actor scheduler.
//!
//! A [`Scheduler`] hosts `n_workers + 1` OS threads. Each thread runs a
//! current-thread tokio runtime driving a `LocalSet`; actors are pinned
//! to exactly one thread and never migrate, so actor state needs no
//! synchronization. Cross-thread posting goes through the actor's
//! mailbox channel, whose waker doubles as the per-thread notifier.
//!
//! Per-iteration order on each thread: the shutdown flag, then the due
//! timer, then one mailbox signal. Blocking happens inside the runtime
//! parker until new work or the next deadline.

// Layer 1: Standard library
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Layer 2: Third-party
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, Notify};
use tokio::task::LocalSet;

// Layer 3: Internal
use crate::actor::{Actor, ActorContext, ActorInfo, ActorState};
use crate::config::SchedulerConfig;
use crate::errors::ActorError;
use crate::handle::ActorOwn;
use crate::mailbox::Signal;

/// Scheduler state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    /// Accepting actors and running them.
    Running,
    /// `finish()` called; threads are draining.
    ShuttingDown,
    /// All threads joined.
    Stopped,
}

type SpawnFn = Box<dyn FnOnce() + Send + 'static>;

/// Count of live actor tasks on one scheduler thread.
struct TaskCounter {
    count: AtomicUsize,
    notify: Notify,
}

impl TaskCounter {
    fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.notify.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Per-thread scheduler context, available to code running on a
/// scheduler thread.
#[derive(Clone)]
struct ThreadCtx {
    scheduler_id: usize,
    shutdown: watch::Receiver<bool>,
    tasks: Arc<TaskCounter>,
}

thread_local! {
    static THREAD_CTX: RefCell<Option<ThreadCtx>> = const { RefCell::new(None) };
}

struct SchedulerThread {
    spawn_tx: Mutex<Option<UnboundedSender<SpawnFn>>>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
}

struct SchedulerInner {
    threads: Vec<SchedulerThread>,
    next_actor_id: AtomicU64,
    round_robin: AtomicUsize,
    state: Mutex<SchedulerState>,
    stopped_cond: Condvar,
}

/// The collection of OS threads running actor event loops.
///
/// # Examples
///
/// ```rust,ignore
/// use tgsys_actor::{Scheduler, SchedulerConfig};
///
/// let scheduler = Scheduler::new(SchedulerConfig::default())?;
/// let worker = scheduler.create_actor("worker", MyActor::default());
/// worker.send_closure(|actor, _ctx| actor.step());
/// scheduler.finish();
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Start a scheduler with `config.n_workers + 1` threads.
    pub fn new(config: SchedulerConfig) -> Result<Self, ActorError> {
        let thread_count = config.n_workers + 1;
        let mut threads = Vec::with_capacity(thread_count);
        for scheduler_id in 0..thread_count {
            let (spawn_tx, spawn_rx) = mpsc::unbounded_channel();
            let join = thread::Builder::new()
                .name(format!("{}-{scheduler_id}", config.thread_name_prefix))
                .spawn(move || thread_main(scheduler_id, spawn_rx))?;
            threads.push(SchedulerThread {
                spawn_tx: Mutex::new(Some(spawn_tx)),
                join: Mutex::new(Some(join)),
            });
        }
        Ok(Self {
            inner: Arc::new(SchedulerInner {
                threads,
                next_actor_id: AtomicU64::new(1),
                round_robin: AtomicUsize::new(0),
                state: Mutex::new(SchedulerState::Running),
                stopped_cond: Condvar::new(),
            }),
        })
    }

    /// Number of scheduler threads (workers plus main).
    pub fn thread_count(&self) -> usize {
        self.inner.threads.len()
    }

    /// Scheduler id of the calling thread, when it is a scheduler thread.
    pub fn current_scheduler_id() -> Option<usize> {
        THREAD_CTX.with(|ctx| ctx.borrow().as_ref().map(|t| t.scheduler_id))
    }

    /// Create an actor bound to the current thread when called from a
    /// scheduler thread, else place it round-robin on a worker thread.
    pub fn create_actor<A: Actor>(&self, name: &str, actor: A) -> ActorOwn<A> {
        let scheduler_id =
            Self::current_scheduler_id().unwrap_or_else(|| self.next_worker_thread());
        self.create_actor_on_scheduler(name, scheduler_id, actor)
    }

    /// Create an actor bound to a specific scheduler thread.
    ///
    /// An invalid `scheduler_id` or a scheduler that is shutting down
    /// yields a dead handle: the actor never runs and posting through
    /// the handle is a silent no-op.
    pub fn create_actor_on_scheduler<A: Actor>(
        &self,
        name: &str,
        scheduler_id: usize,
        actor: A,
    ) -> ActorOwn<A> {
        let info = Arc::new(ActorInfo {
            id: self.inner.next_actor_id.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
            scheduler_id,
            created_at: Utc::now(),
        });
        let (tx, rx) = mpsc::unbounded_channel::<Signal<A>>();
        let own = ActorOwn::new(tx, Arc::clone(&info));

        let Some(target) = self.inner.threads.get(scheduler_id) else {
            tracing::warn!(
                scheduler_id,
                actor = %info,
                thread_count = self.inner.threads.len(),
                "invalid scheduler id, actor will never run"
            );
            return own;
        };

        let spawn: SpawnFn = Box::new(move || {
            let thread_ctx = THREAD_CTX.with(|ctx| ctx.borrow().clone());
            let Some(thread_ctx) = thread_ctx else {
                return;
            };
            thread_ctx.tasks.increment();
            tokio::task::spawn_local(run_actor(actor, rx, info, thread_ctx));
        });

        let sent = match target.spawn_tx.lock().as_ref() {
            Some(spawn_tx) => spawn_tx.send(spawn).is_ok(),
            None => false,
        };
        if !sent {
            tracing::warn!(actor = %own.info(), "scheduler is shutting down, actor dropped");
        }
        own
    }

    /// Initiate global shutdown: stop accepting actors, stop every actor
    /// (running `tear_down`), and join the scheduler threads.
    ///
    /// Idempotent. When called from a scheduler thread the join step is
    /// skipped; the threads exit on their own.
    pub fn finish(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state != SchedulerState::Running {
                return;
            }
            *state = SchedulerState::ShuttingDown;
        }

        for thread in &self.inner.threads {
            thread.spawn_tx.lock().take();
        }

        if Self::current_scheduler_id().is_none() {
            for thread in &self.inner.threads {
                let join = thread.join.lock().take();
                if let Some(join) = join {
                    if join.join().is_err() {
                        tracing::error!("scheduler thread panicked during shutdown");
                    }
                }
            }
        }

        let mut state = self.inner.state.lock();
        *state = SchedulerState::Stopped;
        self.inner.stopped_cond.notify_all();
    }

    /// Block the calling thread until the scheduler stops or `max_wait`
    /// elapses. Returns `true` once the scheduler has stopped.
    pub fn run_main(&self, max_wait: Duration) -> bool {
        let mut state = self.inner.state.lock();
        if *state == SchedulerState::Stopped {
            return true;
        }
        let _ = self.inner.stopped_cond.wait_for(&mut state, max_wait);
        *state == SchedulerState::Stopped
    }

    fn next_worker_thread(&self) -> usize {
        let count = self.inner.threads.len();
        if count == 1 {
            return 0;
        }
        1 + self.inner.round_robin.fetch_add(1, Ordering::Relaxed) % (count - 1)
    }
}

fn thread_main(scheduler_id: usize, mut spawn_rx: UnboundedReceiver<SpawnFn>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(scheduler_id, %err, "failed to build scheduler runtime");
            return;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = Arc::new(TaskCounter::new());
    THREAD_CTX.with(|ctx| {
        *ctx.borrow_mut() = Some(ThreadCtx {
            scheduler_id,
            shutdown: shutdown_rx,
            tasks: Arc::clone(&tasks),
        });
    });

    let local = LocalSet::new();
    local.block_on(&runtime, async move {
        while let Some(spawn) = spawn_rx.recv().await {
            spawn();
        }
        // Spawn channel closed: global shutdown. Signal every actor on
        // this thread, then wait for their tear_down to complete.
        let _ = shutdown_tx.send(true);
        tasks.wait_idle().await;
    });

    THREAD_CTX.with(|ctx| ctx.borrow_mut().take());
}

/// Run one hook or closure; a panic inside actor code is fatal to the
/// process.
fn dispatch<A: Actor>(
    actor: &mut A,
    ctx: &mut ActorContext,
    f: impl FnOnce(&mut A, &mut ActorContext),
) {
    let result = catch_unwind(AssertUnwindSafe(|| f(actor, ctx)));
    if result.is_err() {
        tracing::error!(actor = %ctx.info(), "panic in actor closure, aborting process");
        std::process::abort();
    }
}

async fn timer_wait(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

async fn run_actor<A: Actor>(
    mut actor: A,
    mut rx: UnboundedReceiver<Signal<A>>,
    info: Arc<ActorInfo>,
    thread_ctx: ThreadCtx,
) {
    let mut shutdown = thread_ctx.shutdown.clone();
    let mut ctx = ActorContext::new(info);
    ctx.set_state(ActorState::Running);
    dispatch(&mut actor, &mut ctx, |a, c| a.start_up(c));

    while !ctx.is_stop_requested() {
        if *shutdown.borrow() {
            ctx.stop();
            break;
        }
        if ctx.take_wakeup() {
            dispatch(&mut actor, &mut ctx, |a, c| a.wakeup(c));
            continue;
        }

        let deadline = ctx.pending_timeout();
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                ctx.stop();
            }
            _ = timer_wait(deadline) => {
                ctx.clear_timeout();
                dispatch(&mut actor, &mut ctx, |a, c| a.timeout_expired(c));
            }
            signal = rx.recv() => match signal {
                Some(Signal::Event(event)) => {
                    dispatch(&mut actor, &mut ctx, event);
                }
                Some(Signal::Stop) => ctx.stop(),
                Some(Signal::Hangup) => {
                    dispatch(&mut actor, &mut ctx, |a, c| a.hangup(c));
                }
                Some(Signal::HangupShared) => {
                    dispatch(&mut actor, &mut ctx, |a, c| a.hangup_shared(c));
                }
                None => {
                    // Every handle is gone; nothing can reach this actor
                    // again.
                    dispatch(&mut actor, &mut ctx, |a, c| a.hangup(c));
                    ctx.stop();
                }
            }
        }
    }

    ctx.set_state(ActorState::Stopped);
    dispatch(&mut actor, &mut ctx, |a, c| a.tear_down(c));
    rx.close();
    thread_ctx.tasks.decrement();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_scheduler_id_off_thread() {
        assert_eq!(Scheduler::current_scheduler_id(), None);
    }

    #[test]
    fn test_thread_count() {
        let config = SchedulerConfig {
            n_workers: 3,
            ..Default::default()
        };
        let scheduler = match Scheduler::new(config) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(%err, "scheduler start failed");
                return;
            }
        };
        assert_eq!(scheduler.thread_count(), 4);
        scheduler.finish();
    }

    #[test]
    fn test_finish_is_idempotent() {
        let scheduler = match Scheduler::new(SchedulerConfig::default()) {
            Ok(s) => s,
            Err(_) => return,
        };
        scheduler.finish();
        scheduler.finish();
        assert!(scheduler.run_main(Duration::from_millis(1)));
    }
}
