//! Two actors on different scheduler threads bouncing a counter.
//!
//! ```sh
//! cargo run --example ping_pong
//! ```

use std::sync::mpsc;
use std::time::Instant;

use tgsys_actor::{Actor, ActorContext, ActorId, Scheduler, SchedulerConfig};

const ROUNDS: u32 = 100_000;

struct Ping {
    pong: Option<ActorId<Pong>>,
    remaining: u32,
    done: mpsc::Sender<()>,
}

struct Pong {
    ping: Option<ActorId<Ping>>,
}

impl Actor for Ping {}
impl Actor for Pong {}

fn ping_step(ping: &mut Ping, _ctx: &mut ActorContext) {
    if ping.remaining == 0 {
        let _ = ping.done.send(());
        return;
    }
    ping.remaining -= 1;
    if let Some(pong) = &ping.pong {
        pong.send_closure(pong_step);
    }
}

fn pong_step(pong: &mut Pong, _ctx: &mut ActorContext) {
    if let Some(ping) = &pong.ping {
        ping.send_closure(ping_step);
    }
}

fn main() {
    let Ok(scheduler) = Scheduler::new(SchedulerConfig::default()) else {
        eprintln!("failed to start the scheduler");
        return;
    };

    let (done_tx, done_rx) = mpsc::channel();
    let ping = scheduler.create_actor_on_scheduler(
        "ping",
        1,
        Ping {
            pong: None,
            remaining: ROUNDS,
            done: done_tx,
        },
    );
    let pong = scheduler.create_actor_on_scheduler("pong", 2, Pong { ping: None });

    let ping_id = ping.id();
    let pong_id = pong.id();
    pong.send_closure(move |pong, _ctx| pong.ping = Some(ping_id));
    ping.send_closure(move |ping, ctx| {
        ping.pong = Some(pong_id);
        ping_step(ping, ctx);
    });

    let started = Instant::now();
    let _ = done_rx.recv();
    let elapsed = started.elapsed();
    println!(
        "{ROUNDS} round trips in {elapsed:?} ({:.0} msgs/sec)",
        f64::from(ROUNDS * 2) / elapsed.as_secs_f64()
    );

    drop(ping);
    drop(pong);
    scheduler.finish();
}
