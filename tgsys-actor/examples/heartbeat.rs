//! A periodic actor driven by its own timer.
//!
//! ```sh
//! cargo run --example heartbeat
//! ```

use std::time::Duration;

use tgsys_actor::{Actor, ActorContext, Scheduler, SchedulerConfig};

struct Heartbeat {
    beats_left: u32,
    interval: Duration,
}

impl Actor for Heartbeat {
    fn start_up(&mut self, ctx: &mut ActorContext) {
        println!("[{}] starting", ctx.info());
        ctx.set_timeout_in(self.interval);
    }

    fn timeout_expired(&mut self, ctx: &mut ActorContext) {
        self.beats_left -= 1;
        println!("[{}] beat, {} left", ctx.info(), self.beats_left);
        if self.beats_left == 0 {
            ctx.stop();
        } else {
            ctx.set_timeout_in(self.interval);
        }
    }

    fn tear_down(&mut self, ctx: &mut ActorContext) {
        println!("[{}] done", ctx.info());
    }
}

fn main() {
    let Ok(scheduler) = Scheduler::new(SchedulerConfig::default()) else {
        eprintln!("failed to start the scheduler");
        return;
    };

    let heartbeat = scheduler.create_actor(
        "heartbeat",
        Heartbeat {
            beats_left: 5,
            interval: Duration::from_millis(200),
        },
    );

    std::thread::sleep(Duration::from_millis(1500));
    drop(heartbeat);
    scheduler.finish();
}
