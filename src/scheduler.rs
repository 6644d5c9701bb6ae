use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::result::Result;

/// Run a job now, then again every `interval`, checking every `poll` tick.
///
/// The interval counts from the end of the previous run. A job error stops
/// the loop and is returned.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
    poll: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration, poll: Duration) -> Self {
        Self { interval, poll }
    }

    /// Never returns unless the job fails
    pub fn run_forever<F>(&self, job: F) -> Result<()>
    where
        F: FnMut() -> Result<()>,
    {
        self.run_while(job, || true)
    }

    /// Same as [`Scheduler::run_forever`], but `keep_going` is asked
    /// before every tick whether to continue.
    pub fn run_while<F, C>(&self, mut job: F, mut keep_going: C) -> Result<()>
    where
        F: FnMut() -> Result<()>,
        C: FnMut() -> bool,
    {
        job()?;
        let mut last_run = Instant::now();
        info!("Next cycle in {}", human_duration(self.interval));

        while keep_going() {
            std::thread::sleep(self.poll);

            if self.is_due(last_run, Instant::now()) {
                debug!("Cycle due");
                job()?;
                last_run = Instant::now();
                info!("Next cycle in {}", human_duration(self.interval));
            }
        }

        Ok(())
    }

    fn is_due(&self, last_run: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_run) >= self.interval
    }
}

fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, secs % 3600 / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m{s:02}s"),
        (h, m, _) => format!("{h}h{m:02}m"),
    }
}
