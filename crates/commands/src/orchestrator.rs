//! Background command detection.

use std::{
    cmp::Reverse,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, error, info};

use crate::{command::Command, input::InputSource};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Orders commands for polling: highest priority first, registration order
/// among equal priorities.
pub fn sort_by_priority(mut commands: Vec<Arc<Command>>) -> Vec<Arc<Command>> {
    commands.sort_by_key(|command| Reverse(command.priority()));
    commands
}

/// One detection pass over already sorted commands. Fires the target of every
/// newly pressed command and returns their triggers in firing order.
///
/// A failing or panicking target is logged and skipped; the remaining
/// commands are still polled.
pub fn poll_once(commands: &[Arc<Command>], input: &dyn InputSource) -> Vec<String> {
    let mut fired = Vec::new();
    for command in commands {
        if !command.is_pressed(input) {
            continue;
        }
        let trigger = command.trigger();
        debug!(trigger, priority = command.priority(), "command pressed");
        match panic::catch_unwind(AssertUnwindSafe(|| command.fire())) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => error!(trigger, %error, "command target failed"),
            Err(_) => error!(trigger, "command target panicked"),
        }
        fired.push(trigger.to_string());
    }
    fired
}

/// Owns the polling thread. Stopping is cooperative: the loop notices the
/// cleared flag after its current sleep.
pub struct Orchestrator {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    command_count: usize,
}

impl Orchestrator {
    pub fn start(
        commands: Vec<Arc<Command>>,
        input: Arc<dyn InputSource>,
        poll_interval: Duration,
    ) -> io::Result<Self> {
        let commands = sort_by_priority(commands);
        let command_count = commands.len();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = thread::Builder::new()
            .name("command-orchestrator".into())
            .spawn(move || {
                info!(commands = commands.len(), "command detection started");
                while flag.load(Ordering::Acquire) {
                    poll_once(&commands, input.as_ref());
                    thread::sleep(poll_interval);
                }
                debug!("command detection stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
            command_count,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn command_count(&self) -> usize {
        self.command_count
    }

    /// Clears the running flag and waits for the loop to exit. A target that
    /// never returns keeps this waiting.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("command detection thread panicked");
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Detach instead of joining; a blocked target must not hang drop.
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
