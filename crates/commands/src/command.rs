use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError, RwLock, Weak,
};

use anyhow::Result;
use shared::protocol::CommandView;

use crate::{input::InputSource, keys::MODIFIER_KEY};

pub type Target = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// One user-triggerable action.
///
/// `is_pressed` is edge-triggered: it reports `true` once per press-release
/// cycle of the physical trigger. While a command is active it blocks the
/// commands registered with [`Command::add_to_blocked`] until
/// [`Command::unblock_all`] is called by the owning plugin.
///
/// Edge state starts as "held", so a key that is already down when polling
/// begins has to be released once before it can fire.
pub struct Command {
    trigger: String,
    priority: i32,
    suppress_modifier: Option<String>,
    being_pressed: AtomicBool,
    blocked: AtomicBool,
    target: RwLock<Target>,
    blocked_commands: Mutex<Vec<Weak<Command>>>,
}

impl Command {
    pub fn new(trigger: impl Into<String>, priority: i32) -> Self {
        Self {
            trigger: trigger.into(),
            priority,
            suppress_modifier: Some(MODIFIER_KEY.to_string()),
            being_pressed: AtomicBool::new(true),
            blocked: AtomicBool::new(false),
            target: RwLock::new(Arc::new(|| Ok(()))),
            blocked_commands: Mutex::new(Vec::new()),
        }
    }

    pub fn with_suppressed_modifier(mut self, modifier: Option<&str>) -> Self {
        self.suppress_modifier = modifier.map(str::to_string);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire)
    }

    pub fn set_target<F>(&self, target: F)
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let mut slot = self.target.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(target);
    }

    /// Runs the target. The lock is released before the call so a target may
    /// block (a pause spin, an interactive choice) without stalling
    /// `set_target`.
    pub fn fire(&self) -> Result<()> {
        let target = self
            .target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        target()
    }

    /// Registers commands that this one blocks while it is active. Only weak
    /// references are kept; commands commonly block each other.
    pub fn add_to_blocked(&self, commands: &[&Arc<Command>]) {
        let mut blocked = self
            .blocked_commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        blocked.extend(commands.iter().map(|command| Arc::downgrade(command)));
    }

    pub fn blocks(&self, other: &Arc<Command>) -> bool {
        self.blocked_commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|weak| weak.as_ptr() == Arc::as_ptr(other))
    }

    pub fn is_pressed(&self, input: &dyn InputSource) -> bool {
        let active = input.is_active(&self.trigger) && !self.modifier_held(input);

        if self.is_blocked() {
            // Keep following the physical trigger so a key held through the
            // block does not fire the moment the block is lifted.
            self.being_pressed.store(active, Ordering::Release);
            return false;
        }

        let was_pressed = self.being_pressed.swap(active, Ordering::AcqRel);
        if active && !was_pressed {
            self.set_blocked_commands(true);
            return true;
        }
        false
    }

    pub fn unblock_all(&self) {
        self.set_blocked_commands(false);
    }

    pub fn view(&self, name: &str) -> CommandView {
        CommandView {
            name: name.to_string(),
            trigger: self.trigger.clone(),
            priority: self.priority,
            blocked: self.is_blocked(),
        }
    }

    fn modifier_held(&self, input: &dyn InputSource) -> bool {
        self.suppress_modifier
            .as_deref()
            .is_some_and(|modifier| input.is_active(modifier))
    }

    fn set_blocked_commands(&self, blocked: bool) {
        let commands = self
            .blocked_commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for command in commands.iter().filter_map(Weak::upgrade) {
            command.blocked.store(blocked, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("trigger", &self.trigger)
            .field("priority", &self.priority)
            .field("blocked", &self.is_blocked())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tests/command_tests.rs"]
mod tests;
