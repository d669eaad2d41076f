//! Physical input seam used by `Command::is_pressed`.

use std::{
    collections::HashSet,
    sync::{Arc, RwLock},
};

/// Answers "is this trigger currently held?" for a trigger identifier such as
/// a key or button name.
pub trait InputSource: Send + Sync {
    fn is_active(&self, trigger: &str) -> bool;
}

impl<T: InputSource + ?Sized> InputSource for Arc<T> {
    fn is_active(&self, trigger: &str) -> bool {
        (**self).is_active(trigger)
    }
}

/// Input source for environments without any bound device. Every trigger
/// reads as released.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputSource for NoInput {
    fn is_active(&self, _trigger: &str) -> bool {
        false
    }
}

/// Software key table fed by whatever front end captures key events
/// (a terminal reader, a UI bridge, a script). Trigger names are matched
/// case-insensitively.
#[derive(Debug, Default)]
pub struct KeyState {
    pressed: RwLock<HashSet<String>>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, trigger: &str) {
        self.set(trigger, true);
    }

    pub fn release(&self, trigger: &str) {
        self.set(trigger, false);
    }

    pub fn set(&self, trigger: &str, active: bool) {
        let key = trigger.to_ascii_lowercase();
        let mut pressed = match self.pressed.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if active {
            pressed.insert(key);
        } else {
            pressed.remove(&key);
        }
    }

    pub fn release_all(&self) {
        if let Ok(mut pressed) = self.pressed.write() {
            pressed.clear();
        }
    }
}

impl InputSource for KeyState {
    fn is_active(&self, trigger: &str) -> bool {
        self.pressed
            .read()
            .map(|pressed| pressed.contains(&trigger.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}
