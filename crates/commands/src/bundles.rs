//! Command bundles owned by the stock plugins.

use std::sync::Arc;

use crate::{
    command::Command,
    group::Hittable,
    keys::{KeyBindings, DEFAULT_PRIORITY},
};

fn bound(bindings: &KeyBindings, name: &str) -> Arc<Command> {
    Command::new(bindings.key(name), DEFAULT_PRIORITY).shared()
}

/// Operator overrides: end the episode, close the environment, pause stepping.
pub struct ForceCommands {
    pub reset: Arc<Command>,
    pub close: Arc<Command>,
    pub pause: Arc<Command>,
}

impl ForceCommands {
    pub fn new(bindings: &KeyBindings) -> Self {
        Self {
            reset: bound(bindings, "reset"),
            close: bound(bindings, "close"),
            pause: bound(bindings, "pause"),
        }
    }
}

impl Default for ForceCommands {
    fn default() -> Self {
        Self::new(&KeyBindings::default())
    }
}

impl Hittable for ForceCommands {
    fn entries(&self) -> Vec<(&str, Arc<Command>)> {
        vec![
            ("reset", self.reset.clone()),
            ("close", self.close.clone()),
            ("pause", self.pause.clone()),
        ]
    }
}

pub struct StateActionClipperCommands {
    pub clip: Arc<Command>,
}

impl StateActionClipperCommands {
    pub fn new(bindings: &KeyBindings) -> Self {
        Self {
            clip: bound(bindings, "clip"),
        }
    }
}

impl Default for StateActionClipperCommands {
    fn default() -> Self {
        Self::new(&KeyBindings::default())
    }
}

impl Hittable for StateActionClipperCommands {
    fn entries(&self) -> Vec<(&str, Arc<Command>)> {
        vec![("clip", self.clip.clone())]
    }
}

pub struct StateActionReplayerCommands {
    pub play_clip: Arc<Command>,
    pub stop_clip: Arc<Command>,
}

impl StateActionReplayerCommands {
    pub fn new(bindings: &KeyBindings) -> Self {
        Self {
            play_clip: bound(bindings, "play_clip"),
            stop_clip: bound(bindings, "stop_clip"),
        }
    }
}

impl Default for StateActionReplayerCommands {
    fn default() -> Self {
        Self::new(&KeyBindings::default())
    }
}

impl Hittable for StateActionReplayerCommands {
    fn entries(&self) -> Vec<(&str, Arc<Command>)> {
        vec![
            ("play_clip", self.play_clip.clone()),
            ("stop_clip", self.stop_clip.clone()),
        ]
    }
}

pub struct ClipRecorderCommands {
    pub toggle_recording: Arc<Command>,
}

impl ClipRecorderCommands {
    pub fn new(bindings: &KeyBindings) -> Self {
        Self {
            toggle_recording: bound(bindings, "toggle_recording"),
        }
    }
}

impl Default for ClipRecorderCommands {
    fn default() -> Self {
        Self::new(&KeyBindings::default())
    }
}

impl Hittable for ClipRecorderCommands {
    fn entries(&self) -> Vec<(&str, Arc<Command>)> {
        vec![("toggle_recording", self.toggle_recording.clone())]
    }
}

/// Commands of the clip manager and of the three clip plugins it owns.
///
/// Clipping blocks replaying and the library commands until the clip is
/// written; replaying blocks clipping until the clip ends.
pub struct ClipManagerCommands {
    pub clipper_commands: Arc<StateActionClipperCommands>,
    pub replayer_commands: Arc<StateActionReplayerCommands>,
    pub recorder_commands: Arc<ClipRecorderCommands>,
    pub unload_clips: Arc<Command>,
    pub load_clips: Arc<Command>,
    pub save_clips: Arc<Command>,
}

impl ClipManagerCommands {
    pub fn new(bindings: &KeyBindings) -> Self {
        let commands = Self {
            clipper_commands: Arc::new(StateActionClipperCommands::new(bindings)),
            replayer_commands: Arc::new(StateActionReplayerCommands::new(bindings)),
            recorder_commands: Arc::new(ClipRecorderCommands::new(bindings)),
            unload_clips: bound(bindings, "unload_clips"),
            load_clips: bound(bindings, "load_clips"),
            save_clips: bound(bindings, "save_clips"),
        };

        commands.clipper_commands.clip.add_to_blocked(&[
            &commands.replayer_commands.play_clip,
            &commands.unload_clips,
            &commands.save_clips,
            &commands.load_clips,
        ]);
        commands
            .replayer_commands
            .play_clip
            .add_to_blocked(&[&commands.clipper_commands.clip]);
        commands
    }
}

impl Default for ClipManagerCommands {
    fn default() -> Self {
        Self::new(&KeyBindings::default())
    }
}

impl Hittable for ClipManagerCommands {
    fn entries(&self) -> Vec<(&str, Arc<Command>)> {
        vec![
            ("unload_clips", self.unload_clips.clone()),
            ("load_clips", self.load_clips.clone()),
            ("save_clips", self.save_clips.clone()),
        ]
    }

    fn nested(&self) -> Vec<(&str, Arc<dyn Hittable>)> {
        vec![
            ("clipper_commands", self.clipper_commands.clone() as Arc<dyn Hittable>),
            ("replayer_commands", self.replayer_commands.clone() as Arc<dyn Hittable>),
            ("recorder_commands", self.recorder_commands.clone() as Arc<dyn Hittable>),
        ]
    }
}

pub struct LivePlayingCommands {
    pub activate: Arc<Command>,
}

impl LivePlayingCommands {
    pub fn new(bindings: &KeyBindings) -> Self {
        Self {
            activate: bound(bindings, "activate"),
        }
    }
}

impl Default for LivePlayingCommands {
    fn default() -> Self {
        Self::new(&KeyBindings::default())
    }
}

impl Hittable for LivePlayingCommands {
    fn entries(&self) -> Vec<(&str, Arc<Command>)> {
        vec![("activate", self.activate.clone())]
    }
}

/// Union of the command bundles of a composite's children, in child order.
#[derive(Default)]
pub struct MultiCallbackCommands {
    groups: Vec<(String, Arc<dyn Hittable>)>,
}

impl MultiCallbackCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_commands(&mut self, name: impl Into<String>, group: Arc<dyn Hittable>) {
        self.groups.push((name.into(), group));
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Hittable for MultiCallbackCommands {
    fn entries(&self) -> Vec<(&str, Arc<Command>)> {
        Vec::new()
    }

    fn nested(&self) -> Vec<(&str, Arc<dyn Hittable>)> {
        self.groups
            .iter()
            .map(|(name, group)| (name.as_str(), group.clone()))
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/bundles_tests.rs"]
mod tests;
