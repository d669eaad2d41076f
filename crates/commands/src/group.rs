use std::sync::Arc;

use shared::protocol::CommandView;

use crate::command::Command;

/// A named bundle of commands owned by one plugin.
///
/// Bundles may nest other bundles. `commands` flattens the whole tree for the
/// poller; `get_command` resolves a name for external callers, either a bare
/// command name searched depth-first or a dotted path such as
/// `replayer_commands.play_clip`.
pub trait Hittable: Send + Sync {
    /// Commands declared directly on this bundle.
    fn entries(&self) -> Vec<(&str, Arc<Command>)>;

    /// Bundles nested inside this one.
    fn nested(&self) -> Vec<(&str, Arc<dyn Hittable>)> {
        Vec::new()
    }

    fn commands(&self) -> Vec<Arc<Command>> {
        let mut commands: Vec<Arc<Command>> = self
            .entries()
            .into_iter()
            .map(|(_, command)| command)
            .collect();
        for (_, group) in self.nested() {
            for command in group.commands() {
                if !commands.iter().any(|known| Arc::ptr_eq(known, &command)) {
                    commands.push(command);
                }
            }
        }
        commands
    }

    fn get_command(&self, name: &str) -> Option<Arc<Command>> {
        if let Some((head, rest)) = name.split_once('.') {
            return self
                .nested()
                .into_iter()
                .find(|(group_name, _)| *group_name == head)
                .and_then(|(_, group)| group.get_command(rest));
        }

        if let Some((_, command)) = self
            .entries()
            .into_iter()
            .find(|(entry_name, _)| *entry_name == name)
        {
            return Some(command);
        }

        self.nested()
            .into_iter()
            .find_map(|(_, group)| group.get_command(name))
    }

    /// Flattened views, with nested entries prefixed by their bundle path.
    fn views(&self) -> Vec<CommandView> {
        let mut views: Vec<CommandView> = self
            .entries()
            .into_iter()
            .map(|(name, command)| command.view(name))
            .collect();
        for (group_name, group) in self.nested() {
            views.extend(group.views().into_iter().map(|mut view| {
                view.name = format!("{group_name}.{}", view.name);
                view
            }));
        }
        views
    }
}
