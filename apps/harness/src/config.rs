use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

use anyhow::Context;
use commands::keys::KeyBindings;
use plugins::clips::ClipManagerConfig;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "harness.toml";
const ENV_PREFIX: &str = "HARNESS__";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poll_interval_ms: u64,
    pub log_filter: String,
    pub episode_steps: u64,
    pub step_delay_ms: u64,
    pub agent_tick_skip: u32,
    pub deadzone: f32,
    /// Steps between reward summaries in the log. Zero turns them off.
    pub reward_log_every: u64,
    pub clips: ClipManagerConfig,
    /// Command name to key overrides.
    pub keys: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            log_filter: "info".into(),
            episode_steps: 200,
            step_delay_ms: 0,
            agent_tick_skip: 1,
            deadzone: 0.1,
            reward_log_every: 50,
            clips: ClipManagerConfig::default(),
            keys: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn key_bindings(&self) -> KeyBindings {
        self.keys
            .iter()
            .fold(KeyBindings::new(), |bindings, (command, key)| {
                bindings.with_override(command.as_str(), key.as_str())
            })
    }
}

/// Defaults, then the TOML file, then `HARNESS__*` environment variables.
/// An explicitly named file must exist; the default one is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(path) => read_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_file(default_path)?
            } else {
                Settings::default()
            }
        }
    };
    apply_env_overrides(&mut settings, std::env::vars())?;
    Ok(settings)
}

fn read_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid config file '{}'", path.display()))
}

pub fn apply_env_overrides(
    settings: &mut Settings,
    vars: impl IntoIterator<Item = (String, String)>,
) -> anyhow::Result<()> {
    for (name, value) in vars {
        let Some(key) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key = key.to_ascii_lowercase();
        if let Some(command) = key.strip_prefix("keys__") {
            settings.keys.insert(command.to_string(), value);
            continue;
        }
        match key.as_str() {
            "poll_interval_ms" => settings.poll_interval_ms = parse(&name, &value)?,
            "log_filter" => settings.log_filter = value,
            "clips__clip_path" => settings.clips.clip_path = value.into(),
            "clips__legend_path" => settings.clips.legend_path = value.into(),
            "clips__n_steps_saved" => settings.clips.n_steps_saved = parse(&name, &value)?,
            "clips__wait_for_selection" => {
                settings.clips.wait_for_selection = parse(&name, &value)?
            }
            "episode_steps" => settings.episode_steps = parse(&name, &value)?,
            "step_delay_ms" => settings.step_delay_ms = parse(&name, &value)?,
            "agent_tick_skip" => settings.agent_tick_skip = parse(&name, &value)?,
            "deadzone" => settings.deadzone = parse(&name, &value)?,
            "reward_log_every" => settings.reward_log_every = parse(&name, &value)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse<T>(name: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value '{value}' for {name}"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
