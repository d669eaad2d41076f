mod config;
mod demo;
mod key_script;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::input::{InputSource, KeyState};
use harness_core::{
    run, EnvironmentControl, Handle, HarvestableEnv, Policy, RunOptions, UiDispatcher,
};
use plugins::{
    clips::{read_clips, ClipManager, LatestClip},
    ActionHarvester, ForceInstructor, KeyboardControls, LivePlaying, RewardHarvester,
    RewardLogger,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::Settings,
    demo::{ChaseBall, ChaseSimulation},
    key_script::{KeyPress, KeyScript},
};

#[derive(Parser)]
#[command(name = "harness", about = "Plugin harness for reinforcement-learning environments")]
struct Cli {
    /// Settings file; defaults to ./harness.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the built-in chase simulation with the stock plugins attached.
    Run {
        /// Stop after this many steps instead of running until closed.
        #[arg(long)]
        steps: Option<u64>,
        #[arg(long)]
        tick_skip: Option<u32>,
        /// State setter for the first reset.
        #[arg(long)]
        setter: Option<String>,
        #[arg(long, default_value_t = 0)]
        setter_index: usize,
        /// Scripted key press as STEP:KEY. Repeatable.
        #[arg(long = "press")]
        presses: Vec<KeyPress>,
        /// Print every plugin's view as JSON before closing.
        #[arg(long)]
        dump_views: bool,
    },
    /// Inspect the clip file.
    Clips {
        #[command(subcommand)]
        command: ClipsCommand,
    },
    /// Print the resolved key for every command.
    Keys,
}

#[derive(Subcommand)]
enum ClipsCommand {
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load_settings(cli.config.as_deref())?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.log_filter)
            .with_context(|| format!("invalid log filter '{}'", settings.log_filter))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Run {
            steps,
            tick_skip,
            setter,
            setter_index,
            presses,
            dump_views,
        } => {
            let options = RunOptions {
                n_steps: steps,
                agent_tick_skip: tick_skip.unwrap_or(settings.agent_tick_skip),
            };
            let setter = setter.map(|name| (name, setter_index));
            run_demo(&settings, options, setter, presses, dump_views)?;
        }
        Command::Clips {
            command: ClipsCommand::List,
        } => {
            let clips = read_clips(&settings.clips.clip_path)?;
            if clips.is_empty() {
                println!("no clips in {}", settings.clips.clip_path.display());
            }
            for (index, clip) in clips.iter().enumerate() {
                println!("{index} - {} ({} steps)", clip.name, clip.len());
            }
        }
        Command::Keys => {
            for (command, key) in settings.key_bindings().resolved() {
                println!("{command:<18} {key}");
            }
        }
    }

    Ok(())
}

fn run_demo(
    settings: &Settings,
    options: RunOptions,
    setter: Option<(String, usize)>,
    presses: Vec<KeyPress>,
    dump_views: bool,
) -> Result<()> {
    let bindings = settings.key_bindings();
    let keys = Arc::new(KeyState::new());
    let poll_interval = Duration::from_millis(settings.poll_interval_ms.max(1));

    let clips = ClipManager::new(&settings.clips, &bindings, Box::new(LatestClip))
        .context("failed to open the clip library")?;
    let rewards = harness_core::shared(RewardHarvester::new());
    let live = LivePlaying::new(
        Box::new(KeyboardControls::new(keys.clone())),
        settings.deadzone,
        &bindings,
    );
    let script = KeyScript::new(keys.clone(), presses, poll_interval * 3);
    let policy: Arc<dyn Policy> = Arc::new(ChaseBall);

    let simulation = ChaseSimulation::new(settings.episode_steps)
        .with_step_delay(Duration::from_millis(settings.step_delay_ms));
    let mut builder = HarvestableEnv::builder(simulation)
        .callback(Handle::new(ForceInstructor::with_bindings(&bindings)))
        .callback(Handle::new(clips))
        .callback(Handle::callback(rewards.clone()))
        .callback(Handle::new(ActionHarvester::new()))
        .callback(Handle::new(live))
        .callback(Handle::new(script));
    if settings.reward_log_every > 0 {
        builder = builder.callback(Handle::new(RewardLogger::new(settings.reward_log_every)));
    }
    let mut env = builder
        .input(keys as Arc<dyn InputSource>)
        .poll_interval(poll_interval)
        .bindings(bindings)
        .agent(policy.clone())
        .build()?;

    if let Some((name, index)) = setter {
        env.control().update_state_setter(&name, index);
    }
    for link in env.distributor().links() {
        info!(%link, "wired");
    }

    let summary = run(&mut env, policy.as_ref(), &options)?;
    println!("ran {} steps over {} episodes", summary.steps, summary.episodes);
    if let Ok(rewards) = rewards.lock() {
        for (agent, mean) in rewards.current_episode_mean() {
            println!("{agent}: mean reward {mean:.3} this episode");
        }
    }

    if dump_views {
        let views = UiDispatcher::new(env.callbacks().to_vec()).views();
        println!("{}", serde_json::to_string_pretty(&views)?);
    }

    env.close()?;
    Ok(())
}
