use crate::actions::Action;
use crate::config::load_config;
use crate::layout::compute_layout;
use crate::runtime::{CommandRuntime, parse_snapshot};
use crate::scene_dump::write_scene_dump;
use crate::text_metrics::{FallbackMeasurer, FontMeasurer, TextMeasure};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mmed", version, about = "Mind map editor core: replay actions and lay out documents")]
pub struct Args {
    /// Document file (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Actions to replay, a single `{type, params}` object or an array of them
    #[arg(short = 'a', long = "actions")]
    pub actions: Option<PathBuf>,

    /// Editor config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Node id whose subtree is hidden from the layout (repeatable)
    #[arg(long = "collapse")]
    pub collapse: Vec<String>,

    /// What to write
    #[arg(short = 'e', long = "emit", value_enum, default_value = "document")]
    pub emit: Emit,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Measure text with the built-in width table instead of system fonts
    #[arg(long = "fastText")]
    pub fast_text: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Document,
    Layout,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ActionScript {
    One(Action),
    Many(Vec<Action>),
}

impl ActionScript {
    fn into_actions(self) -> Vec<Action> {
        match self {
            ActionScript::One(action) => vec![action],
            ActionScript::Many(actions) => actions,
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    execute(&args)
}

fn init_tracing() {
    // A second install (e.g. when embedded) is harmless; keep the first.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

pub fn execute(args: &Args) -> Result<()> {
    let config = load_config(args.config.as_deref())
        .with_context(|| format!("failed to load config {:?}", args.config))?;

    let input = read_input(args.input.as_deref())?;
    let document = parse_snapshot(&input).context("failed to read document")?;
    let runtime = CommandRuntime::with_builtin_actions(document, &config.runtime);

    if let Some(path) = args.actions.as_deref() {
        let actions = read_actions(path)?;
        tracing::info!(count = actions.len(), "replaying actions");
        for action in actions {
            let action_type = action.action_type.clone();
            futures::executor::block_on(runtime.dispatch(action))
                .with_context(|| format!("action `{action_type}` failed"))?;
        }
    }

    match args.emit {
        Emit::Document => {
            let mut text = runtime.export_snapshot_pretty()?;
            text.push('\n');
            write_output(&text, args.output.as_deref())?;
        }
        Emit::Layout => {
            let collapsed: HashSet<String> = args.collapse.iter().cloned().collect();
            let measurer: &dyn TextMeasure = if args.fast_text {
                &FallbackMeasurer
            } else {
                &FontMeasurer
            };
            let scene = compute_layout(
                &runtime.get_state(),
                &config.layout,
                &config.font,
                measurer,
                &collapsed,
            );
            write_scene_dump(args.output.as_deref(), &scene, config.layout.curvature)?;
        }
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn read_actions(path: &Path) -> Result<Vec<Action>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_actions(&contents)
}

fn parse_actions(contents: &str) -> Result<Vec<Action>> {
    let script: ActionScript = serde_json::from_str(contents).context("invalid action script")?;
    Ok(script.into_actions())
}

fn write_output(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, text)?,
        None => io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}
