//! procmon - run a command under a process monitor
//!
//! Prints every lifecycle event (start, output chunks, finish) as it is
//! observed and exits with the child's exit code.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use process_monitor::{
    Command, EventKind, LaunchOutcome, Pipe, PollConfig, ProcessEvent, ProcessHandle,
    ProcessSpec, Trigger,
};
use std::path::PathBuf;
use tracing::{Level, debug};

#[derive(Parser, Debug)]
#[command(name = "procmon")]
#[command(about = "Run a command in the background and report its output as events")]
#[command(version)]
struct Cli {
    /// Poll configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Treat the command as a single shell line
    #[arg(short, long)]
    shell: bool,

    /// Write stdout to this file instead of reading it back
    #[arg(long, value_name = "PATH")]
    stdout_file: Option<PathBuf>,

    /// Write stderr to this file instead of reading it back
    #[arg(long, value_name = "PATH")]
    stderr_file: Option<PathBuf>,

    /// Truncate redirect files instead of appending
    #[arg(long)]
    truncate: bool,

    /// Only drain this stream
    #[arg(long, value_enum)]
    only: Option<Stream>,

    /// Readiness wait per stream, overriding the config file
    #[arg(long, value_name = "MS")]
    readiness_timeout_ms: Option<u64>,

    /// Output format for events
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// The command to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Stream {
    Stdout,
    Stderr,
}

impl From<Stream> for Pipe {
    fn from(stream: Stream) -> Self {
        match stream {
            Stream::Stdout => Pipe::Stdout,
            Stream::Stderr => Pipe::Stderr,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = smol::block_on(run(cli))?;
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;
    let spec = build_spec(&cli);
    debug!(?config, command = %spec.command().display(), "starting");

    let mut handle = ProcessHandle::with_config(spec, config).context("Invalid command")?;
    let format = cli.format;
    handle.on(Trigger::All, move |event: &ProcessEvent| print_event(event, format));

    let outcome = handle
        .launch(true)
        .await
        .with_context(|| format!("Failed to launch {}", cli.command.join(" ")))?;

    match outcome {
        LaunchOutcome::Exited(code) => Ok(code),
        LaunchOutcome::InProgress | LaunchOutcome::Cancelled => {
            anyhow::bail!("process did not run to completion")
        }
    }
}

fn load_config(cli: &Cli) -> Result<PollConfig> {
    let mut config = match &cli.config {
        Some(path) => PollConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PollConfig::default(),
    };
    if let Some(ms) = cli.readiness_timeout_ms {
        config.readiness_timeout_ms = ms;
    }
    config.validate().context("Invalid poll configuration")?;
    Ok(config)
}

fn build_spec(cli: &Cli) -> ProcessSpec {
    let mut spec = if cli.shell {
        ProcessSpec::shell(cli.command.join(" "))
    } else {
        let mut cmd = Command::new(&cli.command[0]);
        cmd.args(&cli.command[1..]);
        ProcessSpec::new(cmd)
    };

    if let Some(only) = cli.only {
        spec = spec.drain([Pipe::from(only)]);
    }
    let append = !cli.truncate;
    if let Some(path) = &cli.stdout_file {
        spec = spec.redirect(Pipe::Stdout, path, append);
    }
    if let Some(path) = &cli.stderr_file {
        spec = spec.redirect(Pipe::Stderr, path, append);
    }
    spec
}

fn print_event(event: &ProcessEvent, format: Format) {
    match format {
        Format::Json => match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
        },
        Format::Text => {
            for line in render_text(event) {
                println!("{line}");
            }
        }
    }
}

fn render_text(event: &ProcessEvent) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(payload) = &event.payload {
        for (pipe, output) in payload.iter() {
            // Chunks are cut at a fixed size, not at line ends
            let text = output.buffer.concat();
            for line in text.lines() {
                lines.push(format!("[{pipe}] {line}"));
            }
        }
    }
    match event.kind {
        EventKind::Start => lines.insert(0, "-- start".to_string()),
        EventKind::Finished => lines.push("-- finished".to_string()),
        EventKind::Running => {}
    }
    lines
}
