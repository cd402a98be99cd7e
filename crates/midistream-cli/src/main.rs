mod monitor;
mod producer;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use midistream_host::{config, HostConfig, QueueSink, StreamMultiplexer, SynthCommand};
use midistream_pipe::{LocalPipeHub, PipeId};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::producer::ProducerReport;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo(args) => execute_demo(args),
        Commands::Config(args) => execute_config(args),
    }
}

#[derive(Parser)]
#[command(author, version, about = "MIDI pipe streaming host")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the host against synthetic in-process producers.
    Demo(DemoArgs),
    /// Print the effective host configuration as JSON.
    Config(ConfigArgs),
}

#[derive(Args)]
struct DemoArgs {
    /// Number of pipes to stream, 1 to 4. Defaults to the configured count.
    #[arg(long)]
    channels: Option<usize>,
    /// Note on/off pairs each producer writes.
    #[arg(long, default_value_t = 2_000)]
    events: usize,
    /// Host configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Milliseconds between status lines.
    #[arg(long, default_value_t = 250)]
    status_interval_ms: u64,
    /// Print every event the sink receives.
    #[arg(long)]
    print_events: bool,
}

#[derive(Args)]
struct ConfigArgs {
    /// Configuration file to read instead of the default location.
    #[arg(long)]
    path: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<HostConfig> {
    match path {
        Some(path) => config::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => Ok(config::load_or_default()),
    }
}

fn execute_config(args: ConfigArgs) -> Result<()> {
    let config = load_config(args.path.as_ref())?;
    let json = serde_json::to_string_pretty(&config).context("failed to encode configuration")?;
    println!("{json}");
    Ok(())
}

fn execute_demo(args: DemoArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let channels = args.channels.unwrap_or(config.channel_count);
    let status_interval = Duration::from_millis(args.status_interval_ms.max(1));

    let hub = Arc::new(LocalPipeHub::new());
    let sink = Arc::new(QueueSink::new(config.sink_queue_capacity));
    let mut host = StreamMultiplexer::new(Arc::clone(&hub), config)?;
    let running = host
        .start(channels, sink.clone())
        .context("failed to start streams")?;
    for fault in host.take_faults() {
        warn!(%fault, "stream did not start");
    }

    let mut producers = Vec::with_capacity(running.len());
    for &pipe in &running {
        let writer = hub
            .producer(pipe)
            .with_context(|| format!("failed to attach producer to {pipe}"))?;
        let events = args.events;
        let handle = thread::Builder::new()
            .name(format!("producer-{pipe}"))
            .spawn(move || producer::play(writer, events))
            .with_context(|| format!("failed to spawn producer for {pipe}"))?;
        producers.push(handle);
    }
    info!(streams = running.len(), events = args.events, "demo running");

    let mut received = vec![0usize; running.len()];
    let mut commands = Vec::new();
    let mut next_status = Instant::now() + status_interval;
    let drain = |commands: &mut Vec<SynthCommand>, received: &mut [usize]| {
        for (slot, &pipe) in running.iter().enumerate() {
            commands.clear();
            received[slot] += sink.drain(pipe, commands);
            if args.print_events {
                for command in commands.iter() {
                    println!("{pipe}: {}", monitor::describe(command));
                }
            }
        }
    };
    let mut tick = |host: &mut StreamMultiplexer<Arc<LocalPipeHub>>| {
        for fault in host.take_faults() {
            warn!(%fault, "stream stopped");
        }
        if Instant::now() >= next_status {
            print_status(host);
            next_status += status_interval;
        }
        thread::sleep(Duration::from_millis(1));
    };

    while producers.iter().any(|handle| !handle.is_finished()) {
        drain(&mut commands, &mut received);
        tick(&mut host);
    }

    let mut sent = Vec::with_capacity(producers.len());
    for handle in producers {
        match handle.join() {
            Ok(report) => sent.push(report),
            Err(_) => {
                warn!("producer thread panicked");
                sent.push(ProducerReport::default());
            }
        }
    }

    // Wait for the workers to hand everything written to the sink.
    let deadline = Instant::now() + host.config().join_timeout();
    while Instant::now() < deadline && !caught_up(&mut host, &running, &sent, &received) {
        drain(&mut commands, &mut received);
        tick(&mut host);
    }
    drain(&mut commands, &mut received);
    print_status(&host);

    let report = host.stop_all();
    for ((pipe, produced), count) in running.iter().zip(&sent).zip(&received) {
        println!(
            "{pipe}: sent {} short and {} long events, sink received {count}",
            produced.short_events, produced.long_events
        );
    }
    println!(
        "stopped: {}; timed out: {}",
        list(&report.stopped),
        list(&report.timed_out)
    );
    for fault in &report.faults {
        println!("fault: {fault}");
    }
    Ok(())
}

fn caught_up(
    host: &mut StreamMultiplexer<Arc<LocalPipeHub>>,
    running: &[PipeId],
    sent: &[ProducerReport],
    received: &[usize],
) -> bool {
    running.iter().enumerate().all(|(slot, &pipe)| {
        if !host.is_running(pipe) {
            return true;
        }
        let Some(status) = host.stream_status(pipe) else {
            return true;
        };
        let expected = sent[slot].short_events + sent[slot].long_events;
        let handled = received[slot] + status.dispatch_errors as usize;
        handled >= expected
    })
}

fn print_status(host: &StreamMultiplexer<Arc<LocalPipeHub>>) {
    for snapshot in host.status() {
        println!("{}", monitor::status_line(&snapshot));
    }
}

fn list(pipes: &[PipeId]) -> String {
    if pipes.is_empty() {
        return "none".into();
    }
    pipes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
