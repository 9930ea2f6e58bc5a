//! framelink-host - serve or inspect a framelink serial link
//!
//! ```text
//! framelink-host [--config PATH] [--log-level LEVEL] listen [--port PATH] [--duration-secs N] [--stty]
//! framelink-host [--config PATH] request COMMAND [DATA] [--port PATH]
//! framelink-host [--config PATH] decode FILE [--hex]
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use framelink_core::{Link, LinkConfig};
use framelink_host::config::{self, LoadedConfig};
use framelink_host::listen::{self, Deadline, RETRY_DELAY};
use framelink_host::port::{self, StdPort};
use framelink_host::replay::{self, describe, hex, parse_hex};
use framelink_host::responder::{self, Traced};
use framelink_host::RX_BUFFER_SIZE;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "framelink-host",
    version,
    about = "Serve or inspect a header/tail framed serial link"
)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer GYJ-0122 units on a serial port
    Listen {
        /// Device path, overriding the configuration
        #[arg(long)]
        port: Option<String>,
        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Apply the configured line settings with stty first
        #[arg(long)]
        stty: bool,
    },
    /// Send one frame and print the first frame received back
    Request {
        /// Command bytes, in hex
        command: String,
        /// Data bytes, in hex
        #[arg(default_value = "")]
        data: String,
        /// Device path, overriding the configuration
        #[arg(long)]
        port: Option<String>,
    },
    /// Decode a captured byte stream offline
    Decode {
        /// Capture file
        capture: PathBuf,
        /// Capture is text hex rather than raw bytes
        #[arg(long)]
        hex: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut loaded = config::load_or_default(cli.config.as_deref()).context("load configuration")?;

    match cli.command {
        Command::Listen {
            port,
            duration_secs,
            stty,
        } => {
            override_port(&mut loaded.config, port)?;
            run_listen(loaded, Deadline::from_secs(duration_secs), stty)
        }
        Command::Request {
            command,
            data,
            port,
        } => {
            override_port(&mut loaded.config, port)?;
            let command = parse_hex(&command).context("parse command")?;
            let data = parse_hex(&data).context("parse data")?;
            run_request(loaded, &command, &data)
        }
        Command::Decode {
            capture,
            hex: is_hex,
        } => run_decode(&loaded, capture, is_hex),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn override_port(config: &mut LinkConfig, port: Option<String>) -> Result<()> {
    if let Some(port) = port {
        config.serial.path.clear();
        config
            .serial
            .path
            .push_str(&port)
            .map_err(|_| anyhow!("device path too long: {port}"))?;
    }
    Ok(())
}

fn open_port(loaded: &LoadedConfig, stty: bool) -> Result<StdPort<fs::File>> {
    let serial = &loaded.config.serial;
    if stty {
        port::apply_line_settings(serial).context("apply line settings")?;
    } else {
        info!(
            "line settings are not applied; run `stty {}` or pass --stty",
            port::stty_args(serial).join(" ")
        );
    }
    StdPort::open(serial).with_context(|| format!("open {}", serial.path.as_str()))
}

fn run_listen(loaded: LoadedConfig, deadline: Deadline, stty: bool) -> Result<()> {
    let port = open_port(&loaded, stty)?;
    let table = responder::command_table().map_err(|e| anyhow!("build command table: {e}"))?;
    let mut link: Link<_, _, RX_BUFFER_SIZE> = Link::new(
        port,
        loaded.spec,
        Traced::new(table),
        loaded.sequence,
        &loaded.config.link,
    )
    .map_err(|e| anyhow!("create link: {e}"))?;

    info!("listening");
    let stats = listen::serve(&mut link, &deadline, RETRY_DELAY).map_err(|e| anyhow!("{e}"))?;
    let tally = link.dispatcher().inner().state();
    info!(
        bytes = stats.bytes_received,
        packets = stats.packets,
        discarded = stats.discarded,
        replies = stats.replies_sent,
        transport_errors = stats.transport_errors,
        help_signals = tally.help_signals,
        unknown = tally.unknown,
        "stopped"
    );
    Ok(())
}

fn run_request(loaded: LoadedConfig, command: &[u8], data: &[u8]) -> Result<()> {
    let port = open_port(&loaded, false)?;
    let table = responder::command_table().map_err(|e| anyhow!("build command table: {e}"))?;
    let attempts = loaded.config.link.request_attempts;
    let mut link: Link<_, _, RX_BUFFER_SIZE> = Link::new(
        port,
        loaded.spec,
        Traced::new(table),
        loaded.sequence,
        &loaded.config.link,
    )
    .map_err(|e| anyhow!("create link: {e}"))?;

    let packet = link
        .request(command, data, attempts)
        .map_err(|e| anyhow!("{e}"))?;
    println!("{}", describe(&packet));
    Ok(())
}

fn run_decode(loaded: &LoadedConfig, capture: PathBuf, is_hex: bool) -> Result<()> {
    let bytes = if is_hex {
        let text = fs::read_to_string(&capture)
            .with_context(|| format!("read capture {}", capture.display()))?;
        parse_hex(&text).context("parse capture")?
    } else {
        fs::read(&capture).with_context(|| format!("read capture {}", capture.display()))?
    };

    let replay = replay::replay(&loaded.spec, &bytes).context("decode capture")?;
    for (i, frame) in replay.frames.iter().enumerate() {
        println!("{i:4}: {}", describe(&frame.packet));
    }
    println!(
        "{} frames, {} bytes discarded, {} early tails, {} bytes left over",
        replay.report.packets,
        replay.report.discarded,
        replay.report.early_tails,
        replay.leftover.len()
    );
    if !replay.leftover.is_empty() {
        warn!(bytes = %hex(&replay.leftover), "capture ends inside a frame");
    }
    Ok(())
}
