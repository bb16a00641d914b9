/// BSP command-line tool: walk binary files with incremental schemas.
///
/// # Command overview
///
/// ```text
/// bsp <COMMAND> [OPTIONS]
///
/// Commands:
///   png      List the chunks of a PNG file, decoding IHDR
///   lpstr    Print length-prefixed string records
///   help     Print help information
///
/// Global options:
///   -v, --verbose         Log decoder progress to stderr
///   --chunk-size <N>      Feed the decoder N bytes at a time
///   -h, --help            Print help
///   -V, --version         Print version
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                        |
/// |------|------------------------------------------------|
/// | 0    | Success                                        |
/// | 1    | Error (I/O failure, malformed or truncated input) |
///
/// Reports go to stdout; logs and errors go to stderr.
use std::path::PathBuf;
use std::process;

use bsp_decoder::{ByteOrder, Decoder, DecoderConfig, TracingObserver};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod cmd_lpstr;
mod cmd_png;

// ── CLI root ──────────────────────────────────────────────────────────────────

/// The BSP (binary schema parser) command-line tool.
#[derive(Parser)]
#[command(name = "bsp", version, about = "Incremental binary schema parser CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log decoder progress (schemas, fields, waits) to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Bytes handed to the decoder per push. Small values exercise
    /// fragmented input; the output must not change.
    #[arg(long, global = true, default_value_t = bsp_decoder::config::DEFAULT_READ_CHUNK_SIZE)]
    chunk_size: usize,
}

// ── Sub-commands ──────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum Commands {
    /// List the chunks of a PNG file.
    Png(PngArgs),
    /// Print length-prefixed string records.
    Lpstr(LpstrArgs),
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Arguments for `bsp png`.
///
/// ```text
/// ┌────────┬────────────────────────────────────────────────────┐
/// │ Flag   │ Effect                                             │
/// ├────────┼────────────────────────────────────────────────────┤
/// │ --json │ Emit one JSON report instead of one line per chunk │
/// └────────┴────────────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct PngArgs {
    /// Path to the PNG file.
    pub file: PathBuf,

    /// Emit a JSON report on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `bsp lpstr`.
///
/// Each record is a `u32` length followed by that many bytes, repeated
/// until the end of the file.
#[derive(clap::Args)]
pub struct LpstrArgs {
    /// Path to the record file.
    pub file: PathBuf,

    /// Byte order of the length prefix: `le` or `be`.
    #[arg(long, default_value = "le")]
    pub byte_order: ByteOrder,
}

/// Global options every command needs to build its decoder.
pub struct Globals {
    pub verbose: bool,
    pub chunk_size: usize,
}

impl Globals {
    /// A decoder configured from the global flags.
    pub fn decoder(&self, byte_order: ByteOrder) -> Decoder {
        let mut decoder = Decoder::with_config(DecoderConfig {
            byte_order,
            read_chunk_size: self.chunk_size,
        });
        if self.verbose {
            decoder.set_observer(TracingObserver);
        }
        decoder
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let globals = Globals {
        verbose: cli.verbose,
        chunk_size: cli.chunk_size.max(1),
    };

    let result = match cli.command {
        Commands::Png(args) => cmd_png::run(&args, &globals),
        Commands::Lpstr(args) => cmd_lpstr::run(&args, &globals),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
