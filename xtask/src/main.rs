// Desktop/tooling crate: unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod pack_clips;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Griduino speech-clip development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a directory of WAV clips into a QSPI flash image
    PackClips {
        /// Directory holding the clips, e.g. `male/c_bwh_16.wav`
        #[arg(long)]
        clips_dir: std::path::PathBuf,
        /// Output image file
        #[arg(long, default_value = "clips.bin")]
        out: std::path::PathBuf,
    },
    /// Run all tests (unit, integration, and doc)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::PackClips { clips_dir, out } => pack_clips::run(&clips_dir, &out),
        Commands::Test { unit, integration } => test::run(unit, integration),
    }
}
