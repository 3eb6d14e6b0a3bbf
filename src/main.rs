use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use rabex::files::bundlefile::CompressionType;
use tracing_subscriber::EnvFilter;
use unity_scene_repacker::driver::{self, RepackOptions};
use unity_scene_repacker::manifest;

/// Repacks Unity scene files into a single pruned asset bundle containing
/// only the object subtrees named in an object manifest.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Directory containing `globalgamemanagers` and `level{i}` files.
    #[arg(long)]
    game_dir: PathBuf,

    /// JSON file mapping scene name to an array of slash-delimited object paths.
    #[arg(long)]
    objects: PathBuf,

    /// Path to write the output bundle to.
    #[arg(short, long, default_value = "out.unity3d")]
    output: PathBuf,

    /// Deactivate kept roots in the output scene.
    #[arg(long, action = clap::ArgAction::SetTrue, default_value_t = true, overrides_with = "no_disable")]
    disable: bool,

    /// Keep kept roots active in the output scene.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_disable: bool,

    /// Block compression codec for the output bundle.
    #[arg(long, value_enum, default_value_t = Compression::Lz4)]
    compression: Compression,

    /// Increase log verbosity (can be repeated).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all but error-level logging.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum Compression {
    None,
    Lz4,
    Lzma,
}

impl From<Compression> for CompressionType {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => CompressionType::None,
            Compression::Lz4 => CompressionType::Lz4,
            Compression::Lzma => CompressionType::Lzma,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let manifest = match manifest::load(&cli.objects) {
        Ok(manifest) => manifest,
        Err(err) => return fail(&err),
    };

    let options = RepackOptions {
        game_dir: cli.game_dir,
        output: cli.output,
        disable_roots: cli.disable && !cli.no_disable,
        compression: cli.compression.into(),
    };

    match driver::run(&options, &manifest) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(&err),
    }
}

fn fail(err: &anyhow::Error) -> ExitCode {
    tracing::error!("{err:#}");
    ExitCode::FAILURE
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .compact()
        .init();
}
