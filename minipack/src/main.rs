use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use minipack_rs::config::DEFAULT_CONFIG_FILE;
use minipack_rs::{Compiler, Config};

/// minipack: A utility for bundling CommonJS modules into a single script
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file [default: <root>/minipack.config.json]
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Project root that module identities are relative to [default: current directory]
    #[clap(short, long)]
    pub root: Option<PathBuf>,
}

fn run(args: Args) -> anyhow::Result<PathBuf> {
    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let config_path = args
        .config
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));

    let config = Config::from_path(&config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;

    let mut compiler = Compiler::new(config, &root)?;
    let artifact = compiler.run().context("Bundling failed")?;
    Ok(artifact.path)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = Args::parse();
    log::debug!("{:?}", args);

    match run(args) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
