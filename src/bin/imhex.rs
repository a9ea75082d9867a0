//! ImHex Pattern CLI
//!
//! Generates an ImHex pattern that decodes a schema's binary image, including
//! map bodies bound against their imported schemas.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sheetpack::codegen::emit_imhex_pattern;
use sheetpack::{Diagnostics, PackConfig, SchemaLoader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pack-imhex")]
#[command(about = "Generate an ImHex pattern for a sheet schema's binary image")]
struct Cli {
    /// Schema file (YAML)
    schema: PathBuf,

    /// Output pattern path
    output: PathBuf,

    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PackConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;

    let set = SchemaLoader::new(&config.imports)
        .load(&cli.schema)
        .with_context(|| format!("failed to load {}", cli.schema.display()))?;
    info!(schema = %set.root.name, imports = set.imports.len(), "generating ImHex pattern");

    let mut diagnostics = Diagnostics::new();
    let pattern = emit_imhex_pattern(&set, &mut diagnostics);
    if diagnostics.warning_count() > 0 {
        eprint!("{}", diagnostics.format_all());
    }

    fs::write(&cli.output, pattern).with_context(|| format!("failed to write {}", cli.output.display()))?;

    println!("✅ {} -> {}", cli.schema.display(), cli.output.display());
    Ok(())
}
