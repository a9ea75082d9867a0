//! C Header CLI
//!
//! Generates packed C structs and accessors describing a schema's image layout.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sheetpack::codegen::emit_c_header;
use sheetpack::{ResolvedSchema, SchemaDocument};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pack-c-header")]
#[command(about = "Generate a C header describing a sheet schema's binary image")]
struct Cli {
    /// Schema file (YAML)
    schema: PathBuf,

    /// Output header path
    output: PathBuf,
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
    // imported types are referenced by name only, so imports are not loaded
    let document = SchemaDocument::from_path(&cli.schema)
        .with_context(|| format!("failed to read {}", cli.schema.display()))?;
    let schema = ResolvedSchema::resolve(&document)?;
    info!(schema = %schema.name, "generating C header");

    let header = emit_c_header(&schema);
    fs::write(&cli.output, header).with_context(|| format!("failed to write {}", cli.output.display()))?;

    println!("✅ {} -> {}", cli.schema.display(), cli.output.display());
    Ok(())
}
