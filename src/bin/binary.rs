//! Binary Image CLI
//!
//! Compiles a schema (plus its imports) and optional record data into a
//! relocatable binary image. Nothing is written when compilation fails.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sheetpack::{compile_files, PackConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pack-binary")]
#[command(about = "Compile a sheet schema and row data into a binary image")]
struct Cli {
    /// Schema file (YAML)
    schema: PathBuf,

    /// Output image path
    output: PathBuf,

    /// Record data: JSON workbook, CSV file, or directory of CSV files
    data: Option<PathBuf>,

    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Print the segment table and SHA-256 of the image
    #[arg(long)]
    report: bool,

    /// Also write the effective configuration to this path
    #[arg(long)]
    dump_config: Option<String>,
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

    if let Some(path) = &cli.dump_config {
        config.save(path).with_context(|| format!("failed to write configuration to {}", path))?;
        println!("📝 Configuration written to {}", path);
    }

    let image = compile_files(&cli.schema, cli.data.as_deref(), &config)
        .with_context(|| format!("failed to compile {}", cli.schema.display()))?;

    let diagnostics = image.diagnostics();
    if diagnostics.warning_count() > 0 {
        eprint!("{}", diagnostics.format_all());
    }

    fs::write(&cli.output, image.bytes())
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    println!(
        "✅ {} -> {} ({} bytes, {} segments, sha256 {})",
        cli.schema.display(),
        cli.output.display(),
        image.len(),
        image.segments().len(),
        image.checksum().short()
    );

    if cli.report || config.output.report {
        println!();
        print!("{}", image.report());
    }

    Ok(())
}
