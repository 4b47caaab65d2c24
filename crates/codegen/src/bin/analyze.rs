//! Draw-batch analysis tool
//!
//! Loads a YAML draw-batch manifest, runs code generation without a device and prints the
//! assembled source of every stage together with the program's cache key.
//!
//! # Usage
//! ```bash
//! analyze batch.yaml --stage fs --textual --verbose
//! ```

use clap::Parser;
use primvar_codegen::{DrawBatchManifest, ResourcePipeline, ShaderStage};
use std::path::PathBuf;

/// Command-line arguments for the analysis tool
#[derive(Parser)]
#[command(version, about = "Prints the generated shader sources of a draw-batch manifest")]
struct Args {
    /// Draw-batch manifest file path
    manifest: PathBuf,

    /// Only print this stage (vs, tcs, tes, gs, fs, cs, ptcs, ptvs)
    #[arg(long, short)]
    stage: Option<String>,

    /// Declare resources as text instead of through function descriptors
    #[arg(long, short)]
    textual: bool,

    /// Log generation diagnostics down to debug level
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let stage = match &args.stage {
        Some(name) => match ShaderStage::ALL.into_iter().find(|stage| stage.abbreviation().eq_ignore_ascii_case(name)) {
            Some(stage) => Some(stage),
            None => {
                eprintln!("Invalid stage '{name}'. Valid stages: vs, tcs, tes, gs, fs, cs, ptcs, ptvs");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let mut manifest = DrawBatchManifest::from_file(&args.manifest)?;
    if args.textual {
        manifest.options.resource_pipeline_override = Some(ResourcePipeline::Textual);
    }

    let mut code_gen = manifest.code_gen()?;
    let hash = code_gen.compute_hash();
    let pipeline = code_gen.resource_pipeline();
    let stages = code_gen.generate()?;

    println!("// manifest: {}", manifest.id);
    println!("// hash: {hash:016x}");
    println!("// resources: {pipeline:?}");
    for assembled in stages.iter().filter(|assembled| stage.is_none_or(|stage| stage == assembled.stage)) {
        println!("// ---- {} ----", assembled.stage);
        print!("{}", assembled.source);
    }

    Ok(())
}
