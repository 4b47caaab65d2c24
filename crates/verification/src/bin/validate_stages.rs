//! Stage validation binary
//!
//! Generates a draw-batch manifest and validates its vertex, fragment and compute stages with
//! naga's GLSL front end. Other stages are listed as skipped.

use primvar_codegen::DrawBatchManifest;
use primvar_codegen_verification::VerifyError;
use primvar_codegen_verification::naga_backend::validate_glsl;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <manifest.yaml>", args[0]);
        eprintln!("Validates the generated stages of a manifest with naga");
        std::process::exit(1);
    }

    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).with_writer(std::io::stderr).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let manifest = DrawBatchManifest::from_file(&args[1])?;
    let mut code_gen = manifest.code_gen()?;
    let stages = code_gen.generate()?;

    let mut failed = false;
    for stage in stages {
        match validate_glsl(&stage.source, stage.stage) {
            Ok(module) => println!("✓ {}: {} functions, {} globals", stage.stage, module.functions.len(), module.global_variables.len()),
            Err(VerifyError::UnsupportedStage(_)) => println!("- {}: skipped", stage.stage),
            Err(e) => {
                failed = true;
                println!("✗ {e}");
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
