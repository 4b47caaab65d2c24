//! Resource pipeline parity verification binary
//!
//! Generates every given draw-batch manifest through both resource pipelines and reports
//! declarations that differ between the textual and descriptor forms.

use primvar_codegen::DrawBatchManifest;
use primvar_codegen_verification::parity::check_parity;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <manifest.yaml>...", args[0]);
        eprintln!("Checks that textual and descriptor resources declare the same resources");
        std::process::exit(1);
    }

    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).with_writer(std::io::stderr).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut failures = 0;
    for manifest_path in &args[1..] {
        let manifest = match DrawBatchManifest::from_file(manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                eprintln!("✗ Error loading manifest {manifest_path}: {e}");
                failures += 1;
                continue;
            }
        };
        let report = match check_parity(&manifest) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("✗ Error generating {manifest_path}: {e}");
                failures += 1;
                continue;
            }
        };

        if report.is_match() {
            println!("✓ {}: {} stages match", report.id, report.stages.len());
            continue;
        }
        failures += 1;
        println!("✗ {}: resource pipelines differ", report.id);
        if report.stage_mismatch {
            println!("  active stages differ between pipelines");
        }
        for stage in report.stages.iter().filter(|stage| !stage.is_match()) {
            for declaration in &stage.textual_only {
                println!("  {} textual only: {declaration}", stage.stage);
            }
            for declaration in &stage.descriptor_only {
                println!("  {} descriptor only: {declaration}", stage.stage);
            }
        }
    }

    if failures > 0 {
        eprintln!("{failures} of {} manifests failed", args.len() - 1);
        std::process::exit(1);
    }
    Ok(())
}
