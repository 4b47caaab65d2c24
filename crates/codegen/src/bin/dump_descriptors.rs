//! Function descriptor dumping tool
//!
//! Generates a draw-batch manifest through the descriptor resource pipeline and writes the
//! per-stage function descriptors to a single JSON file.

use primvar_codegen::{DrawBatchManifest, FunctionDescriptor, ResourcePipeline};
use serde::Serialize;
use std::{env, fs, process};

/// The JSON document written by this tool
#[derive(Debug, Serialize)]
struct DescriptorDump {
    id: String,
    hash: String,
    stages: Vec<FunctionDescriptor>,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 3 {
        eprintln!("Usage: {} <manifest.yaml> <output_file>", args[0]);
        eprintln!("Generates the manifest and dumps the per-stage function descriptors to a JSON file");
        process::exit(1);
    }

    let manifest_path = &args[1];
    let output_file = &args[2];

    let mut manifest = match DrawBatchManifest::from_file(manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("Error loading manifest '{manifest_path}': {e}");
            process::exit(1);
        }
    };
    // Descriptors only exist in the descriptor pipeline
    manifest.options.resource_pipeline_override = Some(ResourcePipeline::Descriptor);

    let mut code_gen = match manifest.code_gen() {
        Ok(code_gen) => code_gen,
        Err(e) => {
            eprintln!("Error preparing manifest '{manifest_path}': {e}");
            process::exit(1);
        }
    };
    let hash = format!("{:016x}", code_gen.compute_hash());
    let stages = match code_gen.generate() {
        Ok(stages) => stages.iter().filter_map(|stage| stage.descriptor.clone()).collect(),
        Err(e) => {
            eprintln!("Error generating manifest '{manifest_path}': {e}");
            process::exit(1);
        }
    };

    let dump = DescriptorDump { id: manifest.id.clone(), hash, stages };
    let json = match serde_json::to_string_pretty(&dump) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing descriptors: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = fs::write(output_file, json) {
        eprintln!("Error writing '{output_file}': {e}");
        process::exit(1);
    }
    println!("Wrote {} stage descriptors to {output_file}", dump.stages.len());
}
