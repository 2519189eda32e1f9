//! Embedded Python optimizer script and deployment utilities.
//!
//! The script is stored as a string constant and written to disk on first
//! use or when the embedded version changes (detected via hash comparison).

use crate::error::IoResultExt;
use crate::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the deployed optimizer script.
pub const OPTIMIZE_SCRIPT_NAME: &str = "optimize_onnx.py";

/// Import check used to probe for the onnxruntime tooling.
pub const TOOLING_PROBE: &str =
    "import onnx, onnxruntime.transformers.optimizer, onnxruntime.quantization";

/// Python script that fuses and quantizes an ONNX graph.
pub const OPTIMIZE_SCRIPT: &str = r#"#!/usr/bin/env python3
"""Optimize an ONNX graph with onnxruntime fusion passes, then quantize it.

Reports progress as JSON lines on stdout.
"""
import argparse
import json
import os
import sys

def progress(stage, **kwargs):
    """Emit a JSON progress line to stdout."""
    print(json.dumps({"stage": stage, **kwargs}), flush=True)

def main():
    parser = argparse.ArgumentParser(description="Optimize and quantize an ONNX graph")
    parser.add_argument("--input", required=True)
    parser.add_argument("--output", required=True)
    parser.add_argument("--quantized-output", required=True)
    parser.add_argument("--model-type", default="bert")
    parser.add_argument("--num-heads", type=int, default=0)
    parser.add_argument("--hidden-size", type=int, default=0)
    parser.add_argument("--weight-type", default="QUInt8")
    args = parser.parse_args()

    try:
        import onnx
        from onnxruntime.transformers import optimizer
        from onnxruntime.quantization import quantize_dynamic, QuantType
    except ImportError as e:
        progress("error", message=f"Missing required package: {e}")
        sys.exit(1)

    progress("loading", message=f"Loading {args.input}")
    onnx.load(args.input)

    progress("optimizing", message=f"Applying {args.model_type} fusion passes")
    optimized_model = optimizer.optimize_model(
        args.input,
        model_type=args.model_type,
        num_heads=args.num_heads,
        hidden_size=args.hidden_size,
        optimization_options=optimizer.FusionOptions("all"),
    )
    optimized_model.save_model_to_file(args.output)
    progress("optimized", output_path=args.output, output_size=os.path.getsize(args.output))

    progress("quantizing", message=f"Quantizing weights to {args.weight_type}")
    quantize_dynamic(
        args.output,
        args.quantized_output,
        weight_type=getattr(QuantType, args.weight_type),
    )
    progress(
        "complete",
        output_path=args.quantized_output,
        output_size=os.path.getsize(args.quantized_output),
    )

if __name__ == "__main__":
    main()
"#;

/// Compute a short hash of a string for staleness checking.
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash[..8])
}

/// Deploy the optimizer script into `dir` if missing or outdated.
///
/// Uses a `.hash` sidecar file to detect when the embedded script has changed
/// and needs to be rewritten. Returns the script path.
pub fn ensure_optimize_script(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_path(dir)?;
    deploy_script(dir, OPTIMIZE_SCRIPT_NAME, OPTIMIZE_SCRIPT)
}

fn deploy_script(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let script_path = dir.join(filename);
    let hash_path = dir.join(format!("{}.hash", filename));
    let current_hash = content_hash(content);

    if script_path.exists() {
        if let Ok(stored_hash) = std::fs::read_to_string(&hash_path) {
            if stored_hash.trim() == current_hash {
                return Ok(script_path);
            }
        }
    }

    std::fs::write(&script_path, content).with_path(&script_path)?;
    std::fs::write(&hash_path, &current_hash).with_path(&hash_path)?;
    debug!("Deployed {}", script_path.display());
    Ok(script_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_deploy_writes_script_and_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = ensure_optimize_script(temp_dir.path()).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), OPTIMIZE_SCRIPT);
        let hash = std::fs::read_to_string(temp_dir.path().join("optimize_onnx.py.hash")).unwrap();
        assert_eq!(hash, content_hash(OPTIMIZE_SCRIPT));
    }

    #[test]
    fn test_deploy_rewrites_stale_script() {
        let temp_dir = TempDir::new().unwrap();
        let path = ensure_optimize_script(temp_dir.path()).unwrap();
        std::fs::write(&path, "print('edited')").unwrap();
        std::fs::write(temp_dir.path().join("optimize_onnx.py.hash"), "stale").unwrap();

        ensure_optimize_script(temp_dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), OPTIMIZE_SCRIPT);
    }

    #[test]
    fn test_content_hash_is_short_and_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 16);
    }
}
