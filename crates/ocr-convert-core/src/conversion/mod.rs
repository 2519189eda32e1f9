//! Graph conversion and optimization.
//!
//! Conversion from PaddlePaddle checkpoints to ONNX is performed by the
//! external `paddle2onnx` tool. Optimization and quantization use the
//! `GraphOptimizer` strategy trait, selected once at startup: the
//! onnxruntime-backed strategy runs an embedded Python script, the
//! copy-through strategy is used when that tooling is not installed.

mod converter;
mod optimizer;
pub(crate) mod pipeline;
mod scripts;
mod shape;
mod types;

pub use converter::{GraphConverter, Paddle2OnnxConverter};
pub use optimizer::{
    select_optimizer, CopyThroughOptimizer, GraphOptimizer, OnnxRuntimeOptimizer,
};
pub use shape::{Dim, InputShape, ShapeNote};
pub use types::{
    ConversionResult, ModelStage, OptimizedArtifacts, ProducedFiles, ScriptProgressLine,
    SizeReport,
};
