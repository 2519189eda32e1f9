//! OCR Convert - batch converter from PaddleOCR checkpoints to ONNX.
//!
//! Thin command-line front end over `ocr-convert-core`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use ocr_convert_core::batch::default_scripts_dir;
use ocr_convert_core::conversion::select_optimizer;
use ocr_convert_core::{
    BatchOrchestrator, BatchReport, BatchRequest, ConversionSettings, ExternalTool,
    HttpArchiveSource, OptimizerSettings, Paddle2OnnxConverter, SourceCatalog,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "ocr-convert")]
#[command(about = "Convert PaddleOCR models to ONNX format")]
struct Args {
    /// Output directory for ONNX models
    #[arg(long, default_value = "./onnx_models")]
    output_dir: PathBuf,

    /// Models to convert, as <type>_<variant> tokens
    #[arg(long, num_args = 1.., default_values = ["det_mobile", "rec_mobile_en"])]
    models: Vec<String>,

    /// Reuse archives already in the temp directory; missing ones are still downloaded
    #[arg(long)]
    skip_download: bool,

    /// Skip ONNX optimization
    #[arg(long)]
    skip_optimization: bool,

    /// Keep the temp directory after the run
    #[arg(long)]
    keep_temp: bool,

    /// JSON file overriding the conversion settings
    #[arg(long)]
    settings: Option<PathBuf>,

    /// paddle2onnx executable
    #[arg(long, default_value = "paddle2onnx")]
    paddle2onnx: PathBuf,

    /// Python interpreter used for optimization
    #[arg(long, default_value = "python3")]
    python: PathBuf,

    /// Print the known models and exit
    #[arg(long)]
    list_models: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let catalog = SourceCatalog::pp_ocr_v4();
    if args.list_models {
        print_catalog(&catalog);
        return Ok(());
    }

    let settings = match &args.settings {
        Some(path) => ConversionSettings::load(path)?,
        None => ConversionSettings::default(),
    };

    let optimizer = select_optimizer(
        ExternalTool::new(&args.python),
        default_scripts_dir(),
        OptimizerSettings::default(),
    )
    .await;

    let orchestrator = BatchOrchestrator::builder()
        .catalog(catalog)
        .settings(settings)
        .archive_source(Arc::new(HttpArchiveSource::new()?))
        .converter(Arc::new(Paddle2OnnxConverter::new(ExternalTool::new(
            &args.paddle2onnx,
        ))))
        .optimizer(optimizer)
        .build()
        .await?;

    info!("Output directory: {}", args.output_dir.display());
    info!("Models to convert: {}", args.models.join(", "));
    info!("Optimizer: {}", orchestrator.optimizer_name());

    let request = BatchRequest::new(&args.output_dir, args.models)
        .skip_download(args.skip_download)
        .skip_optimization(args.skip_optimization)
        .keep_scratch(args.keep_temp);

    let report = orchestrator.run(&request).await?;
    print_summary(&report);

    Ok(())
}

fn print_catalog(catalog: &SourceCatalog) {
    println!("Available models:");
    for (spec, url) in catalog.entries() {
        println!("  {:<16} {:<28} {}", spec.token(), spec.model_name(), url);
    }
}

fn print_summary(report: &BatchReport) {
    println!();
    println!("Output directory: {}", report.output_dir.display());
    println!("Metadata: {}", report.manifest_path.display());

    let recorded: Vec<_> = report.recorded().collect();
    println!("Converted {} of {} models:", recorded.len(), report.outcomes.len());
    for outcome in recorded {
        println!(
            "  ok    {}",
            outcome.model_name.as_deref().unwrap_or(&outcome.token)
        );
    }

    for outcome in report.failed() {
        let stage = outcome
            .failed_at
            .map(|s| s.to_string())
            .unwrap_or_default();
        let label = if outcome.skipped { "skip" } else { "fail" };
        println!(
            "  {:<5} {} ({}): {}",
            label,
            outcome.token,
            stage,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
}
