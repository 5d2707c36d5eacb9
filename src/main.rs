use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use word_import::decode::StrategyKind;
use word_import::document::RawDocument;
use word_import::editor::MemoryEditor;
use word_import::pipeline::{init_default_config, ImportPipeline, PipelineConfig};
use word_import::progress::ConsoleProgress;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Html,
    Text,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "word-import")]
#[command(about = "Import Word documents as clean, editor-ready HTML", long_about = None)]
struct Args {
    /// Generate a default word-import.toml, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file to (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .docx (or .doc holding an Office Open XML package)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output file (default: <input_stem>.<format extension> next to the input)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
    format: OutputFormat,

    /// Decode strategy (overrides the config file)
    #[arg(long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Config file path (default: search for word-import.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the decoder's markup, before normalization, to FILE
    #[arg(long, value_name = "FILE")]
    dump_intermediate: Option<PathBuf>,

    /// Write the conversion report as JSON to FILE
    #[arg(long, value_name = "FILE")]
    report_json: Option<PathBuf>,

    /// Debug-level diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(level)
        .init();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  word-import <input.docx>\n\nTIPS:\n  - Default config search: word-import.toml (upwards), or set WORD_IMPORT_CONFIG.\n  - Run with --init-config to write a commented default config.\n"
            );
            return Ok(());
        }
    };
    let output = match args.output {
        Some(p) => p,
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output")
                .to_string();
            input.with_file_name(format!("{stem}.{}", args.format.extension()))
        }
    };

    let cfg = PipelineConfig::resolve(Some(&input), args.config, args.strategy)
        .context("build config")?;
    let raw = RawDocument::from_path(&input)
        .with_context(|| format!("read input: {}", input.display()))?;

    let progress = Arc::new(ConsoleProgress::new(true));
    let pipeline = ImportPipeline::new(cfg, progress.clone());
    let editor = MemoryEditor::new();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    let report = runtime.block_on(async {
        let conversion = pipeline.convert(raw).await?;
        if let Some(path) = args.dump_intermediate.as_ref() {
            std::fs::write(path, conversion.intermediate.to_html())
                .with_context(|| format!("write intermediate markup: {}", path.display()))?;
            progress.info(format!("Wrote intermediate markup: {}", path.display()));
        }
        let report = pipeline.import_converted(&conversion, Some(&editor)).await?;
        anyhow::Ok(report)
    })?;

    let body = match args.format {
        OutputFormat::Html => editor.to_html(),
        OutputFormat::Text => editor.to_text(),
        OutputFormat::Json => editor.to_json()?,
    };
    std::fs::write(&output, body).with_context(|| format!("write output: {}", output.display()))?;
    progress.info(format!(
        "Wrote {} ({} of {} images, {} tables)",
        output.display(),
        report.attached_images,
        report.expected_images,
        report.table_count
    ));
    for w in &report.warnings {
        progress.info(format!("warning: {w}"));
    }

    if let Some(path) = args.report_json.as_ref() {
        let json = serde_json::to_string_pretty(&report).context("serialize report")?;
        std::fs::write(path, json).with_context(|| format!("write report: {}", path.display()))?;
    }
    Ok(())
}
