use crate::config::load_config;
use crate::controller::{DEFAULT_OVERLAY_CLASS, DiagramController, QueryRunner, RenderOutcome, Surface};
use crate::ir::QueryResult;
use crate::parser::parse_result;
use crate::render::{write_output_png, write_output_svg};
use crate::scene_dump::write_scene_dump;
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const STDIN_QUERY: &str = "-";

#[derive(Parser, Debug)]
#[command(name = "gsnr", version, about = "GSN assurance-case diagram renderer")]
pub struct Args {
    /// Rows file (JSON or triples) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON/JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,

    /// Rows file with an `s` column to highlight
    #[arg(long = "highlight")]
    pub highlight: Option<PathBuf>,

    /// Overlay class applied to --highlight rows
    #[arg(long = "class", default_value = DEFAULT_OVERLAY_CLASS)]
    pub class: String,

    /// Rows file with `ctx`, `clt` and `item` columns
    #[arg(long = "collections")]
    pub collections: Option<PathBuf>,

    /// Write the positioned scene as JSON
    #[arg(long = "dump")]
    pub dump: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

/// Treats each query as the path of a rows file. `-` reads the stdin
/// content captured at startup.
pub struct FileRunner {
    stdin: Option<String>,
}

impl FileRunner {
    pub fn new(stdin: Option<String>) -> Self {
        Self { stdin }
    }
}

#[async_trait]
impl QueryRunner for FileRunner {
    async fn run_query(&self, query: &str) -> Result<QueryResult> {
        let content = if query == STDIN_QUERY {
            self.stdin.clone().context("stdin was not captured")?
        } else {
            tokio::fs::read_to_string(query)
                .await
                .with_context(|| format!("reading {query}"))?
        };
        parse_result(&content)
    }
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    config.render.width = args.width;
    config.render.height = args.height;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let svg = runtime.block_on(render_document(&args, &config))?;

    match args.output_format {
        OutputFormat::Svg => {
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_output_png(&svg, &output, &config.render)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn render_document(args: &Args, config: &crate::config::Config) -> Result<String> {
    let (input, stdin) = input_query(args.input.as_deref())?;
    let controller = DiagramController::from_config(FileRunner::new(stdin), config);
    controller
        .attach(Surface::new("gsnr", config.render.width, config.render.height))
        .await;

    let outcome = controller.execute(&input, None).await?;
    if !matches!(outcome, RenderOutcome::Rendered { .. }) {
        return Err(anyhow::anyhow!("input holds no s/p/o relation rows"));
    }
    if let Some(path) = &args.highlight {
        controller
            .execute(&path.to_string_lossy(), Some(args.class.as_str()))
            .await?;
    }
    if let Some(path) = &args.collections {
        controller.execute(&path.to_string_lossy(), None).await?;
    }
    if let Some(path) = &args.dump {
        if let Some(scene) = controller.scene().await {
            write_scene_dump(path, &scene, &controller.overlays().await)?;
        }
    }

    controller
        .to_svg()
        .await
        .ok_or_else(|| anyhow::anyhow!("diagram was not rendered"))
}

fn input_query(path: Option<&Path>) -> Result<(String, Option<String>)> {
    match path {
        Some(path) if path != Path::new(STDIN_QUERY) => Ok((path.to_string_lossy().into_owned(), None)),
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok((STDIN_QUERY.to_string(), Some(buf)))
        }
    }
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!(
        "Output path required for {} output",
        ext
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::cell;

    #[test]
    fn parses_overlay_flags() {
        let args = Args::try_parse_from([
            "gsnr",
            "-i",
            "case.json",
            "--highlight",
            "undeveloped.json",
            "--class",
            "undeveloped",
            "-e",
            "png",
        ])
        .unwrap();
        assert_eq!(args.class, "undeveloped");
        assert!(matches!(args.output_format, OutputFormat::Png));
        assert_eq!(args.width, 1200.0);
    }

    #[tokio::test]
    async fn file_runner_serves_captured_stdin() {
        let runner = FileRunner::new(Some("G1 supportedBy S1 .".to_string()));
        let result = runner.run_query(STDIN_QUERY).await.unwrap();
        assert_eq!(cell(&result.rows[0], "o"), Some("S1"));
        assert!(runner.run_query("/definitely/missing.json").await.is_err());
    }
}
