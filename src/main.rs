use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fastjade::{Compiler, Context, Diagnostic, Template};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Stage {
    /// The parsed node tree
    Tree,
    /// The linearized parts
    Parts,
    /// The JavaScript-style function listing
    Source,
}

#[derive(Parser)]
#[command(name = "fastjade", version, about = "Compile and render Jade-style templates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template to stdout.
    Render {
        file: PathBuf,
        /// JSON object providing the template's variables
        #[arg(long)]
        context: Option<PathBuf>,
        /// Name used in diagnostics (default: the file name)
        #[arg(long)]
        label: Option<String>,
    },
    /// Compile a template and report its warnings.
    Check { file: PathBuf },
    /// Dump an intermediate compilation stage.
    Emit {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = Stage::Source)]
        stage: Stage,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .init();
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Render {
            file,
            context,
            label,
        } => render_cmd(&file, context.as_deref(), label.as_deref()),
        Commands::Check { file } => check_cmd(&file),
        Commands::Emit { file, stage } => emit_cmd(&file, stage),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map_or_else(|| path.display().to_string(), str::to_string)
}

fn load_context(path: &Path) -> Result<Context> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read context {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    match Context::from_json(json) {
        Some(ctx) => Ok(ctx),
        None => bail!("context {} must be a JSON object", path.display()),
    }
}

/// Compile, printing a compile error as a miette report. `None` means the
/// error has already been shown.
fn compile_file(source: &str, label: &str) -> Option<Template> {
    match Compiler::new().compile(source, Some(label)) {
        Ok(template) => Some(template),
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            None
        }
    }
}

fn render_cmd(file: &Path, context: Option<&Path>, label: Option<&str>) -> Result<ExitCode> {
    let source = read_source(file)?;
    let label = label.map_or_else(|| file_label(file), str::to_string);
    let ctx = match context {
        Some(path) => load_context(path)?,
        None => Context::new(),
    };
    let Some(template) = compile_file(&source, &label) else {
        return Ok(ExitCode::FAILURE);
    };
    let output = template
        .render(&ctx)
        .with_context(|| format!("failed to render {label}"))?;
    println!("{output}");
    Ok(ExitCode::SUCCESS)
}

fn check_cmd(file: &Path) -> Result<ExitCode> {
    let source = read_source(file)?;
    let label = file_label(file);
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let result = Compiler::new().compile_with_sink(&source, Some(&label), &mut diagnostics);
    for diagnostic in &diagnostics {
        if let Diagnostic::Warning(warning) = diagnostic {
            eprintln!("{label}: warning: {warning}");
        }
    }
    match result {
        Ok(_) => {
            eprintln!("{label}: ok ({} warnings)", diagnostics.len());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn emit_cmd(file: &Path, stage: Stage) -> Result<ExitCode> {
    let source = read_source(file)?;
    let parsed = fastjade::parser::parse(&source);
    for warning in &parsed.warnings {
        tracing::warn!("{warning}");
    }
    match stage {
        Stage::Tree => println!("{:#?}", parsed.root),
        Stage::Parts | Stage::Source => {
            let parts = fastjade::linearize::linearize(&parsed.root)?;
            if let Stage::Parts = stage {
                println!("{parts:#?}");
            } else {
                println!("{}", fastjade::synth::function_source(&parts));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
