//! struct-oapi CLI
//!
//! Command-line interface for generating, validating and linting OpenAPI
//! component schemas derived from annotated declarations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use struct_oapi::{
    lint, load_source_auto, load_value, resolve_all, validate_document, Document, DocumentError,
    FileStatus, ResolveOptions, Severity, DEFAULT_MAX_DEPTH,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "struct-oapi")]
#[command(about = "Derive OpenAPI component schemas from annotated declarations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every annotated declaration into an OpenAPI document
    Generate {
        /// Declaration manifest: file path or URL (http:// or https://)
        source: String,

        /// Document title (default: "API", or the base document's title)
        #[arg(long)]
        title: Option<String>,

        /// API version (default: "1.0.0", or the base document's version)
        #[arg(long)]
        api_version: Option<String>,

        /// Existing document to add the schemas to
        #[arg(long)]
        base: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output encoding
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Maximum declaration nesting depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Treat `omitempty` fields as optional unless `oapi_required` says otherwise
        #[arg(long)]
        omitempty_optional: bool,

        /// Skip validating the generated document
        #[arg(long)]
        no_validate: bool,
    },

    /// Validate an OpenAPI document (structure, $refs, required properties)
    Validate {
        /// Document file (JSON or YAML)
        document: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Lint declaration manifests (syntax, resolution errors, annotation warnings)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Generate {
            source,
            title,
            api_version,
            base,
            output,
            format,
            pretty,
            max_depth,
            omitempty_optional,
            no_validate,
        } => run_generate(GenerateArgs {
            source,
            title,
            api_version,
            base,
            output,
            format,
            pretty,
            options: ResolveOptions::new()
                .max_depth(max_depth)
                .omitempty_optional(omitempty_optional),
            validate: !no_validate,
        }),

        Commands::Validate { document, json } => run_validate(&document, json),

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Log to stderr; `RUST_LOG` overrides the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct GenerateArgs {
    source: String,
    title: Option<String>,
    api_version: Option<String>,
    base: Option<PathBuf>,
    output: Option<PathBuf>,
    format: OutputFormat,
    pretty: bool,
    options: ResolveOptions,
    validate: bool,
}

fn run_generate(args: GenerateArgs) -> Result<(), u8> {
    let source = load_source_auto(&args.source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let resolution = resolve_all(&source, &args.options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let mut document = match &args.base {
        Some(path) => Document::load(path).map_err(|e| document_error("loading base document", &e))?,
        None => Document::new("API", "1.0.0"),
    };
    if let Some(title) = args.title {
        document.info.title = title;
    }
    if let Some(version) = args.api_version {
        document.info.version = version;
    }

    let added = document
        .add_schemas(&resolution.schemas)
        .map_err(|e| document_error("adding schemas", &e))?;
    tracing::info!(
        schemas = added,
        warnings = resolution.diagnostics.len(),
        "declarations resolved"
    );

    if args.validate {
        if let Err(e) = document.validate() {
            if let DocumentError::Invalid { errors } = &e {
                eprintln!("Generated document failed validation:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            } else {
                eprintln!("Error: {}", e);
            }
            return Err(e.exit_code() as u8);
        }
    }

    let encoded = match args.format {
        OutputFormat::Json => document.to_json(args.pretty),
        OutputFormat::Yaml => document.to_yaml(),
    }
    .map_err(|e| document_error("serializing output", &e))?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &encoded).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            if encoded.ends_with('\n') {
                print!("{}", encoded);
            } else {
                println!("{}", encoded);
            }
        }
    }

    Ok(())
}

fn document_error(context: &str, e: &DocumentError) -> u8 {
    eprintln!("Error {}: {}", context, e);
    e.exit_code() as u8
}

fn run_validate(path: &Path, json_output: bool) -> Result<(), u8> {
    let document = load_value(path).map_err(|e| {
        report_error(json_output, &format!("loading document: {}", e));
        e.exit_code() as u8
    })?;

    match validate_document(&document) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(DocumentError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, &ResolveOptions::default(), strict);

    if format == "json" {
        let output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color,
                        label,
                        diag.code,
                        diag.location(),
                        diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
