//! Entity Schema CLI
//!
//! Command-line interface for inspecting schema families and validating or
//! projecting payloads with an entity factory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use entity_schema::{
    lint, load_definition, load_json, Collection, CollectionFactory, Entity, EntityError,
    EntityFactory, FactoryOptions, FileStatus, LintResult, Severity, DEFAULT_CONTEXT,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "entity-schema")]
#[command(about = "Resolve schema contexts and validate entity payloads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved schema family of a definition
    Resolve {
        /// Definition file
        definition: PathBuf,

        /// Only print this context
        #[arg(long, short)]
        context: Option<String>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Build an entity (or a collection for array payloads) and validate it
    Validate {
        /// Payload file to validate
        payload: PathBuf,

        /// Definition file
        #[arg(long, short)]
        definition: PathBuf,

        /// Context to validate in
        #[arg(long, short, default_value = DEFAULT_CONTEXT)]
        context: String,

        /// Do not apply schema defaults
        #[arg(long)]
        ignore_defaults: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Build an entity (or a collection for array payloads) and print its projection
    Project {
        /// Payload file to project
        payload: PathBuf,

        /// Definition file
        #[arg(long, short)]
        definition: PathBuf,

        /// Context to project with
        #[arg(long, short, default_value = DEFAULT_CONTEXT)]
        context: String,

        /// Do not apply schema defaults
        #[arg(long)]
        ignore_defaults: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Lint definition files for errors and suspicious contexts
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
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Resolve {
            definition,
            context,
            output,
            pretty,
        } => run_resolve(&definition, context.as_deref(), output, pretty),

        Commands::Validate {
            payload,
            definition,
            context,
            ignore_defaults,
            json,
        } => run_validate(&payload, &definition, &context, ignore_defaults, json),

        Commands::Project {
            payload,
            definition,
            context,
            ignore_defaults,
            pretty,
        } => run_project(&payload, &definition, &context, ignore_defaults, pretty),

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

/// A payload built into either one entity or a collection of them.
enum Instance {
    One(Entity),
    Many(Collection),
}

impl Instance {
    fn to_json(&self, context: &str) -> Result<Value, EntityError> {
        match self {
            Instance::One(entity) => entity.to_json(context),
            Instance::Many(collection) => collection.to_json(context),
        }
    }

    fn validate(&self, context: &str) -> Result<(), EntityError> {
        match self {
            Instance::One(entity) => entity.validate(context).map(|_| ()),
            Instance::Many(collection) => collection.validate(context).map(|_| ()),
        }
    }
}

fn load_factory(definition: &Path) -> Result<EntityFactory, u8> {
    let definition = load_definition(definition).map_err(|e| {
        eprintln!("Error loading definition: {}", e);
        e.exit_code() as u8
    })?;
    Ok(EntityFactory::new(definition))
}

fn build_instance(
    payload_path: &Path,
    definition: &Path,
    ignore_defaults: bool,
) -> Result<Instance, u8> {
    let factory = load_factory(definition)?;
    let payload = load_json(payload_path).map_err(|e| {
        eprintln!("Error loading payload: {}", e);
        e.exit_code() as u8
    })?;

    let options = FactoryOptions::new().ignore_defaults(ignore_defaults);
    Ok(match payload {
        Value::Array(_) => {
            Instance::Many(CollectionFactory::new(factory).create_with(payload, options))
        }
        other => Instance::One(factory.create_with(other, options)),
    })
}

fn run_resolve(
    definition: &Path,
    context: Option<&str>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let factory = load_factory(definition)?;
    let family = factory.schema_family();

    let described = match context {
        Some(name) => {
            let schema = family.resolve(name).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
            entity_schema::describe_schema(schema)
        }
        None => family.describe(),
    };

    write_json(&described, output.as_deref(), pretty)
}

fn run_validate(
    payload: &Path,
    definition: &Path,
    context: &str,
    ignore_defaults: bool,
    json_output: bool,
) -> Result<(), u8> {
    let instance = build_instance(payload, definition, ignore_defaults)?;

    match instance.validate(context) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(EntityError::Validation(err)) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "error": err
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for (property, detail) in &err.details {
                    eprintln!("  {}: {}", property, detail);
                }
            }
            Err(1)
        }
        Err(e) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "error": e.to_string()
                });
                println!("{}", output);
            } else {
                eprintln!("Error: {}", e);
            }
            Err(e.exit_code() as u8)
        }
    }
}

fn run_project(
    payload: &Path,
    definition: &Path,
    context: &str,
    ignore_defaults: bool,
    pretty: bool,
) -> Result<(), u8> {
    let instance = build_instance(payload, definition, ignore_defaults)?;

    let projected = instance.to_json(context).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_json(&projected, None, pretty)
}

fn write_json(value: &Value, output: Option<&Path>, pretty: bool) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        let output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        print_lint_report(&result, path, strict, quiet);
    }

    if result.passes(strict) {
        Ok(())
    } else {
        Err(1)
    }
}

fn print_lint_report(result: &LintResult, path: &Path, strict: bool, quiet: bool) {
    if !quiet {
        println!("Linting definitions in {} ...\n", path.display());
    }

    for file_result in &result.results {
        let marker = match file_result.status {
            FileStatus::Ok => "\x1b[32m✓\x1b[0m",
            FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
            FileStatus::Error => "\x1b[31m✗\x1b[0m",
        };

        if !quiet || file_result.status != FileStatus::Ok {
            println!(
                "  {} {} ({} contexts)",
                marker,
                file_result.file.display(),
                file_result.contexts
            );
        }

        for diag in &file_result.diagnostics {
            if quiet && diag.severity != Severity::Error {
                continue;
            }
            let (color, label) = match diag.severity {
                Severity::Error => ("\x1b[31m", "error"),
                Severity::Warning => ("\x1b[33m", "warning"),
            };
            println!(
                "    {}{}[{}]\x1b[0m at {}: {}",
                color, label, diag.code, diag.path, diag.message
            );
        }
    }

    println!();
    if result.passes(strict) {
        println!(
            "\x1b[32m✓ {} definitions ({} contexts) checked, all passed\x1b[0m",
            result.files_checked, result.contexts_checked
        );
    } else {
        println!(
            "\x1b[31m✗ {} definitions ({} contexts) checked: {} failed ({} errors, {} warnings)\x1b[0m",
            result.files_checked,
            result.contexts_checked,
            result.failed,
            result.errors,
            result.warnings
        );
    }
}
