//! Command-line interface implementation for batchwork.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, CommandFactory, Parser};
use std::path::PathBuf;

/// Command-line arguments structure for batchwork.
#[derive(Parser, Debug)]
#[command(author, version, about = "batchwork: run batch file-processing action trees", long_about = None)]
pub struct Args {
    /// Path to the action configuration (JSON or YAML)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Working path used by nodes that do not set one
    #[arg(short, long, value_name = "DIR")]
    pub working_path: Option<PathBuf>,

    /// Variable visible to conditions. Values are read as JSON when they
    /// parse as JSON and as plain strings otherwise.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, serde_json::Value)>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Load the configuration and print the resulting tree instead of running it
    #[arg(long)]
    pub print_tree: bool,
}

/// Parses one `NAME=VALUE` pair.
pub fn parse_var(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{}'", raw));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
