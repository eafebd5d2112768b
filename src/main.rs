//! batchwork's command-line entry point.
//! Builds a root `Batch` node around the given configuration and runs it.

use log::info;
use std::path::{Path, PathBuf};

use batchwork::{
    cli::{get_args, Args},
    engine::Engine,
    error::{default_error_handler, Result},
    logger::init_logger,
    session::RunReport,
    tree::{ActionNode, ActionTree},
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    match run(args) {
        Ok(report) if !report.is_success() => std::process::exit(1),
        Ok(_) => {}
        Err(err) => default_error_handler(err),
    }
}

fn absolute<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Builds the root node, then either prints the loaded tree or runs it.
fn run(args: Args) -> Result<RunReport> {
    let config = absolute(&args.config)?;

    let mut root = ActionNode::new("Batch");
    root.config_filename = config.display().to_string();
    if let Some(working_path) = &args.working_path {
        root.working_path = absolute(working_path)?.display().to_string();
    }
    let mut tree = ActionTree::new(root);

    if args.print_tree {
        let root = tree.root();
        tree.load_into(root, &config)?;
        println!("{}", serde_json::to_string_pretty(&tree.to_item(root))?);
        return Ok(RunReport::default());
    }

    let mut engine = Engine::new(tree);
    for (name, value) in args.vars {
        engine.set_variable(name, value);
    }

    let report = engine.run();
    info!(
        "Finished '{}' with {} failure(s){}",
        config.display(),
        report.failures,
        if report.stopped { ", stopped early" } else { "" }
    );
    Ok(report)
}
