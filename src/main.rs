//! DFL query engine CLI.
//!
//! Reads a single DFL source file (§6: attack tree, fault tree, object graph, and formulas
//! sections) and runs its queries in order, printing each query's reconstructed text alongside
//! its boolean, probability, or risk-optimization outcome.

use dfl_query_engine::error::DflError;
use dfl_query_engine::io::load_source_file;
use dfl_query_engine::model::ModelStore;
use dfl_query_engine::query::run_query;
use dfl_query_engine::result_print::{print_error, print_result};

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Structure to collect CLI arguments
#[derive(Parser)]
#[clap(
    author = "Reach Risk Engineering",
    version,
    about = "Query engine for the DFL risk-modelling language."
)]
struct Arguments {
    /// Path to a DFL source file: attack tree, fault tree, object graph, and formulas sections.
    model_path: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Arguments::parse();

    let parsed = match load_source_file(&args.model_path) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("parse error: {e}");
            return ExitCode::from(1);
        }
    };

    let store = match ModelStore::build(parsed.attack, parsed.fault, parsed.objects) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("cross-reference error: {e}");
            return ExitCode::from(2);
        }
    };

    let mut worst_exit_code = 0;
    for query in &parsed.queries {
        match run_query(&store, query) {
            Ok(result) => print_result(query, &result),
            Err(err) => {
                print_error(query, &err);
                worst_exit_code = worst_exit_code.max(exit_code_for(&err));
            }
        }
    }

    ExitCode::from(worst_exit_code)
}

/// Maps a per-query semantic failure to the process exit code it should contribute (§6). All of
/// `DflError`'s remaining variants are cross-reference failures that can only occur at
/// `ModelStore::build` time, before the formulas loop starts, so they never reach here; see
/// [`DflError::exit_code`].
fn exit_code_for(err: &DflError) -> u8 {
    err.exit_code() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_for_a_semantic_error_is_three() {
        let err = DflError::MissingConfiguration("x".to_string());
        assert_eq!(exit_code_for(&err), 3);
    }
}
