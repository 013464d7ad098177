//! `inspect`: print the normalized model as JSON.

use std::path::PathBuf;

use clap::Args;
use idlgen_core::{BuildConfig, LoaderConfig};

use crate::input::Input;
use crate::run_command;

#[derive(Args, Debug, Clone, Default)]
pub struct InspectArgs {
    /// Directory of IDL source files
    #[arg(long, value_name = "DIR", conflicts_with = "document")]
    pub source: Option<PathBuf>,

    /// JSON model document instead of IDL sources
    #[arg(long, value_name = "FILE")]
    pub document: Option<PathBuf>,

    /// Fail on references to undefined shapes or operations
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: InspectArgs) -> i32 {
    run_command(|| run_inner(args))
}

/// The built model as pretty JSON.
pub fn render(args: InspectArgs) -> Result<String, String> {
    let input = Input::select(args.source, args.document)?;
    let build = if args.strict {
        BuildConfig::strict()
    } else {
        BuildConfig::default()
    };
    let model = input.model(&LoaderConfig::default(), &build)?;
    serde_json::to_string_pretty(&model).map_err(|err| format!("Failed to serialize model: {err}"))
}

fn run_inner(args: InspectArgs) -> Result<(), String> {
    println!("{}", render(args)?);
    Ok(())
}
