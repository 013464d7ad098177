//! `generate`: build the model and write the selected artifacts.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use idlgen_core::{
    AppOptions, BuildConfig, EmitOptions, EmitterKind, EmitterSelection, LoaderConfig, ReferencePolicy, generate_all,
};
use tracing::info;

use crate::config::{self, GenerateConfig};
use crate::input::Input;
use crate::run_command;
use crate::writer::{DryRunWriter, Formatter, FsWriter, WritePolicy, write_all};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "lower")]
pub enum EmitArg {
    /// pydantic models, one module per structure
    Types,
    /// FastAPI contract, handlers and routes
    Service,
    /// httpx client
    Client,
}

impl From<EmitArg> for EmitterKind {
    fn from(arg: EmitArg) -> Self {
        match arg {
            EmitArg::Types => EmitterKind::Types,
            EmitArg::Service => EmitterKind::Service,
            EmitArg::Client => EmitterKind::Client,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Directory of IDL source files
    #[arg(long, value_name = "DIR", conflicts_with = "document")]
    pub source: Option<PathBuf>,

    /// JSON model document instead of IDL sources
    #[arg(long, value_name = "FILE")]
    pub document: Option<PathBuf>,

    /// Dotted Python package for the generated code
    #[arg(long, value_name = "NAME")]
    pub module: Option<String>,

    /// Application name used for router tags and the client user agent
    #[arg(long, value_name = "NAME")]
    pub app: Option<String>,

    /// Root directory the package is written under
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Emitters to run (repeatable). Defaults to all of them
    #[arg(long = "emit", value_enum, value_name = "EMITTER")]
    pub emit: Vec<EmitArg>,

    /// Overwrite existing files
    #[arg(long, conflicts_with = "skip_existing")]
    pub force: bool,

    /// Leave existing files untouched
    #[arg(long)]
    pub skip_existing: bool,

    /// Fail on references to undefined shapes or operations
    #[arg(long)]
    pub strict: bool,

    /// Print diffs instead of writing files
    #[arg(long)]
    pub dry_run: bool,

    /// Formatter command run on each written file, e.g. "ruff format"
    #[arg(long, value_name = "CMD")]
    pub formatter: Option<String>,

    /// Config file (defaults to ./idlgen.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Flags merged over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateSettings {
    pub input: Input,
    pub loader: LoaderConfig,
    pub build: BuildConfig,
    pub options: AppOptions,
    pub selection: EmitterSelection,
    pub policy: WritePolicy,
    pub formatter: Option<Formatter>,
    pub dry_run: bool,
}

impl GenerateSettings {
    pub fn resolve(args: GenerateArgs, file: GenerateConfig) -> Result<Self, String> {
        // A flag for either input replaces both config entries.
        let (source, document) = if args.source.is_some() || args.document.is_some() {
            (args.source, args.document)
        } else {
            (file.source, file.document)
        };
        let input = Input::select(source, document)?;

        let module = args
            .module
            .or(file.module)
            .ok_or_else(|| "Missing --module (or `module` in the config file)".to_string())?;
        let app = args
            .app
            .or(file.app)
            .ok_or_else(|| "Missing --app (or `app` in the config file)".to_string())?;
        let output = args
            .output
            .or(file.output)
            .ok_or_else(|| "Missing --output (or `output` in the config file)".to_string())?;

        let selection = if args.emit.is_empty() {
            match file.emit {
                Some(kinds) if !kinds.is_empty() => kinds.into_iter().collect(),
                _ => EmitterSelection::all(),
            }
        } else {
            args.emit.into_iter().map(EmitterKind::from).collect()
        };

        let policy = if args.force {
            WritePolicy::Overwrite
        } else if args.skip_existing {
            WritePolicy::SkipExisting
        } else {
            match (file.force, file.skip_existing) {
                (Some(true), Some(true)) => {
                    return Err("`force` and `skip-existing` cannot both be set in the config file".to_string());
                }
                (Some(true), _) => WritePolicy::Overwrite,
                (_, Some(true)) => WritePolicy::SkipExisting,
                _ => WritePolicy::Fail,
            }
        };

        let strict = args.strict || file.strict.unwrap_or(false);
        let loader = file
            .extensions
            .map_or_else(LoaderConfig::default, |extensions| LoaderConfig { extensions });

        Ok(Self {
            input,
            loader,
            build: BuildConfig {
                references: if strict {
                    ReferencePolicy::Strict
                } else {
                    ReferencePolicy::Lenient
                },
            },
            options: AppOptions::new(EmitOptions::new(module, output), app),
            selection,
            policy,
            formatter: args
                .formatter
                .or(file.formatter)
                .as_deref()
                .and_then(Formatter::parse),
            dry_run: args.dry_run,
        })
    }
}

pub fn run(args: GenerateArgs) -> i32 {
    run_command(|| run_inner(args))
}

fn run_inner(args: GenerateArgs) -> Result<(), String> {
    let file = config::load(args.config.as_deref())?;
    let settings = GenerateSettings::resolve(args, file.generate)?;

    let model = settings.input.model(&settings.loader, &settings.build)?;
    let artifacts = generate_all(&model, &settings.options, settings.selection).into_vec();
    info!(count = artifacts.len(), "Writing artifacts.");

    let report = if settings.dry_run {
        let mut writer = DryRunWriter::new(settings.policy).with_formatter(settings.formatter);
        let report = write_all(&mut writer, &artifacts);
        print!("{}", writer.output());
        report
    } else {
        let mut writer = FsWriter::new(settings.policy).with_formatter(settings.formatter);
        write_all(&mut writer, &artifacts)
    };

    for failure in &report.failures {
        eprintln!("error: {failure}");
    }
    println!("{}", report.summary());
    if report.is_success() {
        Ok(())
    } else {
        Err(format!("{} artifact(s) could not be written", report.failures.len()))
    }
}
