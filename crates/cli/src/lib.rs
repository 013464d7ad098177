#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

pub mod config;
pub mod generate;
pub mod input;
pub mod inspect;
pub mod writer;

/// Tracing target prefix shared by every idlgen crate.
const LOG_TARGET: &str = "idlgen";
const LOG_ENV: &str = "IDLGEN_LOG";

#[derive(Parser)]
#[command(
    name = "idlgen",
    version,
    about = "Generate pydantic models, a FastAPI service layer and an httpx client from Smithy IDL"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Python sources from a model
    Generate(generate::GenerateArgs),
    /// Print the built model as JSON
    Inspect(inspect::InspectArgs),
}

/// Entry point shared by the binary and tests. Returns the process exit code.
pub fn run(args: Vec<String>) -> i32 {
    init_tracing();
    match Cli::try_parse_from(args) {
        Ok(cli) => match cli.command {
            Some(Commands::Generate(args)) => generate::run(args),
            Some(Commands::Inspect(args)) => inspect::run(args),
            None => {
                let mut cmd = Cli::command();
                let _ = cmd.print_help();
                println!();
                0
            }
        },
        Err(e) => {
            let code = e.exit_code();
            let _ = e.print();
            code
        }
    }
}

pub(crate) fn run_command<F>(f: F) -> i32
where
    F: FnOnce() -> Result<(), String>,
{
    match f() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

fn init_tracing() {
    // IDLGEN_LOG is either a plain level or a full filter spec such as
    // "idlgen_core::loader=debug,idlgen=info".
    let filter = match std::env::var(LOG_ENV) {
        Ok(level) if is_plain_level(&level) => format!("{LOG_TARGET}={level}"),
        Ok(spec) => spec,
        Err(_) => format!("{LOG_TARGET}=info"),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::new(filter));

    // Already installed when `run` is called more than once in a process.
    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}

fn is_plain_level(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("idlgen")
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }

    const SOURCE: &str = r#"namespace example.todo

service TodoService {
    operations: [AddTodo]
}

@http(method: "POST", uri: "/todos", code: 201)
operation AddTodo {
    input: AddTodoInput
    output: Todo
}

structure AddTodoInput {
    @required
    title: String
}

structure Todo {
    @required
    id: String

    title: String
}
"#;

    #[test]
    fn test_plain_levels() {
        assert!(is_plain_level("DEBUG"));
        assert!(!is_plain_level("idlgen=debug"));
    }

    #[test]
    fn test_generate_writes_every_artifact() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("model");
        fs::create_dir(&model).unwrap();
        fs::write(model.join("todo.smithy"), SOURCE).unwrap();
        let out = dir.path().join("out");

        let args = argv(&[
            "generate",
            "--source",
            model.to_str().unwrap(),
            "--module",
            "todo_api",
            "--app",
            "todo",
            "--output",
            out.to_str().unwrap(),
        ]);
        assert_eq!(run(args.clone()), 0);

        let package = out.join("todo_api");
        assert!(package.join("models/add_todo_input.py").is_file());
        assert!(package.join("models/todo.py").is_file());
        assert!(package.join("api/todo_service_contract.py").is_file());
        assert!(package.join("api/todo_service_handlers.py").is_file());
        assert!(package.join("api/todo_service_routes.py").is_file());
        assert!(package.join("client/todo_service_client.py").is_file());

        // A second identical run leaves everything unchanged and succeeds.
        assert_eq!(run(args), 0);
    }

    #[test]
    fn test_generate_fails_on_conflict_without_force() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("model");
        fs::create_dir(&model).unwrap();
        fs::write(model.join("todo.smithy"), SOURCE).unwrap();
        let out = dir.path().join("out");
        let target = out.join("todo_api/models/todo.py");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "# hand edited\n").unwrap();

        let base = [
            "generate",
            "--source",
            model.to_str().unwrap(),
            "--module",
            "todo_api",
            "--app",
            "todo",
            "--output",
            out.to_str().unwrap(),
            "--emit",
            "types",
        ];
        assert_eq!(run(argv(&base)), 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "# hand edited\n");
        // The other model is still written.
        assert!(out.join("todo_api/models/add_todo_input.py").is_file());

        let mut forced = base.to_vec();
        forced.push("--force");
        assert_eq!(run(argv(&forced)), 0);
        assert!(fs::read_to_string(&target).unwrap().contains("class Todo(BaseModel):"));
    }

    #[test]
    fn test_generate_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.smithy"), "namespace x\nstructure {\n").unwrap();
        let args = argv(&[
            "generate",
            "--source",
            dir.path().to_str().unwrap(),
            "--module",
            "m",
            "--app",
            "a",
            "--output",
            dir.path().join("out").to_str().unwrap(),
        ]);
        assert_eq!(run(args), 1);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_conflicting_flags_are_rejected() {
        let code = run(argv(&["generate", "--source", "a", "--document", "b"]));
        assert_eq!(code, 2);
    }
}
