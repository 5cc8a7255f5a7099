use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use errorbase_api::{
    AddErrorRequest, DeleteErrorRequest, ErrorBaseApi, SearchRequest, DEFAULT_DB_PATH,
};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "ekb")]
#[command(about = "Error knowledge base CLI")]
struct Cli {
    #[arg(long, env = "ERRORBASE_DB", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the schema and seed the placeholder record into a new database.
    Init,
    Add(AddArgs),
    Delete(IdArgs),
    Show(IdArgs),
    List,
    Search(SearchArgs),
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    error: String,
    #[arg(long)]
    description: String,
    #[arg(long)]
    solution: Option<String>,
    #[arg(long = "ticket")]
    tickets: Vec<String>,
    #[arg(long = "task")]
    tasks: Vec<String>,
}

#[derive(Debug, Args)]
struct IdArgs {
    #[arg(long)]
    uuid: String,
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[arg(long)]
    query: String,
}

fn emit_json<T>(value: &T) -> Result<()>
where
    T: Serialize,
{
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = ErrorBaseApi::new(cli.db.clone());

    match cli.command {
        Command::Init => {
            let report = api.bootstrap().with_context(|| {
                format!("failed to initialize error database at {}", cli.db.display())
            })?;
            emit_json(&serde_json::json!({
                "initialized": true,
                "seeded": report.seeded,
                "records": report.records,
            }))
        }
        Command::Add(args) => {
            let response = api.add(AddErrorRequest {
                error: Some(args.error),
                description: Some(args.description),
                solution: args.solution,
                tickets: Some(args.tickets),
                tasks: Some(args.tasks),
            })?;
            emit_json(&response)
        }
        Command::Delete(args) => {
            let response = api.delete(DeleteErrorRequest { uuid: Some(args.uuid) })?;
            emit_json(&response)
        }
        Command::Show(args) => {
            let record = api
                .get(&args.uuid)?
                .ok_or_else(|| anyhow!("error record {} not found", args.uuid))?;
            emit_json(&record)
        }
        Command::List => emit_json(&api.all()?),
        Command::Search(args) => emit_json(&api.search(SearchRequest { query: Some(args.query) })?),
    }
}
