//! gbq-objects - list, read and write Cloud Storage objects

use anyhow::Result;
use clap::{Parser, Subcommand};
use gbq_common::logging::{init_logging, LogConfig, LogLevel};
use gbq_storage::{cli, config::StorageConfig, GcsObjectStore, DEFAULT_BUCKET};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "gbq-objects")]
#[command(author, version, about = "List, read and write objects in a Cloud Storage bucket")]
struct Cli {
    /// Defaults to listing the default bucket
    #[command(subcommand)]
    command: Option<Command>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every object name in a bucket
    List {
        #[arg(short, long, default_value = DEFAULT_BUCKET)]
        bucket: String,
    },

    /// Print the contents of an object
    Read { bucket: String, object: String },

    /// Write text to an object, replacing it if it exists
    Write {
        bucket: String,
        object: String,

        #[arg(short, long, default_value = "Hello world")]
        contents: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if args.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .log_file_prefix("gbq-objects")
        .filter_directives("aws_smithy_runtime=warn,aws_config=warn")
        .build();
    let _guard = init_logging(&LogConfig::from_env_or(log_config)?)?;

    let store = GcsObjectStore::new(StorageConfig::from_env()?).await?;
    debug!(?args, "Running command");

    let mut stdout = std::io::stdout().lock();
    match args.command.unwrap_or(Command::List {
        bucket: DEFAULT_BUCKET.to_string(),
    }) {
        Command::List { bucket } => {
            cli::list(&store, &bucket, &mut stdout).await?;
        },
        Command::Read { bucket, object } => {
            cli::read(&store, &bucket, &object, &mut stdout).await?;
        },
        Command::Write {
            bucket,
            object,
            contents,
        } => {
            cli::write(&store, &bucket, &object, &contents).await?;
        },
    }

    Ok(())
}
