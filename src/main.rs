//! Gitlite - a small content-addressed version-control system
//!
//! This is the main entry point for the gitlite command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gitlite::repo::{MergeOutcome, RepoError, RepoResult, Repository, RepositoryConfig};

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "GITLITE_LOG";

/// A tiny version-control system.
#[derive(Parser, Debug)]
#[command(name = "gitlite", version, about = "A tiny version-control system")]
struct Cli {
    /// Working directory of the repository.
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    dir: PathBuf,

    /// Log operations to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new repository in the working directory.
    Init,
    /// Stage a file for the next commit.
    Add { file: String },
    /// Record the staged changes as a new commit.
    Commit { message: String },
    /// Unstage a file, or stage a tracked file for removal.
    Rm { file: String },
    /// Show first-parent history of the current branch.
    Log,
    /// Show every commit ever made.
    GlobalLog,
    /// Print ids of commits with the given message.
    Find { message: String },
    /// Show branches, staged files and working-tree changes.
    Status,
    /// `checkout <branch>`, `checkout -- <file>` or `checkout <commit> -- <file>`.
    Checkout {
        target: Option<String>,
        #[arg(last = true)]
        file: Option<String>,
    },
    /// Create a branch at the current head.
    Branch { name: String },
    /// Delete a branch pointer.
    RmBranch { name: String },
    /// Move the current branch to a commit.
    Reset { commit: String },
    /// Merge a branch into the current one.
    Merge { branch: String },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_error(e),
    };

    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        println!("Please enter a command.");
        return ExitCode::SUCCESS;
    };

    let config = RepositoryConfig::new(&cli.dir);
    match run(config, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_user_error() => {
            println!("{}", e);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Map clap's parse failures onto the command-line contract.
fn usage_error(e: clap::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::InvalidSubcommand => {
            println!("No command with that name exists.");
            ExitCode::SUCCESS
        }
        ErrorKind::MissingRequiredArgument
        | ErrorKind::UnknownArgument
        | ErrorKind::WrongNumberOfValues
        | ErrorKind::TooManyValues
        | ErrorKind::TooFewValues => {
            println!("{}", RepoError::IncorrectOperands);
            ExitCode::SUCCESS
        }
        _ => e.exit(),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: RepositoryConfig, command: Commands) -> RepoResult<()> {
    let mut repo = match command {
        Commands::Init => {
            Repository::init(config)?;
            return Ok(());
        }
        _ => Repository::open(config)?,
    };

    match command {
        Commands::Init => {}
        Commands::Add { file } => repo.add(&file)?,
        Commands::Commit { message } => {
            repo.commit(&message)?;
        }
        Commands::Rm { file } => repo.rm(&file)?,
        Commands::Log => {
            for entry in repo.log()? {
                print!("{}", entry);
            }
        }
        Commands::GlobalLog => {
            for entry in repo.global_log()? {
                print!("{}", entry);
            }
        }
        Commands::Find { message } => {
            for id in repo.find(&message)? {
                println!("{}", id);
            }
        }
        Commands::Status => print!("{}", repo.status()?),
        Commands::Checkout { target, file } => match (target, file) {
            (Some(branch), None) => repo.checkout_branch(&branch)?,
            (None, Some(file)) => repo.checkout_file(&file)?,
            (Some(commit), Some(file)) => repo.checkout_commit_file(&commit, &file)?,
            (None, None) => return Err(RepoError::IncorrectOperands),
        },
        Commands::Branch { name } => repo.branch(&name)?,
        Commands::RmBranch { name } => repo.rm_branch(&name)?,
        Commands::Reset { commit } => {
            repo.reset(&commit)?;
        }
        Commands::Merge { branch } => match repo.merge(&branch)? {
            MergeOutcome::FastForwarded { .. } => println!("Current branch fast-forwarded."),
            outcome if outcome.has_conflicts() => println!("Encountered a merge conflict."),
            MergeOutcome::Merged { .. } => {}
        },
    }
    Ok(())
}
