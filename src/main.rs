use crate::areas::repository::Repository;
use crate::commands::porcelain::reset::ResetMode;
use crate::commands::porcelain::show::DiffFormat;
use crate::errors::{EXIT_FATAL, RvsError};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod areas;
mod artifacts;
mod commands;
mod errors;

#[derive(Parser)]
#[command(
    name = "rvs",
    version,
    about = "A local, Git-compatible version control engine",
    long_about = "RVS records snapshots of a working directory into an immutable \
    content-addressed object store, maintains branches and HEAD over that store, \
    and reconciles working tree, index and history on command."
)]
struct Cli {
    /// Repository path (default: discover from the current directory)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty repository or reinitialize an existing one
    Init {
        /// Directory to initialize (default: current directory)
        path: Option<PathBuf>,
    },
    /// Add file contents to the index
    Add {
        /// Files or directories to stage; `.` stages everything
        #[arg(required = true)]
        pathspecs: Vec<String>,
    },
    /// Record changes to the repository
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
        /// Allow a commit that records no changes
        #[arg(long)]
        allow_empty: bool,
    },
    /// Show the working tree status
    Status {
        /// Short two-column format
        #[arg(short, long)]
        short: bool,
    },
    /// Show commit logs
    Log {
        /// One line per commit
        #[arg(long)]
        oneline: bool,
        /// Limit the number of commits
        #[arg(short = 'n', long = "max-count")]
        max_count: Option<usize>,
    },
    /// Show a commit with its diff against the first parent
    Show {
        /// Revision to show (default: HEAD)
        rev: Option<String>,
        /// Show only names of changed files
        #[arg(long, conflicts_with_all = ["name_status", "stat"])]
        name_only: bool,
        /// Show names and change status
        #[arg(long, conflicts_with = "stat")]
        name_status: bool,
        /// Show a diffstat summary
        #[arg(long)]
        stat: bool,
    },
    /// Show changes between commits, index and working tree
    Diff {
        /// Compare the index against HEAD instead of the working tree
        #[arg(long)]
        cached: bool,
        /// Compare the working tree against this revision
        rev: Option<String>,
        /// Limit the diff to these paths
        #[arg(last = true)]
        paths: Vec<String>,
    },
    /// Compare a commit's tree with its first parent
    DiffTree {
        /// Suppress the leading commit id line
        #[arg(long)]
        no_commit_id: bool,
        /// Show names and change status instead of the raw format
        #[arg(long)]
        name_status: bool,
        /// Recurse into subtrees
        #[arg(short = 'r')]
        recursive: bool,
        /// Revision to inspect
        rev: String,
    },
    /// Reset HEAD to a revision
    Reset {
        /// Move HEAD only
        #[arg(long, conflicts_with_all = ["mixed", "hard"])]
        soft: bool,
        /// Also rewrite the index (default)
        #[arg(long, conflicts_with = "hard")]
        mixed: bool,
        /// Also rewrite the working tree
        #[arg(long)]
        hard: bool,
        /// Target revision (default: HEAD)
        rev: Option<String>,
    },
    /// List, create or delete branches
    Branch {
        /// Delete a fully merged branch
        #[arg(short = 'd', conflicts_with = "force_delete")]
        delete: bool,
        /// Delete a branch regardless of merge status
        #[arg(short = 'D')]
        force_delete: bool,
        /// Branch name to create or delete
        name: Option<String>,
        /// Start point for a new branch (default: HEAD)
        start_point: Option<String>,
    },
    /// Switch branches or restore working tree files
    Checkout {
        /// Branch or revision to check out, or the start point with -b
        target: Option<String>,
        /// Create a new branch and switch to it
        #[arg(short = 'b', conflicts_with = "force_new_branch")]
        new_branch: Option<String>,
        /// Create or reset a branch and switch to it
        #[arg(short = 'B')]
        force_new_branch: Option<String>,
        /// Detach HEAD at the target revision
        #[arg(long)]
        detach: bool,
        /// Restore these paths instead of switching
        #[arg(last = true)]
        paths: Vec<String>,
    },
    /// Switch to an existing branch
    Switch {
        /// Branch to switch to
        branch: Option<String>,
        /// Create the branch first
        #[arg(short = 'c', long = "create")]
        create: Option<String>,
    },
    /// Join another history into the current branch
    Merge {
        /// Revision to merge
        rev: String,
    },
    /// Reapply local commits on top of another base tip
    Rebase {
        /// Upstream revision to rebase onto
        upstream: String,
    },
    /// Restore working tree or index files
    Restore {
        /// Tree-ish to restore from
        #[arg(long)]
        source: Option<String>,
        /// Restore the index instead of the working tree
        #[arg(long)]
        staged: bool,
        /// Paths to restore
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Remove files from the working tree and the index
    Rm {
        /// Remove from the index only
        #[arg(long)]
        cached: bool,
        /// Override the up-to-date check
        #[arg(short, long)]
        force: bool,
        /// Paths to remove
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Move or rename a tracked file
    Mv {
        source: String,
        destination: String,
    },
    /// Show information about files in the index
    LsFiles,
    /// List the contents of a tree object
    LsTree {
        /// Recurse into subtrees
        #[arg(short = 'r')]
        recursive: bool,
        /// Revision whose tree to list
        rev: String,
    },
    /// Manage multiple working trees
    Worktree {
        #[command(subcommand)]
        command: WorktreeCommands,
    },
    /// Stash changes in a dirty working directory
    Stash {
        #[command(subcommand)]
        command: Option<StashCommands>,
    },
}

#[derive(Subcommand)]
enum WorktreeCommands {
    /// Create a new working tree
    Add {
        /// Path for the new working tree
        path: String,
        /// Branch or revision to check out (default: HEAD)
        start_point: Option<String>,
    },
    /// List details of each working tree
    List,
    /// Remove a working tree
    Remove {
        path: String,
        /// Remove even when locked
        #[arg(short, long)]
        force: bool,
    },
    /// Lock a working tree against removal
    Lock {
        path: String,
        /// Reason for locking
        #[arg(long)]
        reason: Option<String>,
    },
    /// Unlock a working tree
    Unlock { path: String },
    /// Drop registrations of deleted working trees
    Prune,
}

#[derive(Subcommand)]
enum StashCommands {
    /// Save local changes and reset to HEAD
    Push {
        /// Stash message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Apply and drop the newest stash
    Pop {
        /// Stash position (default: 0)
        stash: Option<usize>,
    },
    /// Apply a stash without dropping it
    Apply {
        /// Stash position (default: 0)
        stash: Option<usize>,
    },
    /// List stash entries
    List,
    /// Drop a stash entry
    Drop {
        /// Stash position (default: 0)
        stash: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => {}
        Err(error) => {
            let known = error
                .chain()
                .find_map(|cause| cause.downcast_ref::<RvsError>());

            match known {
                Some(rvs_error) => {
                    if !rvs_error.already_reported() {
                        match rvs_error {
                            RvsError::Usage(message) => eprintln!("{}", message),
                            other if other.exit_code() == EXIT_FATAL => {
                                eprintln!("fatal: {}", other)
                            }
                            other => eprintln!("error: {}", other),
                        }
                    }
                    std::process::exit(rvs_error.exit_code());
                }
                None => {
                    eprintln!("fatal: {:#}", error);
                    std::process::exit(EXIT_FATAL);
                }
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { path } = &cli.command {
        let root = match (path, &cli.repo) {
            (Some(path), _) => path.clone(),
            (None, Some(repo)) => repo.clone(),
            (None, None) => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        return Repository::init_at(&root, &mut std::io::stdout());
    }

    let repository = open_repository(cli.repo.as_deref())?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Add { pathspecs } => repository.add(&pathspecs),
        Commands::Commit {
            message,
            allow_empty,
        } => repository.commit(message.as_deref().unwrap_or(""), allow_empty),
        Commands::Status { short } => repository.status(short),
        Commands::Log { oneline, max_count } => repository.log(oneline, max_count),
        Commands::Show {
            rev,
            name_only,
            name_status,
            stat,
        } => {
            let format = if name_only {
                DiffFormat::NameOnly
            } else if name_status {
                DiffFormat::NameStatus
            } else if stat {
                DiffFormat::Stat
            } else {
                DiffFormat::Patch
            };
            repository.show(rev.as_deref().unwrap_or("HEAD"), format)
        }
        Commands::Diff { cached, rev, paths } => {
            repository.diff(cached, rev.as_deref(), &paths)
        }
        Commands::DiffTree {
            no_commit_id,
            name_status,
            recursive,
            rev,
        } => repository.diff_tree(&rev, recursive, name_status, no_commit_id),
        Commands::Reset {
            soft,
            mixed: _,
            hard,
            rev,
        } => {
            let mode = if soft {
                ResetMode::Soft
            } else if hard {
                ResetMode::Hard
            } else {
                ResetMode::Mixed
            };
            repository.reset(mode, rev.as_deref().unwrap_or("HEAD"))
        }
        Commands::Branch {
            delete,
            force_delete,
            name,
            start_point,
        } => match (delete || force_delete, name) {
            (true, Some(name)) => repository.branch_delete(&name, force_delete),
            (true, None) => anyhow::bail!(RvsError::Usage(
                "branch name required".to_string()
            )),
            (false, Some(name)) => repository.branch_create(&name, start_point.as_deref()),
            (false, None) => repository.branch_list(),
        },
        Commands::Checkout {
            target,
            new_branch,
            force_new_branch,
            detach,
            paths,
        } => {
            if !paths.is_empty() {
                repository.checkout_paths(target.as_deref(), &paths)
            } else if let Some(name) = new_branch {
                repository.checkout_new_branch(&name, target.as_deref(), false)
            } else if let Some(name) = force_new_branch {
                repository.checkout_new_branch(&name, target.as_deref(), true)
            } else if detach {
                let target = target.ok_or_else(|| {
                    RvsError::Usage("--detach requires a revision".to_string())
                })?;
                repository.checkout_detach(&target)
            } else {
                let target = target.ok_or_else(|| {
                    RvsError::Usage("you must specify a branch or revision".to_string())
                })?;
                repository.checkout(&target)
            }
        }
        Commands::Switch { branch, create } => match (branch, create) {
            (_, Some(name)) => repository.switch_create(&name),
            (Some(name), None) => repository.switch(&name),
            (None, None) => anyhow::bail!(RvsError::Usage(
                "missing branch or commit argument".to_string()
            )),
        },
        Commands::Merge { rev } => repository.merge(&rev),
        Commands::Rebase { upstream } => repository.rebase(&upstream),
        Commands::Restore {
            source,
            staged,
            paths,
        } => repository.restore(source.as_deref(), staged, &paths),
        Commands::Rm {
            cached,
            force,
            paths,
        } => repository.rm(&paths, cached, force),
        Commands::Mv {
            source,
            destination,
        } => repository.mv(&source, &destination),
        Commands::LsFiles => repository.ls_files(),
        Commands::LsTree { recursive, rev } => repository.ls_tree(&rev, recursive),
        Commands::Worktree { command } => match command {
            WorktreeCommands::Add { path, start_point } => {
                repository.worktree_add(&path, start_point.as_deref())
            }
            WorktreeCommands::List => repository.worktree_list(),
            WorktreeCommands::Remove { path, force } => {
                repository.worktree_remove(&path, force)
            }
            WorktreeCommands::Lock { path, reason } => {
                repository.worktree_lock(&path, reason.as_deref())
            }
            WorktreeCommands::Unlock { path } => repository.worktree_unlock(&path),
            WorktreeCommands::Prune => repository.worktree_prune(),
        },
        Commands::Stash { command } => match command.unwrap_or(StashCommands::Push {
            message: None,
        }) {
            StashCommands::Push { message } => repository.stash_push(message.as_deref()),
            StashCommands::Pop { stash } => repository.stash_pop(stash.unwrap_or(0)),
            StashCommands::Apply { stash } => repository.stash_apply(stash.unwrap_or(0)),
            StashCommands::List => repository.stash_list(),
            StashCommands::Drop { stash } => repository.stash_drop(stash.unwrap_or(0)),
        },
    }
}

fn open_repository(repo: Option<&Path>) -> Result<Repository> {
    let writer = Box::new(std::io::stdout());

    match repo {
        Some(path) => {
            let path = path
                .canonicalize()
                .map_err(|_| RvsError::NotARepository)?;
            Repository::open(&path, writer)
        }
        None => Repository::discover(writer),
    }
}
