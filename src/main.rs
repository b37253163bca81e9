use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use board_schema::entities::active_user;
use board_schema::{DbConfig, autogen, runner, views};
use clap::{Parser, Subcommand};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};
use tracing_subscriber::EnvFilter;

/// Manage the board schema: apply, revert and generate revisions.
#[derive(Parser, Debug)]
#[command(name = "board-schema", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending revisions (`head`, or `+N` for the next N).
    Upgrade {
        #[arg(default_value = "head")]
        target: String,
    },
    /// Revert applied revisions (`-1`, `N`, or `base`).
    Downgrade {
        #[arg(default_value = "-1", allow_negative_numbers = true, allow_hyphen_values = true)]
        target: String,
    },
    /// Show the revision the database is at.
    Current,
    /// List every revision, oldest first.
    History,
    /// Show which revisions are applied.
    Status,
    /// Create a new revision.
    Revision {
        #[arg(short = 'm', long = "message")]
        message: String,
        /// Fill the revision from differences between declared views and the database.
        #[arg(long)]
        autogenerate: bool,
        /// Directory containing the revision chain's mod.rs.
        #[arg(long, default_value = "src/migration")]
        dir: PathBuf,
    },
    /// Fail when declared views differ from the database.
    Check,
    /// Print the rows of the active_users view.
    ActiveUsers {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Steps {
    All,
    Count(u32),
}

fn parse_upgrade_target(target: &str) -> Result<Steps> {
    if target == "head" {
        return Ok(Steps::All);
    }
    match target.strip_prefix('+') {
        Some(n) => Ok(Steps::Count(
            n.parse().with_context(|| format!("invalid step count: {target}"))?,
        )),
        None => bail!("unsupported upgrade target {target:?}, expected `head` or `+N`"),
    }
}

fn parse_downgrade_target(target: &str) -> Result<Steps> {
    if target == "base" {
        return Ok(Steps::All);
    }
    let digits = target.strip_prefix('-').unwrap_or(target);
    let n = digits
        .parse()
        .with_context(|| format!("unsupported downgrade target {target:?}, expected `-N` or `base`"))?;
    Ok(Steps::Count(n))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DbConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let db = config.connect().await?;
    match cli.command {
        Commands::Upgrade { target } => {
            let applied = match parse_upgrade_target(&target)? {
                Steps::All => runner::upgrade_to_head(&db).await?,
                Steps::Count(n) => runner::upgrade(&db, Some(n)).await?,
            };
            for revision in applied {
                println!("Running upgrade -> {}, {}", revision.id, revision.message);
            }
        }
        Commands::Downgrade { target } => {
            let reverted = match parse_downgrade_target(&target)? {
                Steps::All => runner::downgrade_to_base(&db).await?,
                Steps::Count(n) => runner::downgrade(&db, n).await?,
            };
            for revision in reverted {
                println!(
                    "Running downgrade {} -> {}, {}",
                    revision.id,
                    revision.down_revision.unwrap_or("<base>"),
                    revision.message
                );
            }
        }
        Commands::Current => match runner::current(&db).await? {
            Some(revision) if is_head(revision.id) => println!("{} (head)", revision.id),
            Some(revision) => println!("{}", revision.id),
            None => println!("<base>"),
        },
        Commands::History => {
            for revision in runner::history().iter().rev() {
                println!(
                    "{} -> {}, {}",
                    revision.down_revision.unwrap_or("<base>"),
                    revision.id,
                    revision.message
                );
            }
        }
        Commands::Status => {
            for entry in runner::status(&db).await? {
                let mark = if entry.applied { "applied" } else { "pending" };
                println!("{:<8} {} {}", mark, entry.revision.id, entry.revision.message);
            }
        }
        Commands::Revision {
            message,
            autogenerate,
            dir,
        } => {
            let generated =
                autogen::generate_revision(&db, &dir, &message, autogenerate, &views::registered())
                    .await?;
            match generated {
                Some(revision) => println!(
                    "Generating {} ... done\n  Revision ID: {}\n  Message: {}",
                    revision.path.display(),
                    revision.id,
                    revision.message
                ),
                None => println!("No changes detected."),
            }
        }
        Commands::Check => {
            let changes = autogen::detect_view_changes(&db, &views::registered()).await?;
            if !changes.is_empty() {
                for change in &changes {
                    println!("view {} differs from its declaration", change.view().name);
                }
                bail!("{} view(s) need a new revision", changes.len());
            }
            println!("No changes detected.");
        }
        Commands::ActiveUsers { json } => print_active_users(&db, json).await?,
    }
    Ok(())
}

fn is_head(id: &str) -> bool {
    runner::history().last().is_some_and(|r| r.id == id)
}

async fn print_active_users(db: &DatabaseConnection, json: bool) -> Result<()> {
    let rows = active_user::Entity::find()
        .order_by_asc(active_user::Column::Id)
        .all(db)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Found {} active users:", rows.len());
    for user in rows {
        println!("Username: {}", user.username);
        println!("Email: {}", user.email);
        println!("Post Count: {}", user.post_count);
        match user.last_post_date {
            Some(date) => println!("Last Post Date: {date}"),
            None => println!("Last Post Date: -"),
        }
        println!("{}", "-".repeat(30));
    }
    Ok(())
}
