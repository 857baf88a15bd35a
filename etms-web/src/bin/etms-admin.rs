//! ETMS administration commands
//!
//! **Usage:**
//! ```bash
//! etms-admin [--root-folder <dir>] fix-health-distribution
//! etms-admin cleanup-taxonomy [--force-all --yes]
//! etms-admin create-user --username <name> --password <pw> --role head_user
//! etms-admin delete-all-tree-data --yes
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use etms_common::config::{CliOverrides, ServiceConfig};
use etms_common::db::taxonomy::{self, TaxonomyCounts};
use etms_common::db::{init_database, seeds, trees, users, Role, Scope};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "etms-admin")]
#[command(about = "Maintenance commands for the ETMS database")]
#[command(version)]
struct Args {
    /// Root folder holding the database (overrides ETMS_ROOT_FOLDER and config file)
    #[arg(short, long, global = true)]
    root_folder: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill health counts for records that only have a status label
    FixHealthDistribution,

    /// Remove species, genera, families and locations nothing refers to
    CleanupTaxonomy {
        /// Delete ALL taxonomy and location rows (cascades to trees and seeds)
        #[arg(long)]
        force_all: bool,

        /// Confirm a destructive run
        #[arg(long)]
        yes: bool,
    },

    /// Create a user account
    CreateUser {
        #[arg(long, env = "ETMS_ADMIN_USERNAME")]
        username: String,

        #[arg(long, env = "ETMS_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,

        /// app_user, head_user or public_user
        #[arg(long, env = "ETMS_ADMIN_ROLE", default_value = "head_user")]
        role: String,
    },

    /// Delete every tree and seed record, then orphaned taxonomy and locations
    DeleteAllTreeData {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("ETMS admin v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::resolve(&CliOverrides {
        root_folder: args.root_folder,
        ..Default::default()
    });
    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    match args.command {
        Command::FixHealthDistribution => {
            let report = trees::backfill_legacy_distributions(&pool).await?;
            println!(
                "✓ Backfilled {} of {} records without health counts",
                report.updated, report.examined
            );
        }

        Command::CleanupTaxonomy { force_all, yes } => {
            if force_all && !yes {
                bail!("--force-all deletes every taxonomy and location row; re-run with --yes to confirm");
            }
            let report = taxonomy::sweep_orphans(&pool, force_all).await?;
            print_counts("Before", &report.before);
            print_counts("After", &report.after);
            println!(
                "✓ Deleted {} species, {} genera, {} families, {} locations",
                report.deleted.species,
                report.deleted.genera,
                report.deleted.families,
                report.deleted.locations
            );
        }

        Command::CreateUser { username, password, role } => {
            let role: Role = role.parse()?;
            let user = users::create_user(&pool, &username, &password, role).await?;
            println!("✓ Created {} '{}' ({})", user.role, user.username, user.id);
        }

        Command::DeleteAllTreeData { yes } => {
            if !yes {
                bail!("This deletes ALL tree and seed data (user accounts are kept); re-run with --yes to confirm");
            }
            let removed_trees = trees::delete_all_trees(&pool, Scope::All).await?;
            let removed_seeds = seeds::delete_all_seeds(&pool, Scope::All).await?;
            let sweep = taxonomy::sweep_orphans(&pool, false).await?;

            println!("✓ Deleted {} tree records", removed_trees.deleted_count);
            println!("✓ Deleted {} seed records", removed_seeds.deleted_count);
            print_counts("Remaining", &sweep.after);
        }
    }

    Ok(())
}

fn print_counts(label: &str, counts: &TaxonomyCounts) {
    println!(
        "{}: {} species, {} genera, {} families, {} locations",
        label, counts.species, counts.genera, counts.families, counts.locations
    );
}
