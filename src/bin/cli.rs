use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use agile_authz::authz::{PermissionResolver, PermissionsResponse, ProjectRole, Role, SqliteRoleStore};
use agile_authz::jwt::JwtConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "agile-authz admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Insert a user, optionally with a global role
    CreateUser {
        name: String,
        email: String,
        #[arg(long)]
        role: Option<Role>,
    },
    /// Replace a user's global role
    SetRole { user_id: Uuid, role: Role },
    /// Grant (or replace) a user's role on a project
    AddMember {
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    },
    /// Remove a user's project membership
    RemoveMember { project_id: Uuid, user_id: Uuid },
    /// Print a bearer token for a user, signed with JWT_SECRET
    IssueToken { user_id: Uuid },
    /// Print a user's resolved permissions as JSON
    ShowPermissions { user_id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::CreateUser { name, email, role } => {
            let pool = get_pool().await?;
            let id = create_user(&pool, &name, &email, role).await?;
            println!("{}", id);
        }
        Commands::SetRole { user_id, role } => {
            let store = SqliteRoleStore::new(get_pool().await?);
            store.set_user_role(user_id, role).await?;
            println!("{} is now {}", user_id, role);
        }
        Commands::AddMember { project_id, user_id, role } => {
            let store = SqliteRoleStore::new(get_pool().await?);
            store.upsert_membership(user_id, project_id, role).await?;
            println!("{} is {} on {}", user_id, role, project_id);
        }
        Commands::RemoveMember { project_id, user_id } => {
            let store = SqliteRoleStore::new(get_pool().await?);
            if !store.remove_membership(user_id, project_id).await? {
                anyhow::bail!("{} is not a member of {}", user_id, project_id);
            }
            println!("Removed {} from {}", user_id, project_id);
        }
        Commands::IssueToken { user_id } => {
            let jwt = JwtConfig::from_env()?;
            println!("{}", jwt.encode(user_id)?);
        }
        Commands::ShowPermissions { user_id } => {
            let store = SqliteRoleStore::new(get_pool().await?);
            let snapshot = PermissionResolver::new(Arc::new(store)).resolve(user_id).await?;
            let response = PermissionsResponse::from(&snapshot);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

async fn create_user(pool: &SqlitePool, name: &str, email: &str, role: Option<Role>) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query("INSERT INTO users (id, name, email, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(email)
        .bind(role.map(|r| r.as_str()))
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .with_context(|| format!("failed to create user {}", email))?;

    Ok(id)
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let filename = format!("{}_{}.sql", timestamp, sanitize_name(name));
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let has_table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if has_table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, else the crate's own folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", display))
}
