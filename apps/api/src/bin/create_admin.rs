//! # Create Admin
//!
//! Creates the admin account, or promotes and re-keys an existing account
//! with the same email.
//!
//! ## Usage
//! ```bash
//! cargo run -p emporium-api --bin create-admin -- \
//!     --email admin@example.com --password 'change-me' --name 'Store Admin'
//!
//! # Or from the environment
//! EMPORIUM_ADMIN_EMAIL=admin@example.com EMPORIUM_ADMIN_PASSWORD=change-me \
//!     cargo run -p emporium-api --bin create-admin
//! ```
//!
//! The database path defaults to `EMPORIUM_DATABASE_PATH`, then
//! `./emporium.db`.

use anyhow::{bail, Context};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

use emporium_api::auth::hash_password;
use emporium_core::validation::{validate_email, validate_password, validate_person_name};
use emporium_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut db_path = env::var("EMPORIUM_DATABASE_PATH").unwrap_or_else(|_| "./emporium.db".to_string());
    let mut email = env::var("EMPORIUM_ADMIN_EMAIL").ok();
    let mut password = env::var("EMPORIUM_ADMIN_PASSWORD").ok();
    let mut name = env::var("EMPORIUM_ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string());

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--db" | "-d" => {
                db_path = value.context("--db needs a path")?;
                i += 1;
            }
            "--email" | "-e" => {
                email = value;
                i += 1;
            }
            "--password" | "-p" => {
                password = value;
                i += 1;
            }
            "--name" | "-n" => {
                name = value.context("--name needs a value")?;
                i += 1;
            }
            "--help" | "-h" => {
                println!("Emporium Create Admin");
                println!();
                println!("Usage: create-admin [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path");
                println!("  -e, --email <EMAIL>      Admin email (or EMPORIUM_ADMIN_EMAIL)");
                println!("  -p, --password <PASS>    Admin password (or EMPORIUM_ADMIN_PASSWORD)");
                println!("  -n, --name <NAME>        Display name (default: Admin)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    let email = email.context("admin email is required (--email or EMPORIUM_ADMIN_EMAIL)")?;
    let password =
        password.context("admin password is required (--password or EMPORIUM_ADMIN_PASSWORD)")?;

    let email = validate_email(&email)?;
    validate_password(&password)?;
    validate_person_name(&name)?;

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {db_path}"))?;

    let hash = hash_password(&password)?;
    let admin = db.users().upsert_admin(name.trim(), &email, &hash).await?;

    info!(user_id = %admin.id, email = %admin.email, path = %db_path, "Admin account ready");
    db.close().await;
    Ok(())
}
