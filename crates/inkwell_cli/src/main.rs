//! Operator entry point.
//!
//! # Responsibility
//! - Bootstrap a blog store (migrations, first administrator).
//! - Mint tokens for existing accounts without going through login.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, CreateAdminArgs, IssueTokenArgs};
use inkwell_core::db::migrations::latest_version;
use inkwell_core::model::Role;
use inkwell_core::{
    core_version, init_logging_from, open_db, AuthService, CoreConfig, SqliteUserRepository,
    TokenService, UserRepository,
};
use log::{info, warn};
use std::sync::Arc;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CoreConfig::from_env().context("invalid configuration")?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Err(err) = init_logging_from(&config) {
        eprintln!("warning: file logging disabled: {err}");
    }

    match cli.command {
        Commands::Migrate => migrate(&config),
        Commands::CreateAdmin(args) => create_admin(&config, &args),
        Commands::IssueToken(args) => issue_token(&config, &args),
        Commands::Version => {
            println!("inkwell_core version={}", core_version());
            Ok(())
        }
    }
}

fn migrate(config: &CoreConfig) -> Result<()> {
    open_db(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    info!("event=cli_migrate module=cli status=ok");
    println!(
        "database {} at schema version {}",
        config.database_path.display(),
        latest_version()
    );
    Ok(())
}

fn create_admin(config: &CoreConfig, args: &CreateAdminArgs) -> Result<()> {
    let conn = open_db(&config.database_path)?;
    let repo = SqliteUserRepository::try_new(&conn)?;
    let service = AuthService::new(repo, token_service(config), config.bcrypt_cost);
    let session = service.register_with_role(&args.email, &args.name, &args.password, Role::Admin)?;
    info!(
        "event=cli_create_admin module=cli status=ok user_id={}",
        session.user.id
    );
    println!("created admin {} ({})", session.user.id, session.user.email);
    println!("{}", session.token);
    Ok(())
}

fn issue_token(config: &CoreConfig, args: &IssueTokenArgs) -> Result<()> {
    let conn = open_db(&config.database_path)?;
    let repo = SqliteUserRepository::try_new(&conn)?;
    let credentials = repo
        .get_credentials_by_email(&args.email.trim().to_lowercase())
        .with_context(|| format!("no account for {}", args.email))?;
    let user = credentials.user;
    let token = token_service(config).issue_token(&user.id, user.role)?;
    info!("event=cli_issue_token module=cli status=ok user_id={}", user.id);
    println!("{token}");
    Ok(())
}

fn token_service(config: &CoreConfig) -> Arc<TokenService> {
    if config.uses_default_secret() {
        warn!("event=cli_token module=cli status=default_secret");
        eprintln!("warning: JWT_SECRET is not set; tokens are signed with the default secret");
    }
    Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl))
}
