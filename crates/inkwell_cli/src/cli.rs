use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "inkwell")]
#[command(about = "Inkwell blog store operator tool")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// SQLite database file (overrides INKWELL_DATABASE_PATH)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database if needed and apply pending migrations
    Migrate,
    /// Create an administrator account
    CreateAdmin(CreateAdminArgs),
    /// Issue a bearer token for an existing account
    IssueToken(IssueTokenArgs),
    /// Print the core version
    Version,
}

#[derive(Args)]
pub struct CreateAdminArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub name: String,
    #[arg(long, env = "INKWELL_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
pub struct IssueTokenArgs {
    #[arg(long)]
    pub email: String,
}
