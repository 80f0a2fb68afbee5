use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "registro")]
#[command(about = "Registro Poblacional de Epilepsia CLI")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server base URL (overrides config and REGISTRO_URL env var)
    #[arg(short, long, global = true, env = "REGISTRO_URL")]
    pub server: Option<String>,

    /// Config profile name
    #[arg(short, long, global = true, env = "REGISTRO_PROFILE", default_value = "default")]
    pub profile: String,

    /// Client configuration file (TOML)
    #[arg(long, global = true, env = "REGISTRO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(Self::Json),
            "table" => Some(Self::Table),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Login with email and password
    Login(LoginArgs),
    /// Logout (remove stored credentials)
    Logout,
    /// Show the current session
    Whoami,
    /// Request a password reset email
    ForgotPassword(ForgotPasswordArgs),
    /// List research layers
    Layers,
    /// Check whether a patient is already registered
    Validate(PatientArgs),
    /// Validate a patient and save the registration
    Save(SaveArgs),
    /// Delete a register
    Delete(DeleteArgs),
    /// Upload a signed consent document
    Consent(ConsentArgs),
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(short, long, env = "REGISTRO_EMAIL")]
    pub email: Option<String>,
    /// Password
    #[arg(long, env = "REGISTRO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(clap::Args)]
pub struct ForgotPasswordArgs {
    /// Account email
    pub email: String,
}

#[derive(clap::Args)]
pub struct PatientArgs {
    /// Research layer id
    #[arg(short, long)]
    pub layer: String,
    /// Patient identification number
    #[arg(short, long)]
    pub id: i64,
}

#[derive(clap::Args)]
pub struct SaveArgs {
    #[command(flatten)]
    pub patient: PatientArgs,
    /// Path to JSON file with patient, caregiver and variables (reads from stdin if omitted)
    #[arg(long)]
    pub file: Option<String>,
}

#[derive(clap::Args)]
pub struct DeleteArgs {
    /// Register id
    pub register_id: String,
}

#[derive(clap::Args)]
pub struct ConsentArgs {
    /// Register id
    pub register_id: String,
    /// Path to the consent document
    pub file: PathBuf,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current config
    Show,
    /// Set config value
    Set(ConfigSetArgs),
}

#[derive(clap::Args)]
pub struct ConfigSetArgs {
    /// Key to set (server, api_prefix, format)
    pub key: String,
    /// Value
    pub value: String,
}
