mod cli;
mod commands;
mod config;
mod observability;
mod output;
mod session;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands, OutputFormat};
use output::print_error;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    observability::init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let profile = cli.profile.as_str();
    let config_file = cli.config.as_deref();
    let format = match cli.format {
        Some(format) => format,
        None => config::load_profile(profile)?
            .format
            .as_deref()
            .and_then(OutputFormat::parse)
            .unwrap_or_default(),
    };

    match &cli.command {
        Commands::Login(args) => {
            let server = config::resolve_server(&cli.server, profile)?;
            let client = session::connect(&server, profile, config_file).await?;
            commands::auth::login(&client, args, profile).await?;
        }
        Commands::Logout => {
            commands::auth::logout(profile).await?;
        }
        Commands::Whoami => {
            commands::auth::whoami(profile).await?;
        }
        Commands::ForgotPassword(args) => {
            let server = config::resolve_server(&cli.server, profile)?;
            let client = session::connect(&server, profile, config_file).await?;
            commands::auth::forgot_password(&client, &args.email).await?;
        }
        Commands::Config(args) => match &args.command {
            cli::ConfigCommands::Show => {
                let cfg = config::load_profile(profile)?;
                println!("{}: {}", "Profile".cyan(), profile);
                println!(
                    "{}: {}",
                    "Server".cyan(),
                    cfg.server.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "{}: {}",
                    "API prefix".cyan(),
                    cfg.api_prefix.as_deref().unwrap_or("/api/v1")
                );
                println!(
                    "{}: {}",
                    "Format".cyan(),
                    cfg.format.as_deref().unwrap_or("json")
                );
            }
            cli::ConfigCommands::Set(set_args) => {
                let mut cfg = config::load_profile(profile)?;
                match set_args.key.as_str() {
                    "server" => cfg.server = Some(set_args.value.clone()),
                    "api_prefix" => cfg.api_prefix = Some(set_args.value.clone()),
                    "format" => {
                        if OutputFormat::parse(&set_args.value).is_none() {
                            anyhow::bail!("Unknown format: {}. Valid formats: json, table", set_args.value);
                        }
                        cfg.format = Some(set_args.value.clone());
                    }
                    other => {
                        anyhow::bail!(
                            "Unknown config key: {other}. Valid keys: server, api_prefix, format"
                        )
                    }
                }
                config::save_profile(profile, &cfg)?;
                output::print_success(&format!("Set {} = {}", set_args.key, set_args.value));
            }
        },
        Commands::Layers => {
            let server = config::resolve_server(&cli.server, profile)?;
            let session = session::open(&server, profile, config_file).await?;
            commands::registry::layers(&session.client, format).await?;
        }
        Commands::Validate(args) => {
            let server = config::resolve_server(&cli.server, profile)?;
            let session = session::open(&server, profile, config_file).await?;
            commands::registry::validate(&session.client, args, format).await?;
        }
        Commands::Save(args) => {
            let server = config::resolve_server(&cli.server, profile)?;
            let session = session::open(&server, profile, config_file).await?;
            commands::registry::save(&session.client, &args.patient, &args.file, format).await?;
        }
        Commands::Delete(args) => {
            let server = config::resolve_server(&cli.server, profile)?;
            let session = session::open(&server, profile, config_file).await?;
            commands::registry::delete(&session.client, &args.register_id).await?;
        }
        Commands::Consent(args) => {
            let server = config::resolve_server(&cli.server, profile)?;
            let session = session::open(&server, profile, config_file).await?;
            commands::registry::consent(&session.client, &args.register_id, &args.file).await?;
        }
    }

    Ok(())
}
