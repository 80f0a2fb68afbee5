use anyhow::{Context, Result};
use colored::Colorize;
use registro_auth::{Credential, CredentialStore, FileCredentialStore};
use registro_client::RegistryClient;

use crate::cli::LoginArgs;
use crate::config;
use crate::output::{print_error, print_success};

pub async fn login(client: &RegistryClient, args: &LoginArgs, profile: &str) -> Result<()> {
    let email = args.email.as_deref().context("--email is required")?;
    let password = args.password.as_deref().context("--password is required")?;

    println!("Logging in as {email}...");
    let credential = client.auth().login(email, password).await?;
    config::remember_server(profile, client.auth().base_url())?;

    print_success(&format!("Logged in to {}", client.auth().base_url().cyan()));
    print_roles(&credential);
    Ok(())
}

pub async fn logout(profile: &str) -> Result<()> {
    let store = FileCredentialStore::for_profile(profile)?;
    if store.clear().await? {
        print_success("Logged out (credentials removed)");
    } else {
        println!("No credentials found for profile \"{profile}\"");
    }
    Ok(())
}

pub async fn whoami(profile: &str) -> Result<()> {
    let store = FileCredentialStore::for_profile(profile)?;
    let Some(credential) = store.load().await?.and_then(Credential::from_stored) else {
        print_error(&format!("Not logged in (profile: \"{profile}\")"));
        return Ok(());
    };

    let server = config::load_profile(profile)?.server;
    println!("{}: {}", "Profile".cyan(), profile);
    println!(
        "{}: {}",
        "Server".cyan(),
        server.as_deref().unwrap_or("(not set)")
    );
    println!(
        "{}: {}",
        "Email".cyan(),
        credential.email().unwrap_or("(unknown)")
    );
    print_roles(&credential);
    match credential.expires_at() {
        Some(at) if credential.is_expired() => {
            println!("{}: {} {}", "Expires".cyan(), at, "(expired)".yellow());
        }
        Some(at) => println!("{}: {}", "Expires".cyan(), at),
        None => {}
    }
    Ok(())
}

pub async fn forgot_password(client: &RegistryClient, email: &str) -> Result<()> {
    client.auth().forgot_password(email).await?;
    print_success(&format!("Password reset requested for {}", email.cyan()));
    Ok(())
}

fn print_roles(credential: &Credential) {
    if credential.roles().is_empty() {
        return;
    }
    let roles: Vec<&str> = credential.roles().iter().map(String::as_str).collect();
    println!("{}: {}", "Roles".cyan(), roles.join(", "));
}
