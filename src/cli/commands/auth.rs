use clap::Subcommand;
use serde_json::json;
use std::io::{self, BufRead, Write};

use crate::cli::utils::{output_success, output_value};
use crate::cli::OutputFormat;
use crate::client::NvlpClient;
use crate::token::TokenStorage;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Sign in with email and password")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (falls back to NVLP_PASSWORD, then a prompt)")]
        password: Option<String>,
    },

    #[command(about = "Sign out and forget stored tokens")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh the access token now")]
    Refresh,

    #[command(about = "Show the user the server sees")]
    Whoami,
}

fn prompt_password() -> anyhow::Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn handle<S: TokenStorage>(
    client: &NvlpClient<S>,
    cmd: AuthCommands,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, password } => {
            let password = match password.or_else(|| std::env::var("NVLP_PASSWORD").ok()) {
                Some(password) => password,
                None => prompt_password()?,
            };
            let data = client.sign_in_with_password(&email, &password).await?;
            output_success(
                &output_format,
                &format!("Signed in as {}", data.user.email.as_deref().unwrap_or(&data.user.id)),
                Some(json!({ "user": data.user, "expires_at": data.expires_at })),
            )
        }
        AuthCommands::Logout => {
            client.sign_out().await?;
            output_success(&output_format, "Signed out", None)
        }
        AuthCommands::Status => {
            let state = client.auth_state();
            output_value(&output_format, &state, |state| match (&state.user, state.expires_at) {
                (Some(user), Some(expires_at)) => {
                    println!("Signed in as {}", user.email.as_deref().unwrap_or(&user.id));
                    println!("Access token expires at {}", expires_at);
                }
                _ => println!("Not signed in"),
            })
        }
        AuthCommands::Refresh => {
            let data = client.refresh_session().await?;
            output_success(
                &output_format,
                "Token refreshed",
                Some(json!({ "expires_at": data.expires_at })),
            )
        }
        AuthCommands::Whoami => {
            let user = client.current_user().await?;
            output_value(&output_format, &user, |user| {
                println!("ID:    {}", user["id"].as_str().unwrap_or("-"));
                println!("Email: {}", user["email"].as_str().unwrap_or("-"));
                println!("Role:  {}", user["role"].as_str().unwrap_or("-"));
            })
        }
    }
}
