use std::io::{self, BufRead, Write};

use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::config::{load_session, save_session, Session};
use crate::cli::utils::{output_record, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Logout from server")]
    Logout,

    #[command(about = "Show current user information")]
    Whoami,
}

pub async fn handle(
    cmd: AuthCommands,
    server: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ")?,
            };
            let mut session = load_session()?;
            if let Some(server) = server {
                session.server = server;
            }
            let client = session.client(None);
            let pair = client.login(&email, &password).await?;

            session.email = Some(email.clone());
            session.tokens = Some(pair.clone());
            save_session(&session)?;

            output_success(
                output_format,
                &format!("Logged in as {} on {}", email, session.server),
                Some(json!({ "server": session.server, "expires_in": pair.expires_in })),
            )
        }
        AuthCommands::Logout => {
            let mut session = load_session()?;
            let client = session.client(server.as_deref());
            client.logout().await?;
            session = Session {
                server: session.server,
                ..Session::default()
            };
            save_session(&session)?;
            output_success(output_format, "Logged out", None)
        }
        AuthCommands::Whoami => {
            let mut session = load_session()?;
            let client = session.client(server.as_deref());
            let current: Value = client.get("/admin/auth/current").await?;
            session.sync_from(&client).await?;

            match output_format {
                OutputFormat::Json => output_record(output_format, &current),
                OutputFormat::Text => {
                    let user = &current["user"];
                    let principal = &current["principal"];
                    println!("Email:    {}", user["email"].as_str().unwrap_or("-"));
                    println!("Role:     {}", principal["role"].as_str().unwrap_or("-"));
                    println!(
                        "Tenant:   {}",
                        current["tenant"]["name"].as_str().unwrap_or("(all tenants)")
                    );
                    println!("Server:   {}", client.base_url());
                    Ok(())
                }
            }
        }
    }
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
