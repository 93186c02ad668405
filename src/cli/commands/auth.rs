use clap::Subcommand;
use serde_json::json;

use crate::auth::{decode_jwt, generate_jwt, Claims, ADMIN_ROLE};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::query::ObjectId;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Mint a token signed with the local JWT_SECRET")]
    Token {
        #[arg(long, help = "User id (24 hex chars); generated when omitted")]
        sub: Option<String>,
        #[arg(long, help = "Email claim")]
        email: String,
        #[arg(long, default_value = "student", help = "Role claim (`admin` may manage queries)")]
        role: String,
    },

    #[command(about = "Decode and verify a token")]
    Inspect {
        #[arg(help = "Token to inspect")]
        token: String,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Token { sub, email, role } => {
            let sub = match sub {
                Some(sub) => ObjectId::parse(&sub)?.to_hex(),
                None => ObjectId::new().to_hex(),
            };
            let claims = Claims::new(sub, email, role);
            let token = generate_jwt(&claims)?;

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    "Token issued",
                    Some(json!({ "token": token, "claims": claims })),
                ),
                // Bare token so `export CAMPUS_TOKEN=$(campus auth token ...)` works
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
        AuthCommands::Inspect { token } => {
            let claims = decode_jwt(&token)?;
            output_success(
                &output_format,
                &format!(
                    "Token for {} ({}{})",
                    claims.email,
                    claims.role,
                    if claims.role == ADMIN_ROLE { ", may manage queries" } else { "" }
                ),
                Some(json!({ "claims": claims })),
            )
        }
    }
}
