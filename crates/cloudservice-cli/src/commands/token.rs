//! Access token commands, for calling the admin API from scripts.

use chrono::Duration;
use clap::{Args, Subcommand, ValueEnum};

use cloudservice_auth::JwtEncoder;
use cloudservice_core::config::AppConfig;
use cloudservice_core::error::AppError;
use cloudservice_core::types::id::UserId;
use cloudservice_entity::user::UserRole;

use crate::output;

/// Arguments for token commands
#[derive(Debug, Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Role carried by an issued token
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Admin,
    User,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => UserRole::Admin,
            RoleArg::User => UserRole::User,
        }
    }
}

/// Token subcommands
#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Issue a signed access token
    Issue {
        /// Username placed in the token
        #[arg(short, long)]
        username: String,
        /// Role placed in the token
        #[arg(short, long, value_enum, default_value = "admin")]
        role: RoleArg,
        /// User ID; a new one is generated when omitted
        #[arg(long)]
        user_id: Option<UserId>,
        /// Lifetime in minutes; defaults to auth.jwt_access_ttl_minutes
        #[arg(long)]
        ttl_minutes: Option<i64>,
    },
}

/// Execute token commands
pub fn execute(args: &TokenArgs, config: &AppConfig) -> Result<(), AppError> {
    match &args.command {
        TokenCommand::Issue {
            username,
            role,
            user_id,
            ttl_minutes,
        } => {
            let encoder = JwtEncoder::new(&config.auth);
            let user_id = user_id.unwrap_or_default();
            let role = UserRole::from(*role);

            let token = match ttl_minutes {
                Some(minutes) if *minutes <= 0 => {
                    return Err(AppError::validation("--ttl-minutes must be positive"));
                }
                Some(minutes) => {
                    encoder.issue_with_ttl(user_id, role, username, Duration::minutes(*minutes))?
                }
                None => encoder.issue(user_id, role, username)?,
            };

            output::print_success("Token issued");
            output::print_details(&[
                ("User ID", user_id.to_string()),
                ("Role", role.to_string()),
                ("Expires", token.expires_at.to_rfc3339()),
            ]);
            println!("{}", token.access_token);
        }
    }
    Ok(())
}
