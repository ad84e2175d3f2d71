use chrono::{TimeZone, Utc};
use clap::Subcommand;
use guardshift_core::SessionCredential;

use crate::app::{App, CliResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Store a session credential issued by the backend
    Login {
        /// Access token
        #[arg(long)]
        access_token: String,
        /// Refresh token
        #[arg(long, default_value = "")]
        refresh_token: String,
        /// Lifetime in seconds from now
        #[arg(
            long,
            default_value_t = 3600,
            conflicts_with = "expires_at",
            value_parser = clap::value_parser!(i64).range(1..)
        )]
        expires_in: i64,
        /// Absolute expiry in epoch milliseconds
        #[arg(long)]
        expires_at: Option<i64>,
        /// Cached user profile as JSON
        #[arg(long)]
        profile: Option<String>,
    },
    /// Remove the credential, cached profile and settings
    Logout,
    /// Show whether a valid session is stored
    Status,
}

pub fn run(action: SessionAction, app: &App) -> CliResult {
    match action {
        SessionAction::Login {
            access_token,
            refresh_token,
            expires_in,
            expires_at,
            profile,
        } => {
            let expires_at = expires_at.unwrap_or_else(|| {
                Utc::now()
                    .timestamp_millis()
                    .saturating_add(expires_in.saturating_mul(1000))
            });
            let credential = SessionCredential::new(access_token, refresh_token, expires_at);
            app.credentials.store(&credential)?;
            if let Some(profile) = profile {
                let value: serde_json::Value = serde_json::from_str(&profile)?;
                app.credentials.store_profile(&value)?;
            }
            println!("signed in until {}", format_expiry(expires_at));
        }
        SessionAction::Logout => {
            app.credentials.clear()?;
            app.snapshot.clear()?;
            println!("signed out");
        }
        SessionAction::Status => {
            let credential = app.credentials.retrieve();
            let valid = app.credentials.is_valid();
            if app.opts.json {
                let status = serde_json::json!({
                    "signedIn": valid,
                    "expiresAt": credential.as_ref().map(|c| c.expires_at),
                    "profile": app.credentials.profile(),
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                match credential {
                    Some(c) if valid => println!("signed in until {}", format_expiry(c.expires_at)),
                    Some(c) => println!("session expired at {}", format_expiry(c.expires_at)),
                    None => println!("not signed in"),
                }
            }
        }
    }
    Ok(())
}

fn format_expiry(epoch_ms: i64) -> String {
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}
