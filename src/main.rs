// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authgate command-line client
//!
//! Signs in against the configured backend, keeping the session and the
//! sign-in throttle in a local storage file between runs.

use anyhow::{bail, Context};
use authgate::{
    config::Config,
    error::format_remaining,
    forms::{complete_callback, Credentials, SignUpOutcome},
    models::{display_name, DEFAULT_ROLE},
    services::{LoginThrottle, SessionManager, SupabaseClient, ThrottleStatus},
    store::{AttemptStore, FileKvStore, KeyValueStore},
    time_utils::format_utc_rfc3339,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: authgate <status | sign-in EMAIL PASSWORD | sign-up EMAIL PASSWORD | \
sign-out | magic-link EMAIL | reset-password EMAIL | callback URL>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        bail!(USAGE);
    };

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        provider = %config.provider_url,
        storage = %config.storage_path.display(),
        "Starting authgate"
    );

    let storage: Arc<dyn KeyValueStore> = Arc::new(
        FileKvStore::open(&config.storage_path).context("Failed to open client storage")?,
    );
    let client = Arc::new(SupabaseClient::new(&config, storage.clone())?);
    let manager = Arc::new(SessionManager::start(client.clone(), client));

    let state = AppState {
        throttle: LoginThrottle::new(AttemptStore::new(storage), config.throttle_config()),
        guard: config.route_guard(),
        config,
        manager,
    };
    state.manager.ready().await;

    match (command, &args[1..]) {
        ("status", []) => print_status(&state),
        ("sign-in", [email, password]) => {
            let session = state
                .login_form()
                .sign_in(&Credentials::new(email, password))
                .await?;
            println!("Signed in as {}", session.user.email);
        }
        ("sign-up", [email, password]) => {
            match state
                .login_form()
                .sign_up(&Credentials::new(email, password))
                .await?
            {
                SignUpOutcome::SignedIn(session) => {
                    println!("Account created, signed in as {}", session.user.email)
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!("Account created. Check your email to confirm it.")
                }
            }
        }
        ("sign-out", []) => {
            state.manager.sign_out().await?;
            println!("Signed out");
        }
        ("magic-link", [email]) => {
            state.login_form().send_magic_link(email).await?;
            println!("Sign-in link sent to {}", email.trim());
        }
        ("reset-password", [email]) => {
            state.login_form().send_password_reset(email).await?;
            println!("Password reset email sent to {}", email.trim());
        }
        ("callback", [url]) => {
            let outcome = complete_callback(&state.manager, url, &state.guard).await;
            println!("{} (continue to {})", outcome.message, outcome.redirect);
            if !outcome.signed_in {
                std::process::exit(1);
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

fn print_status(state: &AppState) {
    let auth = state.manager.state();
    match auth.identity() {
        Some(identity) => {
            let profile = auth.profile.as_ref();
            println!(
                "Signed in as {} <{}>, role {}",
                display_name(Some(identity), profile),
                identity.email,
                profile.map(|p| p.role()).unwrap_or(DEFAULT_ROLE)
            );
        }
        None => println!("Not signed in"),
    }
    if let Some(expires_at) = auth.session.as_ref().and_then(|s| s.expires_at) {
        println!("Session expires at {}", format_utc_rfc3339(expires_at));
    }

    match state.throttle.status() {
        ThrottleStatus::Open { attempts: 0, .. } => {}
        ThrottleStatus::Open {
            remaining_attempts, ..
        } => println!("{} sign-in attempts left before lockout", remaining_attempts),
        ThrottleStatus::Locked { until, remaining } => println!(
            "Sign-in locked until {}, try again in {}",
            format_utc_rfc3339(until),
            format_remaining(&remaining)
        ),
    }
}

/// Initialize structured JSON logging on stderr.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("authgate=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
