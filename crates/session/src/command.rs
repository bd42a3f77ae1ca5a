// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `recipe-session` command line: sign in, inspect and use a persisted
//! session against a backend.

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde::Serialize;

use crate::client::SessionClient;
use crate::config::{state_dir, ClientConfig};
use crate::error::SessionError;
use crate::session::SessionState;

/// Exit code for a generic or retryable failure.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for invalid configuration or arguments.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code when the user has to sign in again.
pub const EXIT_REAUTH: i32 = 3;

/// Authenticated session client for the recipe backend.
#[derive(Debug, Parser)]
#[command(name = "recipe-session", version)]
pub struct Cli {
    /// Log level filter (tracing `EnvFilter` syntax).
    #[arg(long, default_value = "info", env = "RECIPE_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: `text` or `json`. Logs go to stderr.
    #[arg(long, default_value = "text", env = "RECIPE_LOG_FORMAT")]
    pub log_format: String,

    #[command(flatten)]
    pub client: ClientConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve the stored session and print its state.
    Status,
    /// Sign in with a federated identity token.
    Login(LoginArgs),
    /// Sign out, revoking the session on the server when possible.
    Logout,
    /// Send an authenticated request and print the response body.
    Request(RequestArgs),
}

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    /// Identity token issued by the external sign-in provider.
    #[arg(long, env = "RECIPE_ID_TOKEN")]
    pub id_token: String,
}

#[derive(Debug, clap::Args)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, ...).
    pub method: String,
    /// Path relative to the base URL, e.g. `/recipes`.
    pub path: String,
    /// JSON request body.
    #[arg(long)]
    pub body: Option<String>,
}

impl Cli {
    /// Client config with the CLI's default token file filled in.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = self.client.clone();
        if config.token_file.is_none() {
            config.token_file = Some(state_dir().join("tokens.json"));
        }
        config
    }
}

/// Run a parsed command line. Returns a process exit code.
pub async fn run(cli: &Cli) -> i32 {
    let client = match SessionClient::new(&cli.client_config()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e:#}");
            return EXIT_CONFIG;
        }
    };

    match &cli.command {
        Command::Status => {
            let state = client.check_initial().await;
            print_json(&state)
        }
        Command::Login(args) => match client.login(&args.id_token).await {
            Ok(profile) => print_json(&profile),
            Err(e) => report(&e),
        },
        Command::Logout => {
            client.logout().await;
            print_json(&SessionState::Unauthenticated)
        }
        Command::Request(args) => cmd_request(&client, args).await,
    }
}

async fn cmd_request(client: &SessionClient, args: &RequestArgs) -> i32 {
    let method = match parse_method(&args.method) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_CONFIG;
        }
    };

    let transport = client.transport();
    let mut builder = transport.request(method, &args.path);
    if let Some(ref body) = args.body {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(json) => builder = builder.json(&json),
            Err(e) => {
                eprintln!("error: --body is not valid JSON: {e}");
                return EXIT_CONFIG;
            }
        }
    }

    let resp = match transport.execute(builder).await {
        Ok(r) => r,
        Err(e) => return report(&e),
    };
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if status.is_success() {
        println!("{text}");
        0
    } else {
        eprintln!("error: {} {status}: {text}", args.path);
        EXIT_FAILURE
    }
}

/// Parse an HTTP method name, case-insensitively.
pub fn parse_method(name: &str) -> Result<Method, String> {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "OPTIONS" => {
            Method::from_bytes(upper.as_bytes()).map_err(|e| e.to_string())
        }
        _ => Err(format!("unsupported HTTP method: {name}")),
    }
}

/// Exit code for a failed session operation.
pub fn exit_code(err: &SessionError) -> i32 {
    if err.requires_reauth() {
        EXIT_REAUTH
    } else {
        EXIT_FAILURE
    }
}

fn report(err: &SessionError) -> i32 {
    let code = exit_code(err);
    if code == EXIT_REAUTH {
        eprintln!("not signed in ({err}). Run `recipe-session login --id-token <TOKEN>` to sign in.");
    } else {
        eprintln!("error [{}]: {err}", err.code());
    }
    code
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
