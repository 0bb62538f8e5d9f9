//! Docker credential helper for Azure Container Registry driven by environment configuration.
//!
//! The host runtime invokes `docker-credential-acr-env <action>` and talks over stdin/stdout, so
//! every log line goes to stderr.

// std
use std::{
	io::{self, Read, Write},
	process::ExitCode,
};
// crates.io
use acr_credential_helper::{
	config::{HelperOption, HelperOptions},
	error::{Result, TransportError},
	helper::{AcrHelper, CredentialHelper, Credentials},
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "docker-credential-acr-env")]
#[command(about = "Docker credential helper for Azure Container Registry")]
struct Cli {
	#[command(subcommand)]
	action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
	/// Read a server URL from stdin and print its credentials.
	Get,
	/// Read credentials from stdin and store them.
	Store,
	/// Read a server URL from stdin and erase its credentials.
	Erase,
	/// List stored credentials.
	List,
	/// Print the helper version.
	Version,
}

#[derive(Serialize)]
struct GetOutput<'a> {
	#[serde(rename = "ServerURL")]
	server_url: &'a str,
	#[serde(rename = "Username")]
	username: &'a str,
	#[serde(rename = "Secret")]
	secret: &'a str,
}

#[tokio::main]
async fn main() -> ExitCode {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.init();

	let cli = Cli::parse();

	match run(cli.action).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::debug!(error = ?e, "credential helper action failed");

			println!("{e}");

			ExitCode::FAILURE
		},
	}
}

async fn run(action: Action) -> Result<()> {
	if let Action::Version = action {
		println!("{} {}", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"));

		return Ok(());
	}

	// Only `get` needs an identity; the other actions skip resolution at construction.
	let helper = match action {
		Action::Get => AcrHelper::from_env().await?,
		_ =>
			AcrHelper::new(HelperOptions::from_env_with([
				HelperOption::CacheAuthorizerAtConstruction(false),
			]))
			.await?,
	};

	match action {
		Action::Get => {
			let server_url = read_stdin()?;
			let result = helper.get(server_url.trim()).await?;
			let output = GetOutput {
				server_url: server_url.trim(),
				username: &result.username,
				secret: result.secret.expose(),
			};

			write_json(&output)
		},
		Action::Store => {
			let payload = read_stdin()?;
			let credentials = Credentials::from_json(&payload)?;

			helper.add(&credentials).await
		},
		Action::Erase => {
			let server_url = read_stdin()?;

			helper.delete(server_url.trim()).await
		},
		Action::List => {
			let entries = helper.list().await?;

			write_json(&entries)
		},
		Action::Version => Ok(()),
	}
}

fn read_stdin() -> Result<String> {
	let mut buf = String::new();

	io::stdin().read_to_string(&mut buf).map_err(TransportError::from)?;

	Ok(buf)
}

fn write_json<T>(value: &T) -> Result<()>
where
	T: ?Sized + Serialize,
{
	let mut stdout = io::stdout().lock();
	let write = serde_json::to_writer(&mut stdout, value)
		.map_err(io::Error::from)
		.and_then(|()| writeln!(stdout));

	write.map_err(|e| TransportError::from(e).into())
}
