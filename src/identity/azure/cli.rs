//! Tokens borrowed from a locally logged-in Azure CLI session.

// std
use std::process::Stdio;
// crates.io
use time::{PrimitiveDateTime, UtcOffset, macros::format_description};
use tokio::process::Command;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Authorizer, AuthorizerFuture},
	config::HelperOptions,
	deadline::Deadline,
	error::{ConfigError, TransportError},
	http,
};

const ENDPOINT: &str = "azure_cli";
const PROGRAM: &str = "az";

/// Authorizer that shells out to `az account get-access-token`.
#[derive(Clone, Debug)]
pub struct AzureCliAuthorizer {
	program: String,
	resource: String,
	tenant: String,
}
impl AzureCliAuthorizer {
	/// Authorizer for the configured audience, scoped to the tenant when one is set.
	pub fn from_options(options: &HelperOptions) -> Self {
		Self {
			program: PROGRAM.into(),
			resource: options.environment().audience().to_owned(),
			tenant: options.tenant_id().to_owned(),
		}
	}

	/// Overrides the executable (wrappers, tests).
	pub fn with_program(mut self, program: impl Into<String>) -> Self {
		self.program = program.into();

		self
	}

	/// Arguments passed to the CLI.
	pub fn args(&self) -> Vec<&str> {
		let mut args = vec![
			"account",
			"get-access-token",
			"--resource",
			self.resource.as_str(),
			"--output",
			"json",
		];

		if !self.tenant.is_empty() {
			args.extend(["--tenant", self.tenant.as_str()]);
		}

		args
	}

	async fn fetch(&self) -> Result<AccessToken> {
		let output = Command::new(&self.program)
			.args(self.args())
			.stdin(Stdio::null())
			.kill_on_drop(true)
			.output()
			.await
			.map_err(TransportError::from)?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			let message =
				stderr.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or_default();

			return Err(ConfigError::CliFailed {
				status: output.status.code().unwrap_or(-1),
				message: message.to_owned(),
			}
			.into());
		}

		parse_cli_token(&output.stdout)
	}
}
impl Authorizer for AzureCliAuthorizer {
	fn token(&self, deadline: Deadline) -> AuthorizerFuture<'_, AccessToken> {
		Box::pin(deadline.run("token", self.fetch()))
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
	access_token: String,
	expires_on: Option<String>,
	#[serde(rename = "expires_on")]
	expires_on_unix: Option<i64>,
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken> {
	let text = String::from_utf8_lossy(stdout);
	let parsed: CliTokenResponse = http::parse_json(ENDPOINT, &text, None)?;
	let expires_at = match (parsed.expires_on_unix, parsed.expires_on.as_deref()) {
		(Some(unix), _) =>
			OffsetDateTime::from_unix_timestamp(unix).map_err(|_| ConfigError::ExpiresInOutOfRange)?,
		(None, Some(local)) => parse_local_expiry(local)?,
		(None, None) => return Err(ConfigError::MissingExpiresIn.into()),
	};

	Ok(AccessToken::new(parsed.access_token, expires_at))
}

// Older CLI releases only report `expiresOn` as local wall-clock time.
fn parse_local_expiry(value: &str) -> Result<OffsetDateTime, ConfigError> {
	let with_fraction =
		format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
	let without_fraction = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
	let value = value.trim();
	let local = PrimitiveDateTime::parse(value, with_fraction)
		.or_else(|_| PrimitiveDateTime::parse(value, without_fraction))
		.map_err(|_| ConfigError::ExpiresInOutOfRange)?;
	let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

	Ok(local.assume_offset(offset))
}
