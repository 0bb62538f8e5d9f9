//! Cloud endpoint sets and token endpoint versions.

// std
use std::borrow::Cow;
// self
use crate::{_prelude::*, error::ConfigError};

/// Microsoft Entra token endpoint version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenVersion {
	/// `/oauth2/token` with a `resource` parameter.
	V1,
	#[default]
	/// `/oauth2/v2.0/token` with a `<audience>/.default` scope.
	V2,
}
impl TokenVersion {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenVersion::V1 => "v1",
			TokenVersion::V2 => "v2",
		}
	}
}
impl Display for TokenVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Endpoint set for one Azure cloud.
///
/// `login` is the Entra authority host and `resource_manager` the audience requested for
/// identity tokens; registries accept tokens minted for the resource manager audience.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CloudEnvironment {
	/// Short cloud name used in logs.
	pub name: Cow<'static, str>,
	/// Authority base URL (no trailing tenant segment).
	pub login: Cow<'static, str>,
	/// Resource manager audience.
	pub resource_manager: Cow<'static, str>,
}
impl CloudEnvironment {
	/// Azure public cloud.
	pub const GLOBAL: Self = Self::known(
		"global",
		"https://login.microsoftonline.com",
		"https://management.azure.com",
	);
	/// Azure operated by 21Vianet.
	pub const CHINA: Self = Self::known(
		"china",
		"https://login.chinacloudapi.cn",
		"https://management.chinacloudapi.cn",
	);
	/// Azure US Government.
	pub const US_GOVERNMENT: Self = Self::known(
		"usgovernment",
		"https://login.microsoftonline.us",
		"https://management.usgovcloudapi.net",
	);
	/// Azure canary regions.
	pub const CANARY: Self = Self::known(
		"canary",
		"https://login.microsoftonline.com",
		"https://management.azure.com",
	);

	const fn known(
		name: &'static str,
		login: &'static str,
		resource_manager: &'static str,
	) -> Self {
		Self {
			name: Cow::Borrowed(name),
			login: Cow::Borrowed(login),
			resource_manager: Cow::Borrowed(resource_manager),
		}
	}

	/// Builds a custom endpoint set (sovereign clouds, test servers).
	pub fn custom(
		name: impl Into<String>,
		login: impl Into<String>,
		resource_manager: impl Into<String>,
	) -> Self {
		Self {
			name: Cow::Owned(name.into()),
			login: Cow::Owned(login.into()),
			resource_manager: Cow::Owned(resource_manager.into()),
		}
	}

	/// Audience requested for identity tokens, without a trailing slash.
	pub fn audience(&self) -> &str {
		self.resource_manager.trim_end_matches('/')
	}

	/// Scope string used by v2 token requests.
	pub fn default_scope(&self) -> String {
		format!("{}/.default", self.audience())
	}

	/// Token endpoint for `tenant` at the requested version.
	pub fn token_url(&self, tenant: &str, version: TokenVersion) -> Result<Url, ConfigError> {
		let path = match version {
			TokenVersion::V1 => "oauth2/token",
			TokenVersion::V2 => "oauth2/v2.0/token",
		};
		let raw = format!("{}/{tenant}/{path}", self.login.trim_end_matches('/'));

		Url::parse(&raw).map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })
	}
}
impl Default for CloudEnvironment {
	fn default() -> Self {
		Self::GLOBAL
	}
}
impl Display for CloudEnvironment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.name)
	}
}
