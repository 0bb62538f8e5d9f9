//! Client-certificate material and client-assertion signing.
//!
//! Certificates arrive either as a PEM bundle (certificate plus an RSA key in PKCS#1,
//! PKCS#8, or password-protected PKCS#8 form) or as a PKCS#12 archive unlocked with the
//! configured password.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use p12_keystore::KeyStore;
use pkcs8::{EncryptedPrivateKeyInfo, ObjectIdentifier, PrivateKeyInfo};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, config::HelperOptions, deadline::Deadline, error::ConfigError};

const ASSERTION_LIFETIME: Duration = Duration::minutes(10);
const JTI_LEN: usize = 32;
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// Signing key plus the SHA-256 thumbprint of its certificate.
#[derive(Clone)]
pub struct ClientCertificate {
	key: EncodingKey,
	thumbprint: String,
}
impl ClientCertificate {
	/// Loads the bundle from inline data, falling back to the configured path.
	pub async fn load(options: &HelperOptions, deadline: Deadline) -> Result<Self> {
		let bundle = if !options.client_cert_data().is_empty() {
			options.client_cert_data().to_vec()
		} else {
			let path = options.client_cert_path();

			deadline
				.run("construct", async {
					tokio::fs::read(path).await.map_err(|e| {
						certificate_error(format!("{path} could not be read: {e}")).into()
					})
				})
				.await?
		};

		Ok(Self::from_bundle(&bundle, options.client_cert_password())?)
	}

	/// Parses PEM text, or a PKCS#12 archive when the bundle is not PEM.
	pub fn from_bundle(bundle: &[u8], password: &str) -> Result<Self, ConfigError> {
		if bundle.trim_ascii_start().starts_with(b"-----BEGIN ") {
			Self::from_pem(bundle, password)
		} else {
			Self::from_pkcs12(bundle, password)
		}
	}

	/// Parses a PEM bundle; `password` unlocks an `ENCRYPTED PRIVATE KEY` block.
	pub fn from_pem(bundle: &[u8], password: &str) -> Result<Self, ConfigError> {
		let blocks = pem::parse_many(bundle)
			.map_err(|e| certificate_error(format!("bundle is not valid PEM: {e}")))?;
		let mut certificate = None;
		let mut key = None;

		for block in &blocks {
			match block.tag() {
				"CERTIFICATE" if certificate.is_none() => certificate = Some(block.contents()),
				tag @ ("RSA PRIVATE KEY" | "PRIVATE KEY" | "ENCRYPTED PRIVATE KEY")
					if key.is_none() =>
					key = Some(pem_key(tag, block.contents(), password)?),
				_ => {},
			}
		}

		let certificate =
			certificate.ok_or_else(|| certificate_error("bundle holds no certificate"))?;
		let key = key.ok_or_else(|| certificate_error("bundle holds no private key"))?;

		Self::assemble(key, certificate)
	}

	/// Opens a PKCS#12 archive and uses its first key with the leading certificate.
	pub fn from_pkcs12(archive: &[u8], password: &str) -> Result<Self, ConfigError> {
		let keystore = KeyStore::from_pkcs12(archive, password).map_err(|_| {
			certificate_error("PKCS#12 archive could not be opened with the supplied password")
		})?;
		let (_, chain) = keystore
			.private_key_chain()
			.ok_or_else(|| certificate_error("PKCS#12 archive holds no private key"))?;
		let certificate = chain
			.chain()
			.first()
			.ok_or_else(|| certificate_error("PKCS#12 archive holds no certificate"))?;

		Self::assemble(pkcs8_rsa_key(chain.key())?, certificate.as_der())
	}

	fn assemble(key: EncodingKey, certificate_der: &[u8]) -> Result<Self, ConfigError> {
		// Malformed keys are only detected when signing.
		jsonwebtoken::crypto::sign(b"acr-credential-helper", &key, Algorithm::PS256)
			.map_err(|_| certificate_error("private key cannot produce RSA signatures"))?;

		Ok(Self { key, thumbprint: URL_SAFE_NO_PAD.encode(Sha256::digest(certificate_der)) })
	}

	/// Base64url SHA-256 thumbprint of the certificate DER.
	pub fn thumbprint(&self) -> &str {
		&self.thumbprint
	}

	/// Signs a short-lived client assertion for `client_id` addressed to `audience`.
	pub fn sign_assertion(&self, client_id: &str, audience: &Url) -> Result<TokenSecret> {
		let now = OffsetDateTime::now_utc();
		let claims = AssertionClaims {
			aud: audience.as_str(),
			iss: client_id,
			sub: client_id,
			jti: rand::rng().sample_iter(Alphanumeric).take(JTI_LEN).map(char::from).collect(),
			nbf: now.unix_timestamp(),
			iat: now.unix_timestamp(),
			exp: (now + ASSERTION_LIFETIME).unix_timestamp(),
		};
		let mut header = Header::new(Algorithm::PS256);

		header.x5t_s256 = Some(self.thumbprint.clone());

		let jwt = jsonwebtoken::encode(&header, &claims, &self.key).map_err(ConfigError::from)?;

		Ok(TokenSecret::new(jwt))
	}
}
impl Debug for ClientCertificate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCertificate").field("thumbprint", &self.thumbprint).finish()
	}
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
	aud: &'a str,
	iss: &'a str,
	sub: &'a str,
	jti: String,
	nbf: i64,
	iat: i64,
	exp: i64,
}

fn pem_key(tag: &str, der: &[u8], password: &str) -> Result<EncodingKey, ConfigError> {
	match tag {
		"RSA PRIVATE KEY" => Ok(EncodingKey::from_rsa_der(der)),
		"ENCRYPTED PRIVATE KEY" => {
			if password.is_empty() {
				return Err(certificate_error(
					"private key is encrypted and no password was supplied",
				));
			}

			let encrypted = EncryptedPrivateKeyInfo::try_from(der)
				.map_err(|_| certificate_error("encrypted private key is malformed"))?;
			let decrypted = encrypted.decrypt(password).map_err(|_| {
				certificate_error("private key could not be decrypted with the supplied password")
			})?;

			pkcs8_rsa_key(decrypted.as_bytes())
		},
		_ => pkcs8_rsa_key(der),
	}
}

// jsonwebtoken signs with PKCS#1 DER, which PKCS#8 wraps for RSA keys.
fn pkcs8_rsa_key(der: &[u8]) -> Result<EncodingKey, ConfigError> {
	let info = PrivateKeyInfo::try_from(der)
		.map_err(|_| certificate_error("private key is not valid PKCS#8"))?;

	if info.algorithm.oid != RSA_ENCRYPTION {
		return Err(certificate_error("private key is not an RSA key"));
	}

	Ok(EncodingKey::from_rsa_der(info.private_key))
}

fn certificate_error(reason: impl Into<String>) -> ConfigError {
	ConfigError::Certificate { reason: reason.into() }
}
