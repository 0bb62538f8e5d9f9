//! Strategy descriptors and the probe that decides whether a strategy is usable.
//!
//! A [`StrategyDescriptor`] pairs a cheap applicability predicate over [`HelperOptions`] with
//! the backend constructor for that strategy. [`probe`] evaluates the predicate, constructs the
//! authorizer, and immediately requests one token with the same deadline. Any failure is
//! reported as a tagged [`ProbeOutcome::Unusable`] so the resolver can move on.

// self
use crate::{
	_prelude::*,
	auth::{Authorizer, CachingAuthorizer},
	config::HelperOptions,
	deadline::Deadline,
	identity::{IdentityBackend, IdentityFuture},
	obs::{self, StageSpan},
};

/// Identity strategies, listed in resolution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyKind {
	/// Client certificate.
	ClientCertificate,
	/// Client secret.
	ClientSecret,
	/// Managed identity.
	ManagedIdentity,
	/// Workload identity federation (GitHub Actions OIDC).
	FederatedToken,
	/// Azure CLI session.
	AzureCli,
}
impl StrategyKind {
	/// All strategies in resolution order.
	pub const ALL: [Self; 5] = [
		Self::ClientCertificate,
		Self::ClientSecret,
		Self::ManagedIdentity,
		Self::FederatedToken,
		Self::AzureCli,
	];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StrategyKind::ClientCertificate => "client_certificate",
			StrategyKind::ClientSecret => "client_secret",
			StrategyKind::ManagedIdentity => "managed_identity",
			StrategyKind::FederatedToken => "federated_token",
			StrategyKind::AzureCli => "azure_cli",
		}
	}

	/// Zero-based position in the default resolution order.
	pub const fn position(self) -> usize {
		match self {
			StrategyKind::ClientCertificate => 0,
			StrategyKind::ClientSecret => 1,
			StrategyKind::ManagedIdentity => 2,
			StrategyKind::FederatedToken => 3,
			StrategyKind::AzureCli => 4,
		}
	}
}
impl Display for StrategyKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Applicability predicate over the parameter set.
pub type Applicability = fn(&HelperOptions) -> bool;
/// Backend constructor invoked once a strategy is applicable.
pub type Constructor =
	for<'a> fn(&'a dyn IdentityBackend, Deadline, &'a HelperOptions) -> IdentityFuture<'a>;

/// Ordered entry pairing an applicability predicate with a constructor.
#[derive(Clone, Copy)]
pub struct StrategyDescriptor {
	/// Strategy this entry stands for.
	pub kind: StrategyKind,
	/// Decides whether the strategy is worth attempting at all.
	pub applicable: Applicability,
	/// Builds the candidate authorizer.
	pub construct: Constructor,
}
impl StrategyDescriptor {
	/// Default descriptor for `kind`.
	pub const fn of(kind: StrategyKind) -> Self {
		match kind {
			StrategyKind::ClientCertificate => Self {
				kind,
				applicable: certificate_applicable,
				construct: construct_client_certificate,
			},
			StrategyKind::ClientSecret =>
				Self { kind, applicable: secret_applicable, construct: construct_client_secret },
			StrategyKind::ManagedIdentity =>
				Self { kind, applicable: always_applicable, construct: construct_managed_identity },
			StrategyKind::FederatedToken => Self {
				kind,
				applicable: federated_applicable,
				construct: construct_federated_token,
			},
			StrategyKind::AzureCli =>
				Self { kind, applicable: always_applicable, construct: construct_azure_cli },
		}
	}

	/// Overrides the applicability predicate.
	pub const fn with_applicability(mut self, applicable: Applicability) -> Self {
		self.applicable = applicable;

		self
	}

	/// Evaluates the applicability predicate.
	pub fn is_applicable(&self, options: &HelperOptions) -> bool {
		(self.applicable)(options)
	}
}
impl Debug for StrategyDescriptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StrategyDescriptor").field("kind", &self.kind).finish()
	}
}

/// Fixed resolution order: strongest, non-interactive identities first.
pub const DEFAULT_STRATEGIES: [StrategyDescriptor; 5] = [
	StrategyDescriptor::of(StrategyKind::ClientCertificate),
	StrategyDescriptor::of(StrategyKind::ClientSecret),
	StrategyDescriptor::of(StrategyKind::ManagedIdentity),
	StrategyDescriptor::of(StrategyKind::FederatedToken),
	StrategyDescriptor::of(StrategyKind::AzureCli),
];

/// Why a strategy could not be used.
#[derive(Debug)]
pub enum Unusable {
	/// The applicability predicate rejected the parameter set; no I/O was attempted.
	NotApplicable,
	/// The constructor failed.
	Construction(Error),
	/// The authorizer was built but its first token request failed.
	Validation(Error),
	/// The caller's deadline elapsed while probing.
	///
	/// Shorter, strategy-local timeouts are reported as construction or validation failures.
	DeadlineExceeded,
}
impl Unusable {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Unusable::NotApplicable => "not_applicable",
			Unusable::Construction(_) => "construction",
			Unusable::Validation(_) => "validation",
			Unusable::DeadlineExceeded => "deadline_exceeded",
		}
	}
}
impl Display for Unusable {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Unusable::NotApplicable => f.write_str("not applicable to the configured options"),
			Unusable::Construction(e) => write!(f, "construction failed: {e}"),
			Unusable::Validation(e) => write!(f, "validation failed: {e}"),
			Unusable::DeadlineExceeded => f.write_str("deadline exceeded"),
		}
	}
}

/// Tagged probe result.
pub enum ProbeOutcome {
	/// The strategy produced a validated authorizer (already wrapped in a token cache).
	Usable(Arc<dyn Authorizer>),
	/// The strategy cannot be used; the reason stays internal.
	Unusable(Unusable),
}
impl ProbeOutcome {
	/// Returns `true` for [`ProbeOutcome::Usable`].
	pub fn is_usable(&self) -> bool {
		matches!(self, Self::Usable(_))
	}
}
impl Debug for ProbeOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Usable(_) => f.write_str("ProbeOutcome::Usable(..)"),
			Self::Unusable(reason) => f.debug_tuple("ProbeOutcome::Unusable").field(reason).finish(),
		}
	}
}

/// Constructs and validates one strategy under `deadline`. Never fails.
pub async fn probe(
	backend: &dyn IdentityBackend,
	descriptor: &StrategyDescriptor,
	options: &HelperOptions,
	deadline: Deadline,
) -> ProbeOutcome {
	let kind = descriptor.kind;

	if !descriptor.is_applicable(options) {
		return unusable(kind, Unusable::NotApplicable);
	}

	let span = StageSpan::probe(kind);

	span.instrument(async move {
		let authorizer =
			match deadline.run("probe", (descriptor.construct)(backend, deadline, options)).await {
				Ok(authorizer) => authorizer,
				Err(e) if deadline.is_elapsed() && e.is_deadline() =>
					return unusable(kind, Unusable::DeadlineExceeded),
				Err(e) => return unusable(kind, Unusable::Construction(e)),
			};
		let token = match deadline.run("probe", authorizer.token(deadline)).await {
			Ok(token) => token,
			Err(e) if deadline.is_elapsed() && e.is_deadline() =>
				return unusable(kind, Unusable::DeadlineExceeded),
			Err(e) => return unusable(kind, Unusable::Validation(e)),
		};

		obs::record_probe_outcome(kind, "usable");

		ProbeOutcome::Usable(Arc::new(CachingAuthorizer::primed(authorizer, token)))
	})
	.await
}

fn unusable(kind: StrategyKind, reason: Unusable) -> ProbeOutcome {
	obs::log_unusable(kind, &reason);
	obs::record_probe_outcome(kind, reason.as_str());

	ProbeOutcome::Unusable(reason)
}

fn certificate_applicable(options: &HelperOptions) -> bool {
	options.has_certificate()
}

fn secret_applicable(options: &HelperOptions) -> bool {
	!options.tenant_id().is_empty()
		&& !options.client_id().is_empty()
		&& !options.client_secret().is_empty()
}

fn federated_applicable(options: &HelperOptions) -> bool {
	!options.federated_token_url().is_empty() || !options.federated_token().is_empty()
}

fn always_applicable(_: &HelperOptions) -> bool {
	true
}

fn construct_client_certificate<'a>(
	backend: &'a dyn IdentityBackend,
	deadline: Deadline,
	options: &'a HelperOptions,
) -> IdentityFuture<'a> {
	backend.client_certificate(deadline, options)
}

fn construct_client_secret<'a>(
	backend: &'a dyn IdentityBackend,
	deadline: Deadline,
	options: &'a HelperOptions,
) -> IdentityFuture<'a> {
	backend.client_secret(deadline, options)
}

fn construct_managed_identity<'a>(
	backend: &'a dyn IdentityBackend,
	deadline: Deadline,
	options: &'a HelperOptions,
) -> IdentityFuture<'a> {
	backend.managed_identity(deadline, options)
}

fn construct_federated_token<'a>(
	backend: &'a dyn IdentityBackend,
	deadline: Deadline,
	options: &'a HelperOptions,
) -> IdentityFuture<'a> {
	backend.federated_token(deadline, options)
}

fn construct_azure_cli<'a>(
	backend: &'a dyn IdentityBackend,
	deadline: Deadline,
	options: &'a HelperOptions,
) -> IdentityFuture<'a> {
	backend.azure_cli(deadline, options)
}
