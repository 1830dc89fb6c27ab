//! Caller identity: credential resolution, role gating and the client session store.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod role;
mod token;
mod provider;
mod profile;
mod resolver;
mod request_context;
mod authorizer;
mod session;

pub use principal::{Identity, PartialIdentity, Metadata, email_local_part};
pub use role::{Role, format_roles};
pub use token::{bearer_from_headers, decode_unverified, RawClaims};
pub use provider::{AuthProvider, HttpAuthProvider, ProviderUser, ProviderSession, AuthEvent};
pub use profile::{ProfileRecord, ProfileStore, RestProfileStore};
pub use resolver::{Resolver, ProviderResolver, RawDecodeResolver, IdentityService, RoleSource, determine_role, build_identity};
pub use request_context::RequestContext;
pub use authorizer::{authorize, require_role, role_gate, RoleGate};
pub use session::{SessionState, SessionStore};
