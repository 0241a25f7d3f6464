//! IAM constructs: an OpenID Connect identity provider, and a role that can
//! only be assumed by tokens from that provider for one source repository.

pub mod oidc;
pub mod role;

pub use oidc::{CfnOidcProvider, OidcInput, OidcOutputs, GITHUB_ACTIONS_ISSUER, GITHUB_THUMBPRINTS, STS_AUDIENCE};
pub use role::{is_broad_statement, CfnRole, GithubTrust, Input, Policy, RoleOutputs};
