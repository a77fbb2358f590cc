//! Principal resolution port.

use async_trait::async_trait;

use super::{error::AuthError, value_object::Principal};

/// Authentication collaborator: maps an opaque session token to a principal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Principal, AuthError>;
}
