use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    // The user hasn't been asked yet
    NotDetermined,
    // Access is blocked by policy, the user can't change it
    Restricted,
    Denied,
    Authorized,
    // Access to a user-selected subset of the library
    Limited,
}

impl AuthorizationStatus {
    pub fn grants_access(&self) -> bool {
        match self {
            AuthorizationStatus::Authorized | AuthorizationStatus::Limited => true,
            AuthorizationStatus::NotDetermined
            | AuthorizationStatus::Restricted
            | AuthorizationStatus::Denied => false,
        }
    }
}

/// Reports whether the catalog may be read. Prompting the user is the gate's business, the
/// coordinator only asks for the current status.
pub trait PermissionGate {
    fn authorization_status(&self) -> AuthorizationStatus;
}

/// A gate with a fixed answer
#[derive(Copy, Clone, Debug)]
pub struct StaticPermissionGate(pub AuthorizationStatus);

impl PermissionGate for StaticPermissionGate {
    fn authorization_status(&self) -> AuthorizationStatus {
        self.0
    }
}
