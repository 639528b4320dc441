use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use uuid::Uuid;

/// Opaque reference to one entry in an asset catalog. Stable for the lifetime of the catalog and
/// only meaningful when compared against other refs from the same catalog.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AssetRef(pub u128);

impl AssetRef {
    pub fn from_uuid(uuid: Uuid) -> Self {
        AssetRef(uuid.as_u128())
    }

    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_u128(self.0)
    }
}

impl Debug for AssetRef {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_tuple("AssetRef")
            .field(&Uuid::from_u128(self.0))
            .finish()
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.as_uuid())
    }
}
