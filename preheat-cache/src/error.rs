use crate::AuthorizationStatus;
use preheat_base::{AssetRef, LoadHandle};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum PreheatError {
    StringError(String),
    // The permission gate did not grant access to the catalog. Nothing was fetched.
    AccessDenied(AuthorizationStatus),
    // An image load produced no data. Delivered to the slot as an absent image, never retried.
    LoadFailed(AssetRef),
    // A delivery arrived for a handle that no longer owns its slot
    StaleCompletion(LoadHandle),
    IoError(Arc<std::io::Error>),
    JsonError(Arc<serde_json::Error>),
}

impl std::error::Error for PreheatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            PreheatError::StringError(_) => None,
            PreheatError::AccessDenied(_) => None,
            PreheatError::LoadFailed(_) => None,
            PreheatError::StaleCompletion(_) => None,
            PreheatError::IoError(ref e) => Some(&**e),
            PreheatError::JsonError(ref e) => Some(&**e),
        }
    }
}

impl core::fmt::Display for PreheatError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            PreheatError::StringError(ref e) => e.fmt(fmt),
            PreheatError::AccessDenied(status) => {
                write!(fmt, "access to the asset catalog was not granted ({:?})", status)
            }
            PreheatError::LoadFailed(asset) => write!(fmt, "image load failed for asset {}", asset),
            PreheatError::StaleCompletion(handle) => {
                write!(fmt, "completion for superseded load handle {:?}", handle)
            }
            PreheatError::IoError(ref e) => e.fmt(fmt),
            PreheatError::JsonError(ref e) => e.fmt(fmt),
        }
    }
}

impl From<&str> for PreheatError {
    fn from(str: &str) -> Self {
        PreheatError::StringError(str.to_string())
    }
}

impl From<String> for PreheatError {
    fn from(string: String) -> Self {
        PreheatError::StringError(string)
    }
}

impl From<std::io::Error> for PreheatError {
    fn from(error: std::io::Error) -> Self {
        PreheatError::IoError(Arc::new(error))
    }
}

impl From<serde_json::Error> for PreheatError {
    fn from(error: serde_json::Error) -> Self {
        PreheatError::JsonError(Arc::new(error))
    }
}

pub type PreheatResult<T> = Result<T, PreheatError>;
