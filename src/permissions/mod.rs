//! Authorization seam. Every resource operation asks a [`PermissionGate`]
//! whether the caller may perform an [`Action`] on a database, and which
//! columns must be hidden from them.

pub mod remote;

use std::fmt;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};

use crate::config::PermissionConfig;
use crate::services::MetaError;

pub use remote::RemotePermissionGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    DatabasesRead,
    DatabasesWriteAdd,
    DatabasesWriteUpdate,
    DatabasesWriteDelete,
    MetadataRead,
    MetadataReadSecret,
    MetadataWriteAdd,
    MetadataWriteUpdate,
    MetadataWriteDelete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::DatabasesRead => "databases:read",
            Action::DatabasesWriteAdd => "databases:write:add",
            Action::DatabasesWriteUpdate => "databases:write:update",
            Action::DatabasesWriteDelete => "databases:write:delete",
            Action::MetadataRead => "metadata:read",
            Action::MetadataReadSecret => "metadata:read:secret",
            Action::MetadataWriteAdd => "metadata:write:add",
            Action::MetadataWriteUpdate => "metadata:write:update",
            Action::MetadataWriteDelete => "metadata:write:delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking. The raw `Authorization` header is forwarded to the
/// permission manager as-is.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub authorization: Option<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_authorization(value: impl Into<String>) -> Self {
        Self { authorization: Some(value.into()) }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(Caller { authorization })
    }
}

#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn is_permitted(&self, caller: &Caller, action: Action, database_id: &str) -> bool;

    /// Columns of `database_id` the caller must not see.
    async fn columns_to_filter(&self, caller: &Caller, database_id: &str) -> Result<Vec<String>, MetaError>;

    /// Whether listings have to be filtered per database.
    fn is_enforced(&self) -> bool {
        true
    }

    async fn filter_permitted_databases(&self, caller: &Caller, database_ids: Vec<String>) -> Vec<String> {
        let mut permitted = Vec::with_capacity(database_ids.len());
        for id in database_ids {
            if self.is_permitted(caller, Action::DatabasesRead, &id).await {
                permitted.push(id);
            }
        }
        permitted
    }
}

/// Allows everything and hides nothing.
#[derive(Debug, Clone, Default)]
pub struct DummyPermissionGate;

#[async_trait]
impl PermissionGate for DummyPermissionGate {
    async fn is_permitted(&self, _caller: &Caller, _action: Action, _database_id: &str) -> bool {
        true
    }

    async fn columns_to_filter(&self, _caller: &Caller, _database_id: &str) -> Result<Vec<String>, MetaError> {
        Ok(vec![])
    }

    fn is_enforced(&self) -> bool {
        false
    }

    async fn filter_permitted_databases(&self, _caller: &Caller, database_ids: Vec<String>) -> Vec<String> {
        database_ids
    }
}

pub fn from_config(config: &PermissionConfig) -> Arc<dyn PermissionGate> {
    match (&config.service_url, config.ignore_permission_check) {
        (Some(url), false) => {
            tracing::info!("Checking permissions against {}", url);
            Arc::new(RemotePermissionGate::new(url.clone()))
        }
        (None, false) => {
            tracing::warn!("No permission manager configured; every permission check will be denied");
            Arc::new(RemotePermissionGate::unreachable())
        }
        (_, true) => {
            tracing::warn!("Permission checks are disabled");
            Arc::new(DummyPermissionGate)
        }
    }
}

/// Fails with `PermissionDenied` unless `action` is allowed.
pub async fn require(
    gate: &dyn PermissionGate,
    caller: &Caller,
    action: Action,
    database_id: &str,
) -> Result<(), MetaError> {
    if gate.is_permitted(caller, action, database_id).await {
        Ok(())
    } else {
        tracing::warn!("permission denied: {} on {:?}", action, database_id);
        Err(MetaError::PermissionDenied(format!("{} on \"{}\"", action, database_id)))
    }
}
