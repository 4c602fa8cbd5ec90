use axum::async_trait;
use reqwest::header::AUTHORIZATION;
use tracing::warn;

use super::{Action, Caller, PermissionGate};
use crate::services::MetaError;

/// Asks the permission manager service over HTTP. Any failure to get an
/// answer counts as "not permitted".
#[derive(Debug, Clone)]
pub struct RemotePermissionGate {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl RemotePermissionGate {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Some(base_url.into().trim_end_matches('/').to_string()),
        }
    }

    /// A gate with nowhere to ask; it denies every action.
    pub fn unreachable() -> Self {
        Self { client: reqwest::Client::new(), base_url: None }
    }

    async fn fetch_list(&self, caller: &Caller, endpoint: &str, database_id: &str) -> Result<Vec<String>, String> {
        let base = self.base_url.as_deref().ok_or("no permission manager configured")?;
        let url = format!("{}/{}/{}", base, endpoint, database_id);

        let mut request = self.client.get(&url);
        if let Some(authorization) = &caller.authorization {
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        response.json::<Vec<String>>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl PermissionGate for RemotePermissionGate {
    async fn is_permitted(&self, caller: &Caller, action: Action, database_id: &str) -> bool {
        match self.fetch_list(caller, "permitted-actions", database_id).await {
            Ok(actions) => actions.iter().any(|a| a == action.as_str()),
            Err(e) => {
                warn!("permission check for {} on {:?} failed: {}", action, database_id, e);
                false
            }
        }
    }

    async fn columns_to_filter(&self, caller: &Caller, database_id: &str) -> Result<Vec<String>, MetaError> {
        self.fetch_list(caller, "filtered-columns", database_id).await.map_err(|e| {
            warn!("column filter lookup for {:?} failed: {}", database_id, e);
            MetaError::PermissionDenied(format!("could not resolve visible columns of \"{}\"", database_id))
        })
    }
}
