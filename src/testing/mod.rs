//! Unit-test fixtures: an in-memory service context and a scripted
//! permission gate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::async_trait;
use serde_json::{json, Value};

use crate::config::ListingConfig;
use crate::permissions::{Action, Caller, DummyPermissionGate, PermissionGate};
use crate::services::{database_service, MetaError, ServiceContext};
use crate::store::MemoryStore;
use crate::types::Document;

pub fn listing() -> ListingConfig {
    ListingConfig { default_per_page: 50, max_per_page: Some(1000) }
}

/// Empty memory store, permission checks bypassed.
pub fn context() -> ServiceContext {
    ServiceContext::new(Arc::new(MemoryStore::new()), Arc::new(DummyPermissionGate), listing())
}

pub fn context_with_gate(gate: impl PermissionGate + 'static) -> ServiceContext {
    ServiceContext::new(Arc::new(MemoryStore::new()), Arc::new(gate), listing())
}

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap_or_default()
}

/// Context with the database `default` already created.
pub async fn seeded_context() -> ServiceContext {
    let ctx = context();
    database_service::create(&ctx, &Caller::anonymous(), doc(json!({"database_id": "default"})))
        .await
        .expect("seed database");
    ctx
}

/// Gate with a fixed action list and hidden columns per database.
#[derive(Debug, Default, Clone)]
pub struct StaticGate {
    pub permitted: HashMap<String, HashSet<Action>>,
    pub hidden: HashMap<String, Vec<String>>,
    pub failing: bool,
}

impl StaticGate {
    pub fn allow(mut self, database_id: &str, actions: &[Action]) -> Self {
        self.permitted
            .entry(database_id.to_string())
            .or_default()
            .extend(actions.iter().copied());
        self
    }

    pub fn hide(mut self, database_id: &str, columns: &[&str]) -> Self {
        self.hidden
            .insert(database_id.to_string(), columns.iter().map(|c| c.to_string()).collect());
        self
    }
}

#[async_trait]
impl PermissionGate for StaticGate {
    async fn is_permitted(&self, _caller: &Caller, action: Action, database_id: &str) -> bool {
        !self.failing
            && self
                .permitted
                .get(database_id)
                .map_or(false, |actions| actions.contains(&action))
    }

    async fn columns_to_filter(&self, _caller: &Caller, database_id: &str) -> Result<Vec<String>, MetaError> {
        if self.failing {
            return Err(MetaError::PermissionDenied("permission manager unavailable".to_string()));
        }
        Ok(self.hidden.get(database_id).cloned().unwrap_or_default())
    }
}
