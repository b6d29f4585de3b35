//! Named context scopes handed out by the server.
//!
//! Scopes are replaced wholesale per name; partial updates never happen.
//! Persisting them between requests is the job of an external state handler,
//! which reads them back through [`ContextStore::scopes_at`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{ContextScope, ModelContext, ScopeLevel};

pub const MODEL_CONTEXT: &str = "model";
pub const PROFILE_CONTEXT: &str = "profile";

#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    scopes: BTreeMap<String, ContextScope>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the scope stored under `scope.name`.
    pub fn insert(&mut self, scope: ContextScope) -> Option<ContextScope> {
        self.scopes.insert(scope.name.clone(), scope)
    }

    pub fn merge<I>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = ContextScope>,
    {
        for scope in scopes {
            self.insert(scope);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ContextScope> {
        self.scopes.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ContextScope> {
        self.scopes.remove(name)
    }

    pub fn scopes_at(&self, level: ScopeLevel) -> impl Iterator<Item = &ContextScope> {
        self.scopes.values().filter(move |s| s.level == level)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Strict decode of a scope's JSON payload.
    pub fn try_json(&self, name: &str) -> Result<Value> {
        let scope = self.get(name).ok_or_else(|| Error::NotFound(format!("context '{name}'")))?;
        Ok(serde_json::from_str(&scope.data)?)
    }

    /// Lenient decode: absent, undecodable or non-object payloads become `{}`.
    pub fn json(&self, name: &str) -> Value {
        match self.try_json(name) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => {
                tracing::debug!(context = name, "context is not a JSON object");
                Value::Object(Map::new())
            }
            Err(e) => {
                tracing::debug!(context = name, error = %e, "context unavailable");
                Value::Object(Map::new())
            }
        }
    }

    /// Typed view of a scope, falling back to `T::default()`.
    pub fn typed<T>(&self, name: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        serde_json::from_value(self.json(name)).unwrap_or_else(|e| {
            tracing::debug!(context = name, error = %e, "context does not match expected shape");
            T::default()
        })
    }

    pub fn model(&self) -> ModelContext {
        self.typed(MODEL_CONTEXT)
    }

    pub fn profile(&self) -> Value {
        self.json(PROFILE_CONTEXT)
    }
}
