#![allow(dead_code)]

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

use cem_core::context::ContextStore;
use cem_core::traits::{ActionEncoder, RemoveTarget, ValueFormatter};
use cem_core::types::{
    Action, Attribute, AttributeValue, ContextScope, Guidance, Response, ScopeLevel, SyncMode,
};
use cem_guidance::Refinement;

/// Encodes every action as a readable string and remembers it.
#[derive(Default)]
pub struct RecordingEncoder {
    calls: Mutex<Vec<String>>,
}

impl RecordingEncoder {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, uri: String) -> Action {
        self.calls.lock().unwrap().push(uri.clone());
        Action { uri, parameters: BTreeMap::new() }
    }

    fn attribute(&self, op: &str, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action {
        let path: Vec<&str> = parents.iter().chain([&value]).map(|v| v.key()).collect();
        self.record(format!("{op}:{}:{}", attribute.property, path.join("/")))
    }
}

impl ActionEncoder for RecordingEncoder {
    fn query_action(&self, text: &str) -> Action {
        self.record(format!("query:{text}"))
    }

    fn refine_action(&self, term_index: usize, property: Option<&str>, value: Option<&str>) -> Action {
        self.record(format!("refine:{term_index}:{}:{}", property.unwrap_or(""), value.unwrap_or("")))
    }

    fn guidance_remove_action(&self, target: RemoveTarget<'_>) -> Action {
        match target {
            RemoveTarget::Property(property) => self.record(format!("remove:property:{property}")),
            RemoveTarget::Index(index) => self.record(format!("remove:index:{index}")),
        }
    }

    fn scenario_action(&self, id: &str) -> Action {
        self.record(format!("scenario:{id}"))
    }

    fn attribute_add_action(&self, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action {
        self.attribute("add", attribute, parents, value)
    }

    fn attribute_set_action(&self, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action {
        self.attribute("set", attribute, parents, value)
    }

    fn attribute_remove_action(&self, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action {
        self.attribute("remove", attribute, parents, value)
    }
}

/// Labels values by their raw keys.
pub struct KeyFormatter;

impl ValueFormatter for KeyFormatter {
    fn format_filter_value(&self, _property: &str, guidance: &Guidance) -> String {
        guidance.data.join("/")
    }

    fn format_attribute_value(&self, _attribute: &Attribute, _index: usize, value: &AttributeValue) -> String {
        value.key().to_string()
    }
}

pub fn response(groups: Value) -> Response {
    serde_json::from_value(serde_json::json!({ "groups": groups })).expect("fixture response")
}

pub fn scope(name: &str, data: &str) -> ContextScope {
    ContextScope { name: name.to_string(), level: ScopeLevel::Search, mode: SyncMode::Aggregate, data: data.to_string() }
}

pub fn contexts(model: Value, profile: Value) -> ContextStore {
    let mut store = ContextStore::new();
    store.insert(scope("model", &model.to_string()));
    store.insert(scope("profile", &profile.to_string()));
    store
}

pub fn names(refinement: &Refinement) -> Vec<&str> {
    refinement.values.iter().map(|v| v.name.as_str()).collect()
}

pub fn assert_selection_counts(refinements: &[Refinement]) {
    for refinement in refinements {
        let selected = refinement.values.iter().filter(|v| v.selected).count();
        assert_eq!(refinement.values_selected, selected, "selection count of {}", refinement.property);
        let filtering = refinement.values.iter().filter(|v| v.filtering).count();
        assert_eq!(refinement.values_filtering, filtering, "filtering count of {}", refinement.property);
    }
}
