use crate::types::{Action, Attribute, AttributeValue, Guidance, PropertyMeta, Response};

/// Target of a guidance removal: a whole property or one guidance slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveTarget<'a> {
    Property(&'a str),
    Index(usize),
}

/// Turns abstract navigation intents into opaque, presentable actions.
pub trait ActionEncoder: Send + Sync {
    fn query_action(&self, text: &str) -> Action;
    fn refine_action(&self, term_index: usize, property: Option<&str>, value: Option<&str>) -> Action;
    fn guidance_remove_action(&self, target: RemoveTarget<'_>) -> Action;
    fn scenario_action(&self, id: &str) -> Action;
    fn attribute_add_action(&self, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action;
    fn attribute_set_action(&self, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action;
    fn attribute_remove_action(&self, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action;
}

/// Renders raw filter and attribute values into display labels.
pub trait ValueFormatter: Send + Sync {
    fn format_filter_value(&self, property: &str, guidance: &Guidance) -> String;
    fn format_attribute_value(&self, attribute: &Attribute, index: usize, value: &AttributeValue) -> String;
}

pub trait PropertyLookup: Send + Sync {
    fn property(&self, id: &str, group: &str) -> Option<PropertyMeta>;
    fn properties(&self, group: &str) -> Vec<PropertyMeta>;
}

impl PropertyLookup for Response {
    fn property(&self, id: &str, group: &str) -> Option<PropertyMeta> {
        self.group(group)?.properties.iter().find(|p| p.id == id).cloned()
    }

    fn properties(&self, group: &str) -> Vec<PropertyMeta> {
        self.group(group).map(|g| g.properties.clone()).unwrap_or_default()
    }
}
