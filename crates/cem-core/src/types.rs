//! Typed data model for decoded CEM responses and context scopes.
//!
//! Everything in here is read-only input to the resolvers. Wire names are
//! camelCase so a decoded response can be fed through `serde_json` directly.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type PropertyId = String;
pub type GroupId = String;

/// How long a context scope survives on the client side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScopeLevel {
    Visitor,
    Session,
    Search,
}

/// How the server merges a scope sent back by the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Aggregate,
    Sequential,
}

/// An opaque named context blob (model, user-state, profile, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextScope {
    pub name: String,
    pub level: ScopeLevel,
    pub mode: SyncMode,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceMode {
    #[default]
    Guidance,
    Hierarchical,
    Range,
}

/// One active filter value. `data` holds a single key, a hierarchical path
/// or a `[from, to]` pair depending on `mode`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Guidance {
    pub property: PropertyId,
    #[serde(default)]
    pub mode: GuidanceMode,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub data: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TermType {
    Matched,
    Refined,
    Ambiguous,
    Unfiltered,
    Unmatched,
    /// Term kinds this crate does not know; never filter or disambiguate.
    #[serde(other)]
    Other,
}

/// A candidate disambiguation value for an ambiguous term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TermCandidate {
    pub value: String,
    #[serde(default)]
    pub population: u64,
    #[serde(default)]
    pub previews: Vec<RawResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TermRefinement {
    pub property: PropertyId,
    #[serde(default)]
    pub values: Vec<TermCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryTerm {
    pub index: usize,
    #[serde(rename = "type")]
    pub kind: TermType,
    pub value: String,
    #[serde(default)]
    pub refinements: Vec<TermRefinement>,
    #[serde(default)]
    pub guidances: Vec<Guidance>,
}

impl QueryTerm {
    /// Number of candidate values across every refinement of this term.
    pub fn candidate_count(&self) -> usize {
        self.refinements.iter().map(|r| r.values.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    #[default]
    Text,
    Number,
    NumberRange,
    Date,
    DateRange,
    #[serde(other)]
    Other,
}

impl AttributeType {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::NumberRange)
    }

    pub fn is_range(self) -> bool {
        matches!(self, Self::NumberRange | Self::DateRange)
    }
}

pub const HIERARCHICAL_FLAG: &str = "hierarchical";

/// One facet definition from a response group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub property: PropertyId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: AttributeType,
    #[serde(default)]
    pub property_flags: BTreeSet<String>,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub values: Vec<AttributeValue>,
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl Attribute {
    pub fn is_hierarchical(&self) -> bool {
        self.property_flags.contains(HIERARCHICAL_FLAG)
    }
}

/// A facet value. Children are only populated for hierarchical attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AttributeValue {
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub population: u64,
    #[serde(default)]
    pub children: Vec<AttributeValue>,
    #[serde(default)]
    pub previews: Vec<RawResource>,
}

impl AttributeValue {
    /// Leaf segment of the key tuple, used for labels and preference lookup.
    pub fn key(&self) -> &str {
        self.data.last().map_or("", String::as_str)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RawPropertyValue {
    #[serde(default)]
    pub data: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RawProperty {
    pub property: PropertyId,
    #[serde(default)]
    pub values: Vec<RawPropertyValue>,
}

/// Resource payload as sent by the server, before flattening.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawResource {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
}

/// Flattened display record built from a [`RawResource`].
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub language: String,
    pub name: String,
    pub weight: f64,
    pub properties: BTreeMap<PropertyId, Vec<String>>,
    /// Single-valued properties, addressable without indexing.
    pub scalars: BTreeMap<PropertyId, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

/// Property metadata declared by a response group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PropertyMeta {
    pub id: PropertyId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: AttributeType,
    #[serde(default)]
    pub flags: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchResults {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub results: Vec<RawResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScenarioPayload {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub recommendations: Vec<RawResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GroupResponse {
    #[serde(default)]
    pub properties: Vec<PropertyMeta>,
    #[serde(default)]
    pub search: SearchResults,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioPayload>,
}

impl GroupResponse {
    pub fn attribute(&self, property: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.property == property)
    }
}

/// A decoded response, keyed by group id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Response {
    #[serde(default)]
    pub groups: HashMap<GroupId, GroupResponse>,
}

impl Response {
    pub fn group(&self, group: &str) -> Option<&GroupResponse> {
        self.groups.get(group)
    }
}

/// Decoded `model` context: the server's linguistic view of the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelContext {
    #[serde(default, deserialize_with = "lenient_text")]
    pub query_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub query_terms: Vec<QueryTerm>,
    /// Positional: removal by index refers to these slots, so a malformed
    /// entry keeps its slot as an empty guidance.
    #[serde(default, deserialize_with = "lenient_slots")]
    pub guidances: Vec<Guidance>,
}

/// Non-string query text reads as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// Decode a list entry by entry, dropping the entries that do not fit `T`.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(decode_entries(Value::deserialize(deserializer)?).into_iter().flatten().collect())
}

/// Like [`lenient_list`], but a malformed entry becomes `T::default()`.
fn lenient_slots<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(decode_entries(Value::deserialize(deserializer)?).into_iter().map(Option::unwrap_or_default).collect())
}

fn decode_entries<T: DeserializeOwned>(value: Value) -> Vec<Option<T>> {
    let Value::Array(entries) = value else {
        tracing::debug!("expected a list, reading as empty");
        return Vec::new();
    };
    entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            serde_json::from_value(entry)
                .map_err(|e| tracing::debug!(position, error = %e, "skipping malformed entry"))
                .ok()
        })
        .collect()
}

/// Per-value user preference derived from the profile context.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Preference {
    /// Normalized weight in `[0, 1]`.
    pub weight: f64,
    /// 1-based rank within the owning property.
    pub offset: usize,
}

/// Opaque action reference produced by an `ActionEncoder`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct Action {
    pub uri: String,
    pub parameters: BTreeMap<String, String>,
}

/// Explicit per-request input replacing ambient request/session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub group: GroupId,
    pub language: Option<String>,
}

impl RequestContext {
    pub fn new(group: impl Into<GroupId>) -> Self {
        Self { group: group.into(), language: None }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("search")
    }
}
