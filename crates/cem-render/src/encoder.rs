use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use cem_core::config::Config;
use cem_core::error::Result;
use cem_core::traits::{ActionEncoder, RemoveTarget};
use cem_core::types::{Action, Attribute, AttributeValue};

/// Characters left readable in query-string components.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// `[encoder]` section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub base_uri: String,
    /// Separator between hierarchical path segments in the `path` parameter.
    pub path_separator: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { base_uri: "/search".to_string(), path_separator: "/".to_string() }
    }
}

impl EncoderConfig {
    pub const KEY: &'static str = "encoder";

    /// The `[encoder]` section, or the defaults when it is absent. A section
    /// that is present but malformed is an error.
    pub fn from_config(config: &Config) -> Result<Self> {
        if !config.contains(Self::KEY) {
            tracing::debug!("no [encoder] section, using defaults");
            return Ok(Self::default());
        }
        config.get(Self::KEY)
    }
}

/// Encodes actions as links back to the search page.
#[derive(Debug, Clone, Default)]
pub struct UrlActionEncoder {
    config: EncoderConfig,
}

impl UrlActionEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    fn action<'p, I>(&self, parameters: I) -> Action
    where
        I: IntoIterator<Item = (&'p str, String)>,
    {
        let parameters: BTreeMap<String, String> = parameters.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        let query: Vec<String> = parameters
            .iter()
            .map(|(k, v)| format!("{}={}", utf8_percent_encode(k, COMPONENT), utf8_percent_encode(v, COMPONENT)))
            .collect();
        let uri = if query.is_empty() {
            self.config.base_uri.clone()
        } else {
            format!("{}?{}", self.config.base_uri, query.join("&"))
        };
        Action { uri, parameters }
    }

    fn attribute_action(&self, op: &str, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action {
        let path: Vec<&str> =
            parents.iter().copied().chain(std::iter::once(value)).flat_map(|v| v.data.iter().map(String::as_str)).collect();
        self.action([
            ("attribute", attribute.property.clone()),
            ("op", op.to_string()),
            ("path", path.join(&self.config.path_separator)),
        ])
    }
}

impl ActionEncoder for UrlActionEncoder {
    fn query_action(&self, text: &str) -> Action {
        self.action([("q", text.to_string())])
    }

    fn refine_action(&self, term_index: usize, property: Option<&str>, value: Option<&str>) -> Action {
        let mut parameters = vec![("term", term_index.to_string())];
        if let Some(property) = property {
            parameters.push(("property", property.to_string()));
        }
        if let Some(value) = value {
            parameters.push(("value", value.to_string()));
        }
        self.action(parameters)
    }

    fn guidance_remove_action(&self, target: RemoveTarget<'_>) -> Action {
        let target = match target {
            RemoveTarget::Property(property) => property.to_string(),
            RemoveTarget::Index(index) => index.to_string(),
        };
        self.action([("remove", target)])
    }

    fn scenario_action(&self, id: &str) -> Action {
        self.action([("scenario", id.to_string())])
    }

    fn attribute_add_action(&self, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action {
        self.attribute_action("add", attribute, parents, value)
    }

    fn attribute_set_action(&self, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action {
        self.attribute_action("set", attribute, parents, value)
    }

    fn attribute_remove_action(&self, attribute: &Attribute, parents: &[&AttributeValue], value: &AttributeValue) -> Action {
        self.attribute_action("remove", attribute, parents, value)
    }
}
