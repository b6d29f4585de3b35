use cem_core::traits::ValueFormatter;
use cem_core::types::{Attribute, AttributeValue, Guidance, GuidanceMode};

/// Locale-neutral labels: ranges as `from - to`, hierarchical paths as
/// `a > b`, everything else by its leaf key.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainValueFormatter;

fn range(data: &[String]) -> Option<String> {
    match data {
        [from, to] if from.is_empty() => Some(format!("- {to}")),
        [from, to] if to.is_empty() => Some(format!("{from} -")),
        [from, to] => Some(format!("{from} - {to}")),
        _ => None,
    }
}

impl ValueFormatter for PlainValueFormatter {
    fn format_filter_value(&self, property: &str, guidance: &Guidance) -> String {
        let label = match guidance.mode {
            GuidanceMode::Hierarchical => Some(guidance.data.join(" > ")),
            GuidanceMode::Range => range(&guidance.data),
            GuidanceMode::Guidance => None,
        };
        label.unwrap_or_else(|| {
            if guidance.data.is_empty() {
                tracing::trace!(property, "empty guidance data");
            }
            guidance.data.join(", ")
        })
    }

    fn format_attribute_value(&self, attribute: &Attribute, _index: usize, value: &AttributeValue) -> String {
        if attribute.kind.is_range() {
            if let Some(label) = range(&value.data) {
                return label;
            }
        }
        value.key().to_string()
    }
}
