//! Flattening of raw resource payloads into display records.

use std::collections::{BTreeMap, HashSet};

use cem_core::types::{RawResource, Resource};

/// Flatten a raw resource. Hierarchical property values keep their leaf
/// segment; single-valued properties are mirrored into `scalars`.
pub fn build_resource(raw: &RawResource) -> Resource {
    let mut properties = BTreeMap::new();
    let mut scalars = BTreeMap::new();
    for property in &raw.properties {
        let values: Vec<String> = property.values.iter().filter_map(|v| v.data.last().cloned()).collect();
        if let [only] = values.as_slice() {
            scalars.insert(property.property.clone(), only.clone());
        }
        properties.insert(property.property.clone(), values);
    }
    Resource {
        id: raw.id.clone(),
        kind: raw.kind.clone(),
        language: raw.language.clone(),
        name: raw.name.clone(),
        weight: raw.weight,
        properties,
        scalars,
        scenario: None,
    }
}

/// First preview whose id has not been handed out yet; marks it as used.
pub(crate) fn take_preview(previews: &[RawResource], used: &mut HashSet<String>) -> Option<Resource> {
    let preview = previews.iter().find(|p| !used.contains(&p.id))?;
    used.insert(preview.id.clone());
    Some(build_resource(preview))
}
