//! Facet resolution: turns one attribute's value tree plus the active
//! guidances on its property into a displayable [`Refinement`].
//!
//! Hierarchical attributes are walked top-down. A single root with children
//! is transparent, a selected value with children is drilled into, and a
//! lone catch-all branch holding every result is collapsed. The first level
//! that survives these rules is rendered.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use cem_core::types::{Action, Attribute, AttributeType, AttributeValue, Guidance, Preference, Resource};

use crate::resources::{build_resource, take_preview};
use crate::Capabilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetMode {
    /// Every value, flagged `filtering` when it narrows the result set.
    Refinement,
    /// What-if view of a filtered facet; `filtering` marks unselected values.
    Alternative,
}

/// Display-relevant slice of an [`Attribute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeView {
    pub property: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub hierarchical: bool,
    pub data: Vec<String>,
}

impl From<&Attribute> for AttributeView {
    fn from(attribute: &Attribute) -> Self {
        Self {
            property: attribute.property.clone(),
            name: attribute.name.clone(),
            kind: attribute.kind,
            hierarchical: attribute.is_hierarchical(),
            data: attribute.data.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedValue {
    pub index: usize,
    pub name: String,
    pub data: Vec<String>,
    pub population: u64,
    pub selected: bool,
    pub filtering: bool,
    pub add_action: Action,
    pub set_action: Action,
    pub remove_action: Action,
    pub preference: f64,
    pub favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Resource>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refinement {
    pub property: String,
    pub label: String,
    pub parents: Vec<ResolvedValue>,
    pub values: Vec<ResolvedValue>,
    pub values_selected: usize,
    pub values_filtering: usize,
    pub values_with_preview: usize,
    pub attribute: AttributeView,
}

/// Everything one facet resolution reads.
#[derive(Debug, Clone, Copy)]
pub struct FacetInput<'a> {
    pub attribute: &'a Attribute,
    pub filters: &'a [Guidance],
    /// Preferences of the attribute's property, keyed by value key.
    pub preferences: Option<&'a BTreeMap<String, Preference>>,
    pub results_total: u64,
}

pub struct FacetResolver<'a> {
    caps: Capabilities<'a>,
    mode: FacetMode,
    favorite_ratio: f64,
}

impl<'a> FacetResolver<'a> {
    pub fn new(caps: Capabilities<'a>, mode: FacetMode, favorite_ratio: f64) -> Self {
        Self { caps, mode, favorite_ratio }
    }

    pub fn mode(&self) -> FacetMode {
        self.mode
    }

    /// Resolve one attribute. `previews` is the set of resource ids already
    /// used as previews during the enclosing call; it is extended in place.
    pub fn resolve(&self, input: &FacetInput<'_>, previews: &mut HashSet<String>) -> Option<Refinement> {
        let resolved = self.descend(input, &input.attribute.values, Vec::new(), previews);
        if resolved.is_none() {
            tracing::trace!(property = %input.attribute.property, mode = ?self.mode, "no displayable values");
        }
        resolved
    }

    fn descend<'v>(
        &self,
        input: &FacetInput<'v>,
        values: &'v [AttributeValue],
        parents: Vec<&'v AttributeValue>,
        previews: &mut HashSet<String>,
    ) -> Option<Refinement> {
        if input.attribute.is_hierarchical() {
            if let [only] = values {
                if only.has_children() {
                    return self.descend(input, &only.children, extend(&parents, only), previews);
                }
            }

            let mut any_selected = false;
            for value in values {
                if !self.is_selected(input, &parents, value) {
                    continue;
                }
                any_selected = true;
                if value.has_children() {
                    if let Some(deeper) = self.try_descend(input, value, &parents, previews) {
                        return Some(deeper);
                    }
                }
            }

            if !any_selected {
                let mut catch_all = values.iter().filter(|v| v.population >= input.results_total);
                if let (Some(branch), None) = (catch_all.next(), catch_all.next()) {
                    if branch.has_children() {
                        if let Some(deeper) = self.try_descend(input, branch, &parents, previews) {
                            return Some(deeper);
                        }
                    }
                }
            }
        }

        self.render_level(input, values, &parents, previews)
    }

    /// Descend into `value`'s children, committing preview usage only when
    /// the deeper level is accepted.
    fn try_descend<'v>(
        &self,
        input: &FacetInput<'v>,
        value: &'v AttributeValue,
        parents: &[&'v AttributeValue],
        previews: &mut HashSet<String>,
    ) -> Option<Refinement> {
        let mut trial = previews.clone();
        let deeper = self.descend(input, &value.children, extend(parents, value), &mut trial)?;
        // Alternatives stay on the selected level unless the selection continues below.
        if self.mode == FacetMode::Alternative && deeper.values_selected == 0 {
            return None;
        }
        *previews = trial;
        Some(deeper)
    }

    fn render_level(
        &self,
        input: &FacetInput<'_>,
        values: &[AttributeValue],
        parents: &[&AttributeValue],
        previews: &mut HashSet<String>,
    ) -> Option<Refinement> {
        if values.is_empty() {
            return None;
        }

        let mut resolved = Vec::with_capacity(values.len());
        let mut ranks = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            let selected = self.is_selected(input, parents, value);
            let preview = take_preview(&value.previews, previews);
            let preference = input.preferences.and_then(|p| p.get(value.key())).copied();
            ranks.push(preference.map(|p| p.offset));
            let mut entry = self.resolve_value(input, parents, index, value, selected, preview);
            entry.preference = preference.map_or(0.0, |p| p.weight);
            resolved.push(entry);
        }
        mark_favorites(&mut resolved, &ranks, self.favorite_ratio);

        let parents_resolved = parents
            .iter()
            .enumerate()
            .map(|(depth, parent)| {
                let ancestors = &parents[..depth];
                let selected = self.is_selected(input, ancestors, parent);
                self.resolve_value(input, ancestors, depth, parent, selected, None)
            })
            .collect();

        let attribute = input.attribute;
        let label = if attribute.name.is_empty() { attribute.property.clone() } else { attribute.name.clone() };
        Some(Refinement {
            property: attribute.property.clone(),
            label,
            parents: parents_resolved,
            values_selected: resolved.iter().filter(|v| v.selected).count(),
            values_filtering: resolved.iter().filter(|v| v.filtering).count(),
            values_with_preview: resolved.iter().filter(|v| v.preview.is_some()).count(),
            values: resolved,
            attribute: AttributeView::from(attribute),
        })
    }

    fn resolve_value(
        &self,
        input: &FacetInput<'_>,
        parents: &[&AttributeValue],
        index: usize,
        value: &AttributeValue,
        selected: bool,
        preview: Option<Resource>,
    ) -> ResolvedValue {
        let attribute = input.attribute;
        let encoder = self.caps.encoder;
        let filtering = match self.mode {
            FacetMode::Refinement => value.population < input.results_total,
            FacetMode::Alternative => !selected,
        };
        ResolvedValue {
            index,
            name: self.caps.formatter.format_attribute_value(attribute, index, value),
            data: value.data.clone(),
            population: value.population,
            selected,
            filtering,
            add_action: encoder.attribute_add_action(attribute, parents, value),
            set_action: encoder.attribute_set_action(attribute, parents, value),
            remove_action: encoder.attribute_remove_action(attribute, parents, value),
            preference: 0.0,
            favorite: false,
            preview,
            resources: value.previews.iter().map(build_resource).collect(),
        }
    }

    fn is_selected(&self, input: &FacetInput<'_>, parents: &[&AttributeValue], value: &AttributeValue) -> bool {
        input.filters.iter().any(|g| guidance_matches(input.attribute, g, parents, value))
    }
}

fn extend<'v>(parents: &[&'v AttributeValue], value: &'v AttributeValue) -> Vec<&'v AttributeValue> {
    let mut path = Vec::with_capacity(parents.len() + 1);
    path.extend_from_slice(parents);
    path.push(value);
    path
}

/// Does `guidance` select `value` reached through `parents`?
///
/// Hierarchical attributes compare the concatenated key path positionally
/// against the guidance path, which may run deeper. Flat attributes need an
/// element-wise equal key tuple; numeric types compare numerically. Arity
/// mismatches are simply no match.
pub(crate) fn guidance_matches(
    attribute: &Attribute,
    guidance: &Guidance,
    parents: &[&AttributeValue],
    value: &AttributeValue,
) -> bool {
    if attribute.is_hierarchical() {
        let path: Vec<&str> =
            parents.iter().copied().chain(std::iter::once(value)).flat_map(|v| v.data.iter().map(String::as_str)).collect();
        return !path.is_empty()
            && path.len() <= guidance.data.len()
            && path.iter().zip(&guidance.data).all(|(a, b)| *a == b.as_str());
    }
    guidance.data.len() == value.data.len()
        && guidance.data.iter().zip(&value.data).all(|(a, b)| {
            if attribute.kind.is_numeric() { loose_eq(a, b) } else { a == b }
        })
}

fn loose_eq(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Flag the best-ranked preferred values as favorites, at most
/// `ceil(len * ratio)` of them.
fn mark_favorites(values: &mut [ResolvedValue], ranks: &[Option<usize>], ratio: f64) {
    let cap = ((values.len() as f64) * ratio - 1e-9).ceil().max(0.0) as usize;
    let mut candidates: Vec<(usize, usize)> = values
        .iter()
        .zip(ranks)
        .enumerate()
        .filter_map(|(i, (v, rank))| if v.preference > 0.0 { rank.map(|r| (r, i)) } else { None })
        .collect();
    candidates.sort_by_key(|&(rank, _)| rank);
    for &(_, i) in candidates.iter().take(cap) {
        values[i].favorite = true;
    }
}
