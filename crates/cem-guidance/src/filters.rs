//! Active filter reconstruction.
//!
//! The server only reports why results are filtered implicitly, through the
//! overlap of query terms and guidances. This module re-derives one explicit
//! filter per active value, bucketed by property, with the action that
//! removes it.

use serde::Serialize;
use std::collections::BTreeMap;

use cem_core::traits::RemoveTarget;
use cem_core::types::{Action, Guidance, GuidanceMode, ModelContext, RequestContext, TermType};

use crate::facets::Refinement;
use crate::text::{edit_budget, edit_distance};
use crate::Capabilities;

/// Edit distance up to which a single-candidate ambiguous term is treated
/// as if the user had picked the candidate as a guidance.
const TERM_AS_GUIDANCE_DISTANCE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Guidance,
    Term,
}

/// Where an active guidance came from, before display data is attached.
///
/// `index` is the term index for `Term`, the guidance slot for standalone
/// guidances and `-(term index + 1)` for a term promoted to a guidance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSource {
    pub mode: FilterMode,
    pub index: i64,
    pub guidance: Guidance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveFilter {
    pub mode: FilterMode,
    pub index: i64,
    pub property: String,
    pub name: String,
    pub value: String,
    pub guidance: Guidance,
    pub remove_action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative: Option<Refinement>,
}

pub struct ActiveFilterResolver<'a> {
    model: &'a ModelContext,
    caps: Capabilities<'a>,
    request: &'a RequestContext,
}

fn term_index(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

impl<'a> ActiveFilterResolver<'a> {
    pub fn new(model: &'a ModelContext, caps: Capabilities<'a>, request: &'a RequestContext) -> Self {
        Self { model, caps, request }
    }

    /// Active guidances per property, restricted to properties the group knows.
    pub fn sources(&self) -> BTreeMap<String, Vec<FilterSource>> {
        let mut buckets: BTreeMap<String, Vec<FilterSource>> = BTreeMap::new();
        let mut push = |source: FilterSource| buckets.entry(source.guidance.property.clone()).or_default().push(source);

        for term in &self.model.query_terms {
            match term.kind {
                TermType::Ambiguous => {
                    let [refinement] = term.refinements.as_slice() else { continue };
                    let [candidate] = refinement.values.as_slice() else { continue };
                    let distance = edit_distance(&candidate.value, &term.value);
                    let guidance = Guidance {
                        property: refinement.property.clone(),
                        mode: GuidanceMode::Guidance,
                        kind: String::new(),
                        data: vec![candidate.value.clone()],
                    };
                    if distance <= TERM_AS_GUIDANCE_DISTANCE {
                        push(FilterSource { mode: FilterMode::Guidance, index: -(term_index(term.index) + 1), guidance });
                    } else if (distance as f64) < edit_budget(&term.value) {
                        push(FilterSource { mode: FilterMode::Term, index: term_index(term.index), guidance });
                    } else {
                        tracing::trace!(term = term.index, distance, "ambiguous term too far from its candidate");
                    }
                }
                TermType::Matched | TermType::Refined => {
                    for guidance in &term.guidances {
                        push(FilterSource {
                            mode: FilterMode::Term,
                            index: term_index(term.index),
                            guidance: guidance.clone(),
                        });
                    }
                }
                TermType::Unfiltered | TermType::Unmatched | TermType::Other => {}
            }
        }

        for (i, guidance) in self.model.guidances.iter().enumerate() {
            push(FilterSource { mode: FilterMode::Guidance, index: term_index(i), guidance: guidance.clone() });
        }

        buckets.retain(|property, _| {
            let known = self.caps.properties.property(property, &self.request.group).is_some();
            if !known {
                tracing::debug!(property = %property, group = %self.request.group, "dropping filters on unknown property");
            }
            known
        });
        buckets
    }

    /// Guidance data per property, as consumed by facet resolution.
    pub fn guidances(&self) -> BTreeMap<String, Vec<Guidance>> {
        self.sources()
            .into_iter()
            .map(|(property, sources)| {
                let guidances: Vec<Guidance> = sources.into_iter().map(|s| s.guidance).collect();
                (property, guidances)
            })
            .collect()
    }

    /// Fully resolved filters. `alternative_of` computes the what-if facet of a
    /// property given all of its active guidances.
    pub fn resolve<F>(&self, alternative_of: F) -> BTreeMap<String, Vec<ActiveFilter>>
    where
        F: Fn(&str, &[Guidance]) -> Option<Refinement>,
    {
        self.sources()
            .into_iter()
            .map(|(property, sources)| {
                let name = self
                    .caps
                    .properties
                    .property(&property, &self.request.group)
                    .map(|p| p.name)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| property.clone());
                let guidances: Vec<Guidance> = sources.iter().map(|s| s.guidance.clone()).collect();
                let alternative = alternative_of(&property, &guidances);
                let crowded = sources.len() > 1;
                let filters: Vec<ActiveFilter> = sources
                    .into_iter()
                    .map(|source| ActiveFilter {
                        remove_action: self.remove_action(&property, &source, crowded),
                        value: self.caps.formatter.format_filter_value(&property, &source.guidance),
                        mode: source.mode,
                        index: source.index,
                        property: property.clone(),
                        name: name.clone(),
                        guidance: source.guidance,
                        alternative: alternative.clone(),
                    })
                    .collect();
                (property, filters)
            })
            .collect()
    }

    /// Term removal beats removal by guidance slot, which beats removal of
    /// the whole property.
    fn remove_action(&self, property: &str, source: &FilterSource, crowded: bool) -> Action {
        let encoder = self.caps.encoder;
        match (source.mode, usize::try_from(source.index)) {
            (FilterMode::Term, Ok(index)) => encoder.refine_action(index, None, None),
            (FilterMode::Guidance, Ok(index)) if crowded => encoder.guidance_remove_action(RemoveTarget::Index(index)),
            _ => encoder.guidance_remove_action(RemoveTarget::Property(property)),
        }
    }
}
