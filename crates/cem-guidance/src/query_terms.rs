use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use cem_core::types::{Action, ModelContext, QueryTerm, RequestContext, Resource, TermRefinement, TermType};

use crate::resources::take_preview;
use crate::text::{edit_budget, edit_distance, substitute_term};
use crate::Capabilities;

/// A corrected query proposed for an ambiguous term.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub query: String,
    pub term_index: usize,
    pub value: String,
    pub distance: usize,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisambiguationValue {
    pub value: String,
    pub population: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Resource>,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisambiguationEntry {
    pub label: String,
    pub values: Vec<DisambiguationValue>,
}

/// Prompt to resolve one ambiguous term into a concrete facet value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disambiguation {
    pub index: usize,
    pub term: String,
    pub entries: BTreeMap<String, DisambiguationEntry>,
    pub refinements: Vec<TermRefinement>,
}

/// Reads the active query and its ambiguous terms from the `model` context.
pub struct QueryTermResolver<'a> {
    model: &'a ModelContext,
    caps: Capabilities<'a>,
    request: &'a RequestContext,
}

impl<'a> QueryTermResolver<'a> {
    pub fn new(model: &'a ModelContext, caps: Capabilities<'a>, request: &'a RequestContext) -> Self {
        Self { model, caps, request }
    }

    pub fn active_query(&self) -> &str {
        self.model.query_text.as_deref().unwrap_or("")
    }

    fn ambiguous_terms(&self) -> impl Iterator<Item = &'a QueryTerm> {
        self.model.query_terms.iter().filter(|t| t.kind == TermType::Ambiguous && !t.refinements.is_empty())
    }

    /// Refinements of `term` whose property is known to the group.
    fn known_refinements(&self, term: &'a QueryTerm) -> impl Iterator<Item = &'a TermRefinement> + '_ {
        term.refinements.iter().filter(move |r| {
            let known = self.caps.properties.property(&r.property, &self.request.group).is_some();
            if !known {
                tracing::debug!(property = %r.property, term = term.index, "skipping refinement on unknown property");
            }
            known
        })
    }

    /// Spelling suggestions ordered by edit distance. Terms offering fewer
    /// than two distinct candidates contribute nothing.
    pub fn active_did_you_mean(&self) -> Vec<Suggestion> {
        let query = self.active_query();
        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();
        for term in self.ambiguous_terms() {
            let refinements: Vec<&TermRefinement> = self.known_refinements(term).collect();
            let distinct: BTreeSet<String> =
                refinements.iter().flat_map(|r| r.values.iter().map(|v| v.value.to_lowercase())).collect();
            if distinct.len() < 2 {
                continue;
            }
            let budget = edit_budget(&term.value);
            for candidate in refinements.iter().flat_map(|r| r.values.iter()) {
                let distance = edit_distance(&candidate.value, &term.value);
                if distance > 0 && distance as f64 > budget {
                    continue;
                }
                let suggested = substitute_term(query, &term.value, &candidate.value);
                if !seen.insert(suggested.to_lowercase()) {
                    continue;
                }
                suggestions.push(Suggestion {
                    action: self.caps.encoder.query_action(&suggested),
                    query: suggested,
                    term_index: term.index,
                    value: candidate.value.clone(),
                    distance,
                });
            }
        }
        suggestions.sort_by_key(|s| s.distance);
        suggestions
    }

    /// Disambiguation prompts for terms with at least two candidate values.
    /// A preview resource is used for at most one value per prompt.
    pub fn active_ambiguities(&self) -> Vec<Disambiguation> {
        let mut ambiguities = Vec::new();
        for term in self.ambiguous_terms() {
            let refinements: Vec<&TermRefinement> = self.known_refinements(term).collect();
            let candidates: usize = refinements.iter().map(|r| r.values.len()).sum();
            if candidates < 2 {
                continue;
            }

            let mut previews = HashSet::new();
            let mut entries: BTreeMap<String, DisambiguationEntry> = BTreeMap::new();
            for refinement in &refinements {
                let label = self
                    .caps
                    .properties
                    .property(&refinement.property, &self.request.group)
                    .map(|p| p.name)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| refinement.property.clone());
                let entry = entries
                    .entry(refinement.property.clone())
                    .or_insert_with(|| DisambiguationEntry { label, values: Vec::new() });
                for candidate in &refinement.values {
                    entry.values.push(DisambiguationValue {
                        value: candidate.value.clone(),
                        population: candidate.population,
                        preview: take_preview(&candidate.previews, &mut previews),
                        action: self.caps.encoder.refine_action(
                            term.index,
                            Some(refinement.property.as_str()),
                            Some(candidate.value.as_str()),
                        ),
                    });
                }
            }

            ambiguities.push(Disambiguation {
                index: term.index,
                term: term.value.clone(),
                entries,
                refinements: refinements.into_iter().cloned().collect(),
            });
        }
        ambiguities
    }
}
