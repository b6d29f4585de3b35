use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use cem_core::config::ResolverPolicy;
use cem_core::types::{Action, GroupResponse, Guidance, RequestContext, Resource};

use crate::facets::{FacetInput, FacetMode, FacetResolver, Refinement};
use crate::preferences::ValuePreferences;
use crate::resources::build_resource;
use crate::Capabilities;

/// Server-curated bundle of facets and recommendations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub set_action: Action,
    pub attribute_order: Vec<String>,
    pub refinements: Vec<Refinement>,
    pub recommendations: Vec<Resource>,
}

pub struct ScenarioResolver<'a> {
    caps: Capabilities<'a>,
    policy: &'a ResolverPolicy,
}

impl<'a> ScenarioResolver<'a> {
    pub fn new(caps: Capabilities<'a>, policy: &'a ResolverPolicy) -> Self {
        Self { caps, policy }
    }

    /// Resolve every scenario of `group`. Properties in `skip` are rendered
    /// elsewhere; within a scenario each property is rendered at most once.
    pub fn resolve(
        &self,
        request: &RequestContext,
        group: &GroupResponse,
        filters: &BTreeMap<String, Vec<Guidance>>,
        preferences: &ValuePreferences,
        skip: &HashSet<String>,
    ) -> Vec<Scenario> {
        let facets = FacetResolver::new(self.caps, FacetMode::Refinement, self.policy.refinement_favorite_ratio);
        let total = group.search.total;
        let mut previews = HashSet::new();

        group
            .scenarios
            .iter()
            .map(|scenario| {
                let thresholds = self.policy.thresholds_for(&scenario.id);
                let mut rendered = skip.clone();
                let mut attribute_order = Vec::new();
                let mut refinements = Vec::new();

                for attribute in &scenario.attributes {
                    if !attribute.valid || rendered.contains(&attribute.property) {
                        continue;
                    }
                    if self.caps.properties.property(&attribute.property, &request.group).is_none() {
                        tracing::debug!(scenario = %scenario.id, property = %attribute.property, "unknown scenario property");
                        continue;
                    }
                    let input = FacetInput {
                        attribute,
                        filters: filters.get(&attribute.property).map(Vec::as_slice).unwrap_or_default(),
                        preferences: preferences.get(&attribute.property),
                        results_total: total,
                    };
                    let mut trial = previews.clone();
                    let Some(refinement) = facets.resolve(&input, &mut trial) else { continue };
                    let useful = refinement.values.iter().filter(|v| thresholds.is_useful(v.population, total)).count();
                    if useful < thresholds.minimum_useful_values {
                        tracing::debug!(
                            scenario = %scenario.id,
                            property = %attribute.property,
                            useful,
                            "facet suppressed as uninformative"
                        );
                        continue;
                    }
                    previews = trial;
                    rendered.insert(attribute.property.clone());
                    attribute_order.push(attribute.property.clone());
                    refinements.push(refinement);
                }

                let recommendations = scenario
                    .recommendations
                    .iter()
                    .map(|raw| Resource { scenario: Some(scenario.id.clone()), ..build_resource(raw) })
                    .collect();

                Scenario {
                    id: scenario.id.clone(),
                    name: scenario.name.clone(),
                    set_action: self.caps.encoder.scenario_action(&scenario.id),
                    attribute_order,
                    refinements,
                    recommendations,
                }
            })
            .collect()
    }
}

/// All recommendations across `scenarios`, heaviest first. Equal weights
/// keep scenario order.
pub fn recommendations(scenarios: &[Scenario]) -> Vec<Resource> {
    let mut all: Vec<Resource> = scenarios.iter().flat_map(|s| s.recommendations.iter().cloned()).collect();
    all.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
    all
}
