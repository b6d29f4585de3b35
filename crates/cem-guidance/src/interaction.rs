//! Session object tying one response to its contexts and capabilities.
//!
//! Results are memoized per group id for the lifetime of the session. The
//! caches are never shared: a new response means a new [`Interaction`].

use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use cem_core::config::ResolverPolicy;
use cem_core::context::ContextStore;
use cem_core::traits::{ActionEncoder, PropertyLookup, ValueFormatter};
use cem_core::types::{Guidance, GroupResponse, ModelContext, PropertyMeta, RawResource, RequestContext, Resource, Response};

use crate::facets::{FacetInput, FacetMode, FacetResolver, Refinement};
use crate::filters::{ActiveFilter, ActiveFilterResolver};
use crate::preferences::{preferred_properties, preferred_property_values, PropertyWeights, ValuePreferences};
use crate::query_terms::{Disambiguation, QueryTermResolver, Suggestion};
use crate::resources::build_resource;
use crate::scenarios::{recommendations, Scenario, ScenarioResolver};
use crate::Capabilities;

#[derive(Default)]
struct Cache {
    guidances: HashMap<String, BTreeMap<String, Vec<Guidance>>>,
    filters: HashMap<String, BTreeMap<String, Vec<ActiveFilter>>>,
    refinements: HashMap<String, Vec<Refinement>>,
    alternatives: HashMap<String, Vec<Refinement>>,
    preferences: HashMap<String, ValuePreferences>,
}

pub struct Interaction<'a> {
    response: &'a Response,
    caps: Capabilities<'a>,
    policy: ResolverPolicy,
    model: ModelContext,
    profile: Value,
    cache: RefCell<Cache>,
}

impl<'a> Interaction<'a> {
    /// Property metadata is looked up in the response's own groups.
    pub fn new(
        response: &'a Response,
        contexts: &ContextStore,
        encoder: &'a dyn ActionEncoder,
        formatter: &'a dyn ValueFormatter,
        policy: ResolverPolicy,
    ) -> Self {
        Self::with_properties(response, contexts, encoder, formatter, response, policy)
    }

    pub fn with_properties(
        response: &'a Response,
        contexts: &ContextStore,
        encoder: &'a dyn ActionEncoder,
        formatter: &'a dyn ValueFormatter,
        properties: &'a dyn PropertyLookup,
        policy: ResolverPolicy,
    ) -> Self {
        Self {
            response,
            caps: Capabilities { encoder, formatter, properties },
            policy,
            model: contexts.model(),
            profile: contexts.profile(),
            cache: RefCell::new(Cache::default()),
        }
    }

    /// Request for the configured default group.
    pub fn request(&self) -> RequestContext {
        RequestContext::new(self.policy.default_group.clone())
    }

    pub fn policy(&self) -> &ResolverPolicy {
        &self.policy
    }

    fn group(&self, request: &RequestContext) -> Option<&'a GroupResponse> {
        let group = self.response.group(&request.group);
        if group.is_none() {
            tracing::debug!(group = %request.group, "group absent from response");
        }
        group
    }

    pub fn active_query(&self) -> String {
        let request = self.request();
        QueryTermResolver::new(&self.model, self.caps, &request).active_query().to_string()
    }

    pub fn active_did_you_mean(&self, request: &RequestContext) -> Vec<Suggestion> {
        QueryTermResolver::new(&self.model, self.caps, request).active_did_you_mean()
    }

    pub fn active_ambiguities(&self, request: &RequestContext) -> Vec<Disambiguation> {
        QueryTermResolver::new(&self.model, self.caps, request).active_ambiguities()
    }

    pub fn properties(&self, request: &RequestContext) -> Vec<PropertyMeta> {
        self.caps.properties.properties(&request.group)
    }

    pub fn property(&self, id: &str, request: &RequestContext) -> Option<PropertyMeta> {
        self.caps.properties.property(id, &request.group)
    }

    fn guidances(&self, request: &RequestContext) -> BTreeMap<String, Vec<Guidance>> {
        if let Some(hit) = self.cache.borrow().guidances.get(&request.group) {
            return hit.clone();
        }
        let computed = ActiveFilterResolver::new(&self.model, self.caps, request).guidances();
        self.cache.borrow_mut().guidances.insert(request.group.clone(), computed.clone());
        computed
    }

    fn value_preferences(&self, index: &str) -> ValuePreferences {
        if let Some(hit) = self.cache.borrow().preferences.get(index) {
            return hit.clone();
        }
        let computed = preferred_property_values(&self.profile, index);
        self.cache.borrow_mut().preferences.insert(index.to_string(), computed.clone());
        computed
    }

    pub fn active_filters(&self, request: &RequestContext) -> BTreeMap<String, Vec<ActiveFilter>> {
        if let Some(hit) = self.cache.borrow().filters.get(&request.group) {
            return hit.clone();
        }
        let group = self.group(request);
        let preferences = self.value_preferences(&self.policy.preference_index);
        let computed = ActiveFilterResolver::new(&self.model, self.caps, request).resolve(|property, guidances| {
            self.facet(FacetMode::Alternative, group?, property, guidances, &preferences, &mut HashSet::new())
        });
        self.cache.borrow_mut().filters.insert(request.group.clone(), computed.clone());
        computed
    }

    fn facet(
        &self,
        mode: FacetMode,
        group: &GroupResponse,
        property: &str,
        guidances: &[Guidance],
        preferences: &ValuePreferences,
        previews: &mut HashSet<String>,
    ) -> Option<Refinement> {
        let attribute = group.attribute(property)?;
        let ratio = match mode {
            FacetMode::Refinement => self.policy.refinement_favorite_ratio,
            FacetMode::Alternative => self.policy.alternative_favorite_ratio,
        };
        let input = FacetInput {
            attribute,
            filters: guidances,
            preferences: preferences.get(property),
            results_total: group.search.total,
        };
        FacetResolver::new(self.caps, mode, ratio).resolve(&input, previews)
    }

    fn facets(&self, mode: FacetMode, request: &RequestContext) -> Vec<Refinement> {
        let Some(group) = self.group(request) else { return Vec::new() };
        let guidances = self.guidances(request);
        let preferences = self.value_preferences(&self.policy.preference_index);
        let mut previews = HashSet::new();
        group
            .attributes
            .iter()
            .filter(|attribute| {
                let known = self.caps.properties.property(&attribute.property, &request.group).is_some();
                if !known {
                    tracing::debug!(property = %attribute.property, "skipping attribute on unknown property");
                }
                known && (mode == FacetMode::Refinement || guidances.contains_key(&attribute.property))
            })
            .filter_map(|attribute| {
                let filters = guidances.get(&attribute.property).map(Vec::as_slice).unwrap_or_default();
                self.facet(mode, group, &attribute.property, filters, &preferences, &mut previews)
            })
            .collect()
    }

    /// Refinements for every known attribute of the group, in server order.
    pub fn refinements(&self, request: &RequestContext) -> Vec<Refinement> {
        if let Some(hit) = self.cache.borrow().refinements.get(&request.group) {
            return hit.clone();
        }
        let computed = self.facets(FacetMode::Refinement, request);
        self.cache.borrow_mut().refinements.insert(request.group.clone(), computed.clone());
        computed
    }

    pub fn refinement(&self, property: &str, request: &RequestContext) -> Option<Refinement> {
        self.refinements(request).into_iter().find(|r| r.property == property)
    }

    /// Alternatives for every property carrying an active filter.
    pub fn alternatives(&self, request: &RequestContext) -> Vec<Refinement> {
        if let Some(hit) = self.cache.borrow().alternatives.get(&request.group) {
            return hit.clone();
        }
        let computed = self.facets(FacetMode::Alternative, request);
        self.cache.borrow_mut().alternatives.insert(request.group.clone(), computed.clone());
        computed
    }

    /// Alternative view of one property, whether or not it is filtered.
    pub fn alternative(&self, property: &str, request: &RequestContext) -> Option<Refinement> {
        self.caps.properties.property(property, &request.group)?;
        let group = self.group(request)?;
        let guidances = self.guidances(request);
        let filters = guidances.get(property).map(Vec::as_slice).unwrap_or_default();
        let preferences = self.value_preferences(&self.policy.preference_index);
        self.facet(FacetMode::Alternative, group, property, filters, &preferences, &mut HashSet::new())
    }

    pub fn scenarios(&self, request: &RequestContext, skip: &HashSet<String>) -> Vec<Scenario> {
        let Some(group) = self.group(request) else { return Vec::new() };
        let guidances = self.guidances(request);
        let preferences = self.value_preferences(&self.policy.preference_index);
        ScenarioResolver::new(self.caps, &self.policy).resolve(request, group, &guidances, &preferences, skip)
    }

    pub fn scenario(&self, id: &str, request: &RequestContext, skip: &HashSet<String>) -> Option<Scenario> {
        self.scenarios(request, skip).into_iter().find(|s| s.id == id)
    }

    pub fn results(&self, request: &RequestContext) -> Vec<Resource> {
        self.group(request).map(|g| g.search.results.iter().map(build_resource).collect()).unwrap_or_default()
    }

    pub fn recommendations(&self, request: &RequestContext, skip: &HashSet<String>) -> Vec<Resource> {
        recommendations(&self.scenarios(request, skip))
    }

    pub fn build_resource(&self, raw: &RawResource) -> Resource {
        build_resource(raw)
    }

    pub fn preferred_properties(&self, index: &str) -> PropertyWeights {
        preferred_properties(&self.profile, index)
    }

    pub fn preferred_property_values(&self, index: &str) -> ValuePreferences {
        self.value_preferences(index)
    }
}
