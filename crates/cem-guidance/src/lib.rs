#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! cem-guidance
//!
//! Resolves decoded CEM responses into view structures: active query and
//! did-you-mean suggestions, disambiguations, active filters, refinements
//! and alternatives per facet, scenarios and recommendations. Everything is
//! a pure function of the response, the context scopes and the injected
//! capabilities; [`Interaction`] memoizes results for one response.

use cem_core::traits::{ActionEncoder, PropertyLookup, ValueFormatter};

pub mod facets;
pub mod filters;
pub mod interaction;
pub mod preferences;
pub mod query_terms;
pub mod resources;
pub mod scenarios;
mod text;

pub use facets::{AttributeView, FacetInput, FacetMode, FacetResolver, Refinement, ResolvedValue};
pub use filters::{ActiveFilter, ActiveFilterResolver, FilterMode, FilterSource};
pub use interaction::Interaction;
pub use query_terms::{Disambiguation, DisambiguationEntry, DisambiguationValue, QueryTermResolver, Suggestion};
pub use resources::build_resource;
pub use scenarios::{recommendations, Scenario, ScenarioResolver};

/// Injected collaborators shared by every resolver.
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub encoder: &'a dyn ActionEncoder,
    pub formatter: &'a dyn ValueFormatter,
    pub properties: &'a dyn PropertyLookup,
}
