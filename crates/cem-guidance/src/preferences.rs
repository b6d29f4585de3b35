//! User preference weighting from the profile context.
//!
//! The profile holds, per named index, raw frequency counts shaped as
//! `{ "<index>": { "<property>": { "<value>": count } } }`. Counts may be
//! numbers or numeric strings; anything else counts as zero.

use serde_json::Value;
use std::collections::BTreeMap;

use cem_core::types::Preference;

pub type PropertyWeights = BTreeMap<String, f64>;
pub type ValuePreferences = BTreeMap<String, BTreeMap<String, Preference>>;

fn count(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() { raw.max(0.0) } else { 0.0 }
}

fn counts(profile: &Value, index: &str) -> BTreeMap<String, BTreeMap<String, f64>> {
    let Some(properties) = profile.get(index).and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    properties
        .iter()
        .filter_map(|(property, values)| {
            let values = values.as_object()?;
            let counts: BTreeMap<String, f64> = values.iter().map(|(v, c)| (v.clone(), count(c))).collect();
            Some((property.clone(), counts))
        })
        .collect()
}

fn normalize(weights: &mut BTreeMap<String, f64>) {
    let sum: f64 = weights.values().sum();
    if sum > 0.0 {
        for weight in weights.values_mut() {
            *weight /= sum;
        }
    }
}

/// Share of the profile's activity per property; weights sum to 1.
pub fn preferred_properties(profile: &Value, index: &str) -> PropertyWeights {
    let mut weights: PropertyWeights =
        counts(profile, index).into_iter().map(|(property, values)| (property, values.values().sum())).collect();
    normalize(&mut weights);
    weights
}

/// Normalized weight and 1-based rank of every value, per property.
pub fn preferred_property_values(profile: &Value, index: &str) -> ValuePreferences {
    counts(profile, index)
        .into_iter()
        .map(|(property, mut values)| {
            normalize(&mut values);
            let mut ranked: Vec<(String, f64)> = values.into_iter().collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            let ranked: BTreeMap<String, Preference> = ranked
                .into_iter()
                .enumerate()
                .map(|(i, (value, weight))| (value, Preference { weight, offset: i + 1 }))
                .collect();
            (property, ranked)
        })
        .collect()
}
