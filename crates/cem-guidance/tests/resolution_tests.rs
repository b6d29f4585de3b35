mod common;

use serde_json::{json, Value};

use cem_core::config::ResolverPolicy;
use cem_core::context::ContextStore;
use cem_guidance::{FilterMode, Interaction};

use common::{assert_selection_counts, contexts, names, response, scope, KeyFormatter, RecordingEncoder};

fn properties() -> Value {
    json!([
        {"id": "color", "name": "Color"},
        {"id": "category", "name": "Category"},
        {"id": "brand", "name": "Brand"},
        {"id": "size", "name": ""}
    ])
}

fn color_group() -> Value {
    json!({
        "search": {
            "total": 100,
            "results": [
                {"id": "sku-1", "name": "Red shoe", "weight": 1.0, "properties": [
                    {"property": "color", "values": [{"data": ["red"]}]}
                ]}
            ]
        },
        "properties": properties(),
        "attributes": [
            {"property": "color", "name": "Color", "values": [
                {"data": ["red"], "population": 40},
                {"data": ["blue"], "population": 90}
            ]}
        ]
    })
}

fn category_group(roots: Value, total: u64) -> Value {
    json!({
        "search": {"total": total},
        "properties": properties(),
        "attributes": [
            {"property": "category", "name": "Category", "propertyFlags": ["hierarchical"], "values": roots}
        ]
    })
}

#[test]
fn unfiltered_flat_facet_marks_narrowing_values() {
    let response = response(json!({ "search": color_group() }));
    let contexts = contexts(json!({}), json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());
    let request = interaction.request();

    let refinements = interaction.refinements(&request);
    assert_eq!(refinements.len(), 1);
    let color = &refinements[0];
    assert_eq!(names(color), vec!["red", "blue"]);
    assert!(color.values.iter().all(|v| v.filtering));
    assert_eq!(color.values_filtering, 2);
    assert_eq!(color.values_selected, 0);
    assert_eq!(color.label, "Color");
    assert_eq!(color.values[1].add_action.uri, "add:color:blue");
}

#[test]
fn single_root_hierarchy_is_transparent() {
    let wrapped = category_group(
        json!([{"data": ["Shoes"], "population": 8, "children": [
            {"data": ["Sneakers"], "population": 5},
            {"data": ["Boots"], "population": 3}
        ]}]),
        8,
    );
    let flat = category_group(
        json!([
            {"data": ["Sneakers"], "population": 5},
            {"data": ["Boots"], "population": 3}
        ]),
        8,
    );
    let response = response(json!({ "search": wrapped, "flat": flat }));
    let contexts = contexts(json!({}), json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());

    let category = interaction.refinement("category", &interaction.request()).expect("category refinement");
    assert_eq!(names(&category), vec!["Sneakers", "Boots"]);
    assert_eq!(category.parents.len(), 1);
    assert_eq!(category.parents[0].name, "Shoes");
    assert_eq!(category.values[1].set_action.uri, "set:category:Shoes/Boots");

    let direct = interaction
        .refinement("category", &cem_core::types::RequestContext::new("flat"))
        .expect("flat refinement");
    let shape = |r: &cem_guidance::Refinement| -> Vec<(String, u64, bool, bool)> {
        r.values.iter().map(|v| (v.name.clone(), v.population, v.selected, v.filtering)).collect()
    };
    assert_eq!(shape(&category), shape(&direct));
}

#[test]
fn selected_branch_is_drilled_into() {
    let group = category_group(
        json!([
            {"data": ["Shoes"], "population": 6, "children": [
                {"data": ["Sneakers"], "population": 4},
                {"data": ["Boots"], "population": 2}
            ]},
            {"data": ["Bags"], "population": 2}
        ]),
        8,
    );
    let response = response(json!({ "search": group }));
    let model = json!({"guidances": [{"property": "category", "mode": "hierarchical", "data": ["Shoes", "Boots"]}]});
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());
    let request = interaction.request();

    let refinement = interaction.refinement("category", &request).expect("category refinement");
    assert_eq!(names(&refinement), vec!["Sneakers", "Boots"]);
    assert_eq!(refinement.values_selected, 1);
    assert!(refinement.values[1].selected);
    assert!(refinement.parents[0].selected);
    assert!(refinement.values[1].filtering, "2 of 8 still narrows the results");

    let alternatives = interaction.alternatives(&request);
    assert_eq!(alternatives.len(), 1);
    let alternative = &alternatives[0];
    assert_eq!(names(alternative), vec!["Sneakers", "Boots"]);
    assert!(alternative.values[0].filtering);
    assert!(!alternative.values[1].filtering);

    assert_selection_counts(&interaction.refinements(&request));
    assert_selection_counts(&alternatives);

    let filters = interaction.active_filters(&request);
    let category = &filters["category"];
    assert_eq!(category.len(), 1);
    assert_eq!(category[0].mode, FilterMode::Guidance);
    assert_eq!(category[0].index, 0);
    assert_eq!(category[0].name, "Category");
    assert_eq!(category[0].value, "Shoes/Boots");
    assert_eq!(category[0].remove_action.uri, "remove:property:category");
    let attached = category[0].alternative.as_ref().expect("alternative attached");
    assert_eq!(attached.values_selected, 1);
}

#[test]
fn resolution_is_idempotent() {
    let response = response(json!({ "search": color_group() }));
    let model = json!({
        "queryText": "red",
        "queryTerms": [{"index": 0, "type": "matched", "value": "red",
            "guidances": [{"property": "color", "data": ["red"]}]}]
    });
    let profile = json!({"default": {"color": {"red": 3, "blue": 1}}});
    let store = contexts(model, profile);
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);

    let first = Interaction::new(&response, &store, &encoder, &formatter, ResolverPolicy::default());
    let second = Interaction::new(&response, &store, &encoder, &formatter, ResolverPolicy::default());
    let request = first.request();

    assert_eq!(first.refinements(&request), second.refinements(&request));
    assert_eq!(first.active_filters(&request), second.active_filters(&request));
    assert_eq!(first.alternatives(&request), second.alternatives(&request));
    assert_eq!(first.refinements(&request), first.refinements(&request));
    assert_selection_counts(&first.alternatives(&request));
}

#[test]
fn favorites_are_capped_per_mode() {
    let values: Vec<Value> = (0..10).map(|i| json!({"data": [format!("b{i}")], "population": 10})).collect();
    let counts: serde_json::Map<String, Value> = (0..10).map(|i| (format!("b{i}"), json!(i + 1))).collect();
    let group = json!({
        "search": {"total": 100},
        "properties": properties(),
        "attributes": [{"property": "brand", "name": "Brand", "values": values}]
    });
    let response = response(json!({ "search": group }));
    let contexts = contexts(json!({}), json!({"default": {"brand": counts}}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());
    let request = interaction.request();

    let refinement = interaction.refinement("brand", &request).expect("brand refinement");
    let favorites: Vec<&str> =
        refinement.values.iter().filter(|v| v.favorite).map(|v| v.name.as_str()).collect();
    assert_eq!(favorites, vec!["b6", "b7", "b8", "b9"]);
    assert!(refinement.values.iter().all(|v| v.preference > 0.0));

    let alternative = interaction.alternative("brand", &request).expect("brand alternative");
    assert_eq!(alternative.values.iter().filter(|v| v.favorite).count(), 5);
}

#[test]
fn did_you_mean_keeps_only_close_candidates() {
    let response = response(json!({ "search": color_group() }));
    let model = json!({
        "queryText": "red shues",
        "queryTerms": [{"index": 1, "type": "ambiguous", "value": "shues", "refinements": [
            {"property": "category", "values": [
                {"value": "shoes", "population": 10, "previews": [{"id": "p1"}]},
                {"value": "shoot", "population": 3, "previews": [{"id": "p1"}, {"id": "p2"}]}
            ]}
        ]}]
    });
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());
    let request = interaction.request();

    assert_eq!(interaction.active_query(), "red shues");
    let suggestions = interaction.active_did_you_mean(&request);
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].query, "red shoes");
    assert_eq!(suggestions[0].distance, 1);
    assert_eq!(suggestions[0].action.uri, "query:red shoes");

    let ambiguities = interaction.active_ambiguities(&request);
    assert_eq!(ambiguities.len(), 1);
    let entry = &ambiguities[0].entries["category"];
    assert_eq!(entry.label, "Category");
    assert_eq!(entry.values.len(), 2);
    assert_eq!(entry.values[0].action.uri, "refine:1:category:shoes");
    let previews: Vec<Option<&str>> = entry.values.iter().map(|v| v.preview.as_ref().map(|p| p.id.as_str())).collect();
    assert_eq!(previews, vec![Some("p1"), Some("p2")]);

    assert!(interaction.active_filters(&request).is_empty(), "two candidates never become a filter");
}

#[test]
fn close_single_candidate_term_acts_as_guidance() {
    let response = response(json!({ "search": color_group() }));
    let model = json!({
        "queryText": "sneaker",
        "queryTerms": [{"index": 0, "type": "ambiguous", "value": "sneaker", "refinements": [
            {"property": "category", "values": [{"value": "sneakers", "population": 4}]}
        ]}]
    });
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());
    let request = interaction.request();

    assert!(interaction.active_did_you_mean(&request).is_empty());
    assert!(interaction.active_ambiguities(&request).is_empty());
    let filters = interaction.active_filters(&request);
    let category = &filters["category"];
    assert_eq!(category[0].mode, FilterMode::Guidance);
    assert_eq!(category[0].index, -1);
    assert_eq!(category[0].value, "sneakers");
    assert_eq!(category[0].remove_action.uri, "remove:property:category");
    assert!(category[0].alternative.is_none(), "group has no category attribute");
}

#[test]
fn term_removal_wins_over_guidance_index() {
    let response = response(json!({ "search": color_group() }));
    let model = json!({
        "queryText": "red",
        "queryTerms": [{"index": 0, "type": "matched", "value": "red",
            "guidances": [{"property": "color", "data": ["red"]}]}],
        "guidances": [{"property": "color", "data": ["blue"]}]
    });
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());
    let request = interaction.request();

    let filters = interaction.active_filters(&request);
    let color = &filters["color"];
    assert_eq!(color.len(), 2);
    assert_eq!((color[0].mode, color[0].index), (FilterMode::Term, 0));
    assert_eq!(color[0].remove_action.uri, "refine:0::");
    assert_eq!((color[1].mode, color[1].index), (FilterMode::Guidance, 0));
    assert_eq!(color[1].remove_action.uri, "remove:index:0");

    let alternative = color[0].alternative.as_ref().expect("color alternative");
    assert_eq!(alternative.values_selected, 2);
    assert_eq!(alternative.values_filtering, 0);
}

#[test]
fn unknown_properties_are_skipped() {
    let mut group = color_group();
    group["attributes"]
        .as_array_mut()
        .expect("attributes")
        .push(json!({"property": "material", "values": [{"data": ["wool"], "population": 5}]}));
    let response = response(json!({ "search": group }));
    let model = json!({
        "guidances": [{"property": "material", "data": ["wool"]}],
        "queryTerms": [{"index": 0, "type": "ambiguous", "value": "wol", "refinements": [
            {"property": "material", "values": [{"value": "wool"}, {"value": "wolf"}]}
        ]}]
    });
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());
    let request = interaction.request();

    assert!(interaction.property("material", &request).is_none());
    assert_eq!(interaction.properties(&request).len(), 4);
    assert!(interaction.active_filters(&request).is_empty());
    assert!(interaction.active_ambiguities(&request).is_empty());
    assert!(interaction.refinement("material", &request).is_none());
    assert_eq!(interaction.refinements(&request).len(), 1);
}

#[test]
fn malformed_context_resolves_as_empty() {
    let response = response(json!({ "search": color_group() }));
    let mut store = ContextStore::new();
    store.insert(scope("model", "{\"queryText\": "));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &store, &encoder, &formatter, ResolverPolicy::default());
    let request = interaction.request();

    assert_eq!(interaction.active_query(), "");
    assert!(interaction.active_filters(&request).is_empty());
    assert!(interaction.preferred_properties("default").is_empty());
    assert_eq!(interaction.refinements(&request).len(), 1);
}

#[test]
fn results_are_flattened() {
    let response = response(json!({ "search": color_group() }));
    let contexts = contexts(json!({}), json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());

    let results = interaction.results(&interaction.request());
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].scalars.get("color").map(String::as_str), Some("red"));
    assert!(interaction.results(&cem_core::types::RequestContext::new("missing")).is_empty());
    assert!(encoder.calls().is_empty(), "results never encode actions");
}

#[test]
fn one_malformed_term_does_not_drop_the_model() {
    let response = response(json!({ "search": color_group() }));
    let model = json!({
        "queryText": "red boots",
        "queryTerms": [
            {"index": 0, "type": "matched", "value": "red", "guidances": [{"property": "color", "data": ["red"]}]},
            {"index": 1, "type": "partial", "value": "boots"},
            {"type": "matched"},
            {"index": "two", "type": "refined", "value": "x"}
        ],
        "guidances": [{"data": 7}, {"property": "color", "data": ["blue"]}]
    });
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());
    let request = interaction.request();

    assert_eq!(interaction.active_query(), "red boots");
    let filters = interaction.active_filters(&request);
    let color = &filters["color"];
    assert_eq!(color.len(), 2);
    assert_eq!((color[0].mode, color[0].value.as_str()), (FilterMode::Term, "red"));
    assert_eq!((color[1].mode, color[1].value.as_str()), (FilterMode::Guidance, "blue"));
    assert_eq!(color[1].index, 1, "slot positions survive a malformed guidance");
    assert_eq!(color[1].remove_action.uri, "remove:index:1");
    assert!(interaction.active_did_you_mean(&request).is_empty());
    assert!(interaction.active_ambiguities(&request).is_empty());
}

#[test]
fn suggestion_keeps_query_around_non_ascii_term() {
    let response = response(json!({ "search": color_group() }));
    let model = json!({
        "queryText": "rote ÜBERJACKE",
        "queryTerms": [{"index": 1, "type": "ambiguous", "value": "überjacke", "refinements": [
            {"property": "category", "values": [{"value": "überjacken"}, {"value": "unterhemd"}]}
        ]}]
    });
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());

    let suggestions = interaction.active_did_you_mean(&interaction.request());
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].query, "rote überjacken");
}

#[test]
fn lone_catch_all_branch_is_collapsed() {
    let group = category_group(
        json!([
            {"data": ["All"], "population": 10, "children": [
                {"data": ["A"], "population": 6},
                {"data": ["B"], "population": 4}
            ]},
            {"data": ["Sale"], "population": 3}
        ]),
        10,
    );
    let response = response(json!({ "search": group }));
    let contexts = contexts(json!({}), json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());

    let category = interaction.refinement("category", &interaction.request()).expect("category refinement");
    assert_eq!(names(&category), vec!["A", "B"]);
    assert_eq!(category.parents.len(), 1);
    assert_eq!(category.parents[0].name, "All");
}

#[test]
fn two_catch_all_branches_stay_at_the_root() {
    let group = category_group(
        json!([
            {"data": ["All"], "population": 10, "children": [{"data": ["A"], "population": 6}]},
            {"data": ["Everything"], "population": 10, "children": [{"data": ["C"], "population": 2}]},
            {"data": ["Sale"], "population": 3}
        ]),
        10,
    );
    let response = response(json!({ "search": group }));
    let contexts = contexts(json!({}), json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());

    let category = interaction.refinement("category", &interaction.request()).expect("category refinement");
    assert_eq!(names(&category), vec!["All", "Everything", "Sale"]);
    assert!(category.parents.is_empty());
}

#[test]
fn childless_catch_all_is_rendered_in_place() {
    let group = category_group(
        json!([
            {"data": ["All"], "population": 10},
            {"data": ["Sale"], "population": 3}
        ]),
        10,
    );
    let response = response(json!({ "search": group }));
    let contexts = contexts(json!({}), json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());

    let category = interaction.refinement("category", &interaction.request()).expect("category refinement");
    assert_eq!(names(&category), vec!["All", "Sale"]);
    assert!(!category.values[0].filtering);
    assert!(category.values[1].filtering);
}

#[test]
fn exact_alternates_are_deduplicated_first_wins() {
    let response = response(json!({ "search": color_group() }));
    let model = json!({
        "queryText": "boots",
        "queryTerms": [{"index": 0, "type": "ambiguous", "value": "boots", "refinements": [
            {"property": "category", "values": [{"value": "Boots"}, {"value": "boats"}]},
            {"property": "brand", "values": [{"value": "boots"}]}
        ]}]
    });
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());

    let suggestions = interaction.active_did_you_mean(&interaction.request());
    let picked: Vec<(&str, usize)> = suggestions.iter().map(|s| (s.value.as_str(), s.distance)).collect();
    assert_eq!(picked, vec![("Boots", 0), ("boats", 1)]);
    assert_eq!(suggestions[0].query, "Boots");
}

#[test]
fn equal_distances_keep_candidate_order() {
    let response = response(json!({ "search": color_group() }));
    let model = json!({
        "queryText": "sandal",
        "queryTerms": [{"index": 0, "type": "ambiguous", "value": "sandal", "refinements": [
            {"property": "category", "values": [{"value": "vandal"}, {"value": "sandals"}]},
            {"property": "brand", "values": [{"value": "scandal"}, {"value": "Sandal"}]}
        ]}]
    });
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());

    let suggestions = interaction.active_did_you_mean(&interaction.request());
    let values: Vec<&str> = suggestions.iter().map(|s| s.value.as_str()).collect();
    assert_eq!(values, vec!["Sandal", "vandal", "sandals", "scandal"]);
}

#[test]
fn long_term_within_budget_filters_as_term() {
    let response = response(json!({ "search": color_group() }));
    let model = json!({
        "queryText": "waterproofhikingboot",
        "queryTerms": [
            {"index": 2, "type": "ambiguous", "value": "waterproofhikingboot", "refinements": [
                {"property": "category", "values": [{"value": "waterproof hiking boots"}]}
            ]},
            {"index": 3, "type": "ambiguous", "value": "waterproofhikingboot", "refinements": [
                {"property": "category", "values": [{"value": "waterproof-hiking-boots!"}]}
            ]}
        ]
    });
    let contexts = contexts(model, json!({}));
    let (encoder, formatter) = (RecordingEncoder::default(), KeyFormatter);
    let interaction = Interaction::new(&response, &contexts, &encoder, &formatter, ResolverPolicy::default());

    let filters = interaction.active_filters(&interaction.request());
    let category = &filters["category"];
    assert_eq!(category.len(), 1, "distance 4 is not under a budget of 4");
    assert_eq!((category[0].mode, category[0].index), (FilterMode::Term, 2));
    assert_eq!(category[0].value, "waterproof hiking boots");
    assert_eq!(category[0].remove_action.uri, "refine:2::");
}
