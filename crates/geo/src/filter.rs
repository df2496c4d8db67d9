//! # Feature Filter (§4.5)
//!
//! A small recursive-descent evaluator over [`FilterExpression`] matching
//! MapLibre semantics. The original `stlmaps` source's `evaluate_filter`
//! is a stub that always returns `true` ("simplified filter evaluation...
//! assume true if there's no filter") — the full subset specified here is
//! a deliberate enrichment, built fresh with no direct teacher analog.

use tile3d_common::{Feature, FilterExpression, PropertyValue};

/// Evaluate `expr` against `feature.properties`, per §4.5/§8's rules:
/// missing keys make comparisons false (except `!=`, which is true), and
/// `all`/`any`/`none` short-circuit.
pub fn evaluate(expr: &FilterExpression, feature: &Feature) -> bool {
    match expr {
        FilterExpression::Eq(key, value) => feature.properties.get(key) == Some(value),
        FilterExpression::Ne(key, value) => feature.properties.get(key) != Some(value),
        FilterExpression::Lt(key, value) => compare(feature, key, value, |o| o.is_lt()),
        FilterExpression::Lte(key, value) => compare(feature, key, value, |o| o.is_le()),
        FilterExpression::Gt(key, value) => compare(feature, key, value, |o| o.is_gt()),
        FilterExpression::Gte(key, value) => compare(feature, key, value, |o| o.is_ge()),
        FilterExpression::In(key, values) => match feature.properties.get(key) {
            Some(actual) => values.contains(actual),
            None => false,
        },
        FilterExpression::NotIn(key, values) => match feature.properties.get(key) {
            Some(actual) => !values.contains(actual),
            None => true,
        },
        FilterExpression::Has(key) => feature.properties.contains_key(key),
        FilterExpression::NotHas(key) => !feature.properties.contains_key(key),
        FilterExpression::All(exprs) => exprs.iter().all(|e| evaluate(e, feature)),
        FilterExpression::Any(exprs) => exprs.iter().any(|e| evaluate(e, feature)),
        FilterExpression::None(exprs) => !exprs.iter().any(|e| evaluate(e, feature)),
    }
}

fn compare(
    feature: &Feature,
    key: &str,
    value: &PropertyValue,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    let Some(actual) = feature.properties.get(key) else {
        return false;
    };
    match (actual, value) {
        (PropertyValue::Number(a), PropertyValue::Number(b)) => {
            a.partial_cmp(b).map(accept).unwrap_or(false)
        }
        (PropertyValue::String(a), PropertyValue::String(b)) => accept(a.cmp(b)),
        _ => false,
    }
}

/// Apply `filter` (or pass everything through when `None`, per §4.5
/// "Filter is applied before any geometry work") to a feature set.
pub fn filter_features<'a>(features: &'a [Feature], filter: Option<&FilterExpression>) -> Vec<&'a Feature> {
    match filter {
        Some(expr) => features.iter().filter(|f| evaluate(expr, f)).collect(),
        None => features.iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tile3d_common::FeatureGeometry;

    fn feature_with(properties: Vec<(&str, PropertyValue)>) -> Feature {
        Feature {
            geometry: FeatureGeometry::Point { coord: (0.0, 0.0) },
            properties: properties.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            source_layer: "test".into(),
        }
    }

    #[test]
    fn missing_key_comparison_is_false_but_ne_is_true() {
        let f = feature_with(vec![]);
        assert!(!evaluate(&FilterExpression::Eq("class".into(), PropertyValue::String("a".into())), &f));
        assert!(evaluate(&FilterExpression::Ne("class".into(), PropertyValue::String("a".into())), &f));
    }

    #[test]
    fn has_and_not_has() {
        let f = feature_with(vec![("class", PropertyValue::String("road".into()))]);
        assert!(evaluate(&FilterExpression::Has("class".into()), &f));
        assert!(!evaluate(&FilterExpression::NotHas("class".into()), &f));
        assert!(evaluate(&FilterExpression::NotHas("missing".into()), &f));
    }

    #[test]
    fn all_any_short_circuit_semantics() {
        let f = feature_with(vec![("class", PropertyValue::String("road".into()))]);
        let nested = FilterExpression::All(vec![
            FilterExpression::Has("class".into()),
            FilterExpression::Any(vec![
                FilterExpression::Eq("class".into(), PropertyValue::String("road".into())),
                FilterExpression::Eq("class".into(), PropertyValue::String("path".into())),
            ]),
        ]);
        assert!(evaluate(&nested, &f));
    }

    #[test]
    fn numeric_comparison() {
        let f = feature_with(vec![("height", PropertyValue::Number(30.0))]);
        assert!(evaluate(&FilterExpression::Gt("height".into(), PropertyValue::Number(10.0)), &f));
        assert!(!evaluate(&FilterExpression::Lt("height".into(), PropertyValue::Number(10.0)), &f));
    }
}
