use std::collections::{BTreeMap, HashMap, HashSet};

use nfr_value::{validate, MatchExpression, MatchOp, RegexCache, ValueError};

use crate::evidence::MatchedElement;
use crate::expr::eval_single;
use crate::features::InstanceFeature;

/// A keyed collection of match expressions. Backed by a `BTreeMap` so
/// iteration is always in sorted-key order, matching the determinism
/// requirement that drives evidence ordering.
pub type MatchExpressionSet = BTreeMap<String, MatchExpression>;

/// `MatchKeys` — the flag-shape set evaluator.
///
/// For each `(k, expr)` in sorted order: if `k` is present in `keys`,
/// evaluate `expr` in presence context; if absent, only `Any`/`DoesNotExist`
/// succeed. The set matches iff every expression matches; evidence is
/// discarded (returned empty) unless the set as a whole matched.
pub fn match_keys(
    set: &MatchExpressionSet,
    keys: &HashSet<String>,
    cache: &RegexCache,
) -> Result<(bool, Vec<MatchedElement>), ValueError> {
    let mut evidence = Vec::new();
    for (k, expr) in set {
        validate(expr)?;
        let present = keys.contains(k);
        let matched = if present {
            eval_single(expr, None, cache)?
        } else {
            matches!(expr.op, MatchOp::Any | MatchOp::DoesNotExist)
        };
        if !matched {
            return Ok((false, Vec::new()));
        }
        if present {
            evidence.push(MatchedElement::name(k));
        }
    }
    Ok((true, evidence))
}

/// `MatchValues` — the attribute-shape set evaluator.
pub fn match_values(
    set: &MatchExpressionSet,
    attrs: &HashMap<String, String>,
    cache: &RegexCache,
) -> Result<(bool, Vec<MatchedElement>), ValueError> {
    match_values_with(set, |k| attrs.get(k).map(String::as_str), cache)
}

fn match_values_with<F>(
    set: &MatchExpressionSet,
    lookup: F,
    cache: &RegexCache,
) -> Result<(bool, Vec<MatchedElement>), ValueError>
where
    F: Fn(&str) -> Option<&str>,
{
    let mut evidence = Vec::new();
    for (k, expr) in set {
        validate(expr)?;
        match lookup(k) {
            None => {
                if !matches!(expr.op, MatchOp::Any | MatchOp::DoesNotExist) {
                    return Ok((false, Vec::new()));
                }
            }
            Some(v) => {
                if !eval_single(expr, Some(v), cache)? {
                    return Ok((false, Vec::new()));
                }
                evidence.push(MatchedElement::name_value(k, v));
            }
        }
    }
    Ok((true, evidence))
}

/// `MatchInstances` — the instance-shape set evaluator.
///
/// The set matches an instance iff `MatchValues` matches against that
/// instance's attribute bag. The overall result is true iff at least one
/// instance matched; evidence is the full attribute bag of each matching
/// instance, in input order. The first error across instances wins.
pub fn match_instances(
    set: &MatchExpressionSet,
    instances: &[InstanceFeature],
    cache: &RegexCache,
) -> Result<(bool, Vec<MatchedElement>), ValueError> {
    let mut evidence = Vec::new();
    for inst in instances {
        let (matched, _) =
            match_values_with(set, |k| inst.attributes.get(k).map(String::as_str), cache)?;
        if matched {
            evidence.push(MatchedElement::from_attributes(inst.attributes.iter()));
        }
    }
    Ok((!evidence.is_empty(), evidence))
}

/// `MatchKeyNames` — evaluates a single expression against the *names* in a
/// key-set (rather than against a particular key's presence).
pub fn match_key_names(
    expr: &MatchExpression,
    keys: &HashSet<String>,
    cache: &RegexCache,
) -> Result<(bool, Vec<MatchedElement>), ValueError> {
    validate(expr)?;
    let mut sorted: Vec<&String> = keys.iter().collect();
    sorted.sort();
    let mut evidence = Vec::new();
    for k in sorted {
        if eval_single(expr, Some(k), cache)? {
            evidence.push(MatchedElement::name(k));
        }
    }
    Ok((!evidence.is_empty(), evidence))
}

/// `MatchValueNames` — evaluates a single expression against the *names* in
/// an attribute map.
pub fn match_value_names(
    expr: &MatchExpression,
    attrs: &HashMap<String, String>,
    cache: &RegexCache,
) -> Result<(bool, Vec<MatchedElement>), ValueError> {
    validate(expr)?;
    let mut keys: Vec<&String> = attrs.keys().collect();
    keys.sort();
    let mut evidence = Vec::new();
    for k in keys {
        if eval_single(expr, Some(k), cache)? {
            evidence.push(MatchedElement::name_value(k, &attrs[k]));
        }
    }
    Ok((!evidence.is_empty(), evidence))
}

/// `MatchInstanceAttributeNames` — evaluates a single expression against the
/// attribute *names* within each instance; an instance contributes evidence
/// iff at least one of its attribute names matched, and that evidence is
/// the instance's full attribute bag (not just the matching names).
pub fn match_instance_attribute_names(
    expr: &MatchExpression,
    instances: &[InstanceFeature],
    cache: &RegexCache,
) -> Result<(bool, Vec<MatchedElement>), ValueError> {
    validate(expr)?;
    let mut evidence = Vec::new();
    for inst in instances {
        let mut any_matched = false;
        for k in inst.attributes.keys() {
            if eval_single(expr, Some(k), cache)? {
                any_matched = true;
                break;
            }
        }
        if any_matched {
            evidence.push(MatchedElement::from_attributes(inst.attributes.iter()));
        }
    }
    Ok((!evidence.is_empty(), evidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfr_value::MatchValue;

    fn set(pairs: Vec<(&str, MatchExpression)>) -> MatchExpressionSet {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn keys(xs: &[&str]) -> HashSet<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scenario_match_keys_matches() {
        let s = set(vec![
            ("foo", MatchExpression::op_only(MatchOp::DoesNotExist)),
            ("bar", MatchExpression::op_only(MatchOp::Exists)),
        ]);
        let (matched, evidence) = match_keys(&s, &keys(&["bar", "baz", "buzz"]), &RegexCache::default()).unwrap();
        assert!(matched);
        assert_eq!(evidence, vec![MatchedElement::name("bar"), MatchedElement::name("foo")]);
    }

    #[test]
    fn scenario_match_keys_does_not_match() {
        let s = set(vec![
            ("foo", MatchExpression::op_only(MatchOp::DoesNotExist)),
            ("bar", MatchExpression::op_only(MatchOp::Exists)),
        ]);
        let (matched, evidence) = match_keys(&s, &keys(&["foo", "bar", "baz"]), &RegexCache::default()).unwrap();
        assert!(!matched);
        assert!(evidence.is_empty());
    }

    #[test]
    fn absent_key_with_in_is_false_not_error() {
        let s = set(vec![
            ("foo", MatchExpression::new(MatchOp::In, MatchValue::new(vec!["bar".into()]))),
            ("bar", MatchExpression::op_only(MatchOp::Exists)),
        ]);
        let (matched, evidence) = match_keys(&s, &keys(&["bar", "baz"]), &RegexCache::default()).unwrap();
        assert!(!matched);
        assert!(evidence.is_empty());
    }

    #[test]
    fn invalid_expression_errors_even_without_pre_validation() {
        let s = set(vec![
            ("foo", MatchExpression::new(MatchOp::Exists, MatchValue::new(vec!["bar".into()]))),
            ("bar", MatchExpression::op_only(MatchOp::Exists)),
        ]);
        let res = match_keys(&s, &keys(&["bar"]), &RegexCache::default());
        assert!(res.is_err());
    }

    #[test]
    fn scenario_match_values() {
        let s = set(vec![
            ("foo", MatchExpression::op_only(MatchOp::Exists)),
            ("bar", MatchExpression::new(MatchOp::In, MatchValue::new(vec!["val".into(), "wal".into()]))),
            ("baz", MatchExpression::new(MatchOp::Gt, MatchValue::new(vec!["10".into()]))),
        ]);
        let mut attrs = HashMap::new();
        attrs.insert("foo".to_string(), "1".to_string());
        attrs.insert("bar".to_string(), "val".to_string());
        attrs.insert("baz".to_string(), "123".to_string());
        attrs.insert("buzz".to_string(), "light".to_string());

        let (matched, evidence) = match_values(&s, &attrs, &RegexCache::default()).unwrap();
        assert!(matched);
        assert_eq!(
            evidence,
            vec![
                MatchedElement::name_value("bar", "val"),
                MatchedElement::name_value("baz", "123"),
                MatchedElement::name_value("foo", "1"),
            ]
        );
    }

    #[test]
    fn scenario_match_values_non_integer_errors() {
        let s = set(vec![
            ("foo", MatchExpression::op_only(MatchOp::Exists)),
            ("bar", MatchExpression::new(MatchOp::In, MatchValue::new(vec!["val".into()]))),
            ("baz", MatchExpression::new(MatchOp::Gt, MatchValue::new(vec!["10".into()]))),
        ]);
        let mut attrs = HashMap::new();
        attrs.insert("foo".to_string(), "1".to_string());
        attrs.insert("bar".to_string(), "val".to_string());
        attrs.insert("baz".to_string(), "123.0".to_string());

        assert!(match_values(&s, &attrs, &RegexCache::default()).is_err());
    }

    #[test]
    fn scenario_match_instances() {
        let s = set(vec![
            ("foo", MatchExpression::op_only(MatchOp::Exists)),
            ("bar", MatchExpression::new(MatchOp::Lt, MatchValue::new(vec!["10".into()]))),
        ]);
        let instances = vec![
            InstanceFeature::from([("foo", "1")]),
            InstanceFeature::from([("foo", "2"), ("bar", "1")]),
        ];
        let (matched, evidence) = match_instances(&s, &instances, &RegexCache::default()).unwrap();
        assert!(matched);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].get("foo"), Some("2"));
        assert_eq!(evidence[0].get("bar"), Some("1"));
    }

    #[test]
    fn empty_instances_do_not_match() {
        let s: MatchExpressionSet = MatchExpressionSet::new();
        let (matched, evidence) = match_instances(&s, &[], &RegexCache::default()).unwrap();
        assert!(!matched);
        assert!(evidence.is_empty());
    }

    #[test]
    fn scenario_match_key_names_notin() {
        let expr = MatchExpression::new(MatchOp::NotIn, MatchValue::new(vec!["key1".into()]));
        let (matched, evidence) = match_key_names(&expr, &keys(&["key1", "key2"]), &RegexCache::default()).unwrap();
        assert!(matched);
        assert_eq!(evidence, vec![MatchedElement::name("key2")]);
    }

    #[test]
    fn match_key_names_any_is_existential_over_empty_input() {
        let expr = MatchExpression::op_only(MatchOp::Any);
        let (matched, evidence) = match_key_names(&expr, &HashSet::new(), &RegexCache::default()).unwrap();
        assert!(!matched);
        assert!(evidence.is_empty());
    }

    #[test]
    fn match_instance_attribute_names_yields_full_bag() {
        let expr = MatchExpression::new(MatchOp::In, MatchValue::new(vec!["foo".into()]));
        let instances = vec![
            InstanceFeature::from([("foo", "1")]),
            InstanceFeature::from([("bar", "2")]),
            InstanceFeature::from([("foo", "3"), ("baz", "4")]),
        ];
        let (matched, evidence) =
            match_instance_attribute_names(&expr, &instances, &RegexCache::default()).unwrap();
        assert!(matched);
        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[0].get("foo"), Some("1"));
        assert_eq!(evidence[1].get("foo"), Some("3"));
        assert_eq!(evidence[1].get("baz"), Some("4"));
    }
}
