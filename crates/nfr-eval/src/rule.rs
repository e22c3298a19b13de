use std::collections::HashMap;

use nfr_value::{MatchExpression, RegexCache, ValueError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evidence::MatchedElement;
use crate::features::{FeatureShape, Features};
use crate::set::{
    match_instance_attribute_names, match_instances, match_key_names, match_keys,
    match_value_names, match_values, MatchExpressionSet,
};

/// One term of a `matchFeatures` block: a feature reference plus either a
/// `matchExpressions` set or a single `matchName` expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMatcherTerm {
    pub feature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<MatchExpressionSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_name: Option<MatchExpression>,
}

/// An ordered AND of feature-matcher terms.
pub type FeatureMatcher = Vec<FeatureMatcherTerm>;

/// One alternative of a `matchAny` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAnyElement {
    #[serde(default)]
    pub match_features: FeatureMatcher,
}

/// A named rule combining `matchFeatures` (AND) and `matchAny` (OR of
/// alternatives). `labels`/`annotations` are opaque to the core: they pass
/// through unexamined to a downstream templater.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_features: Option<FeatureMatcher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_any: Option<Vec<MatchAnyElement>>,
}

/// The evidence produced by a rule: feature FQN -> evidence list.
pub type MatchedFeatures = HashMap<String, Vec<MatchedElement>>;

#[derive(Debug, Error)]
#[error("rule '{rule_name}' feature '{feature}': {source}")]
pub struct RuleError {
    pub rule_name: String,
    pub feature: String,
    #[source]
    pub source: ValueError,
}

/// Evaluates `rule` against `features`, using a fresh, private regex cache.
///
/// For repeated evaluation of many rules against many feature snapshots,
/// prefer `evaluate_with_cache` with one shared `RegexCache` so compiled
/// `InRegexp` patterns are reused across calls.
pub fn evaluate(rule: &Rule, features: &Features) -> Result<(bool, MatchedFeatures), RuleError> {
    evaluate_with_cache(rule, features, &RegexCache::default())
}

/// Evaluates `rule` against `features`, sharing `cache` across calls.
pub fn evaluate_with_cache(
    rule: &Rule,
    features: &Features,
    cache: &RegexCache,
) -> Result<(bool, MatchedFeatures), RuleError> {
    let mut out = MatchedFeatures::new();

    let mf_matched = match &rule.match_features {
        Some(terms) => evaluate_match_features(terms, features, &rule.name, cache, &mut out)?,
        None => true,
    };
    if !mf_matched {
        tracing::debug!(rule = %rule.name, "matchFeatures did not match");
        return Ok((false, MatchedFeatures::new()));
    }

    match &rule.match_any {
        Some(alternatives) => {
            let (any_matched, any_out) =
                evaluate_match_any(alternatives, features, &rule.name, cache)?;
            if !any_matched {
                tracing::debug!(rule = %rule.name, "matchAny did not match");
                return Ok((false, MatchedFeatures::new()));
            }
            for (feature, evidence) in any_out {
                out.entry(feature).or_default().extend(evidence);
            }
            tracing::debug!(rule = %rule.name, "rule matched");
            Ok((true, out))
        }
        None => {
            tracing::debug!(rule = %rule.name, "rule matched");
            Ok((true, out))
        }
    }
}

fn evaluate_match_features(
    terms: &FeatureMatcher,
    features: &Features,
    rule_name: &str,
    cache: &RegexCache,
    out: &mut MatchedFeatures,
) -> Result<bool, RuleError> {
    let mut all_matched = true;
    for term in terms {
        let outcome = evaluate_term(term, features, cache).map_err(|source| RuleError {
            rule_name: rule_name.to_string(),
            feature: term.feature.clone(),
            source,
        })?;
        match outcome {
            Some((true, evidence)) => {
                out.entry(term.feature.clone()).or_default().extend(evidence);
            }
            Some((false, _)) => all_matched = false,
            None => {
                tracing::debug!(rule = %rule_name, feature = %term.feature, "feature not found");
                all_matched = false;
            }
        }
    }
    Ok(all_matched)
}

fn evaluate_match_any(
    alternatives: &[MatchAnyElement],
    features: &Features,
    rule_name: &str,
    cache: &RegexCache,
) -> Result<(bool, MatchedFeatures), RuleError> {
    for alt in alternatives {
        let mut out = MatchedFeatures::new();
        if evaluate_match_features(&alt.match_features, features, rule_name, cache, &mut out)? {
            return Ok((true, out));
        }
    }
    Ok((false, MatchedFeatures::new()))
}

/// Dispatches one `FeatureMatcherTerm` to the shape-specific evaluator.
///
/// Returns `Ok(None)` when the feature is unknown (not an error, §4.1): the
/// term simply yields false with no evidence.
fn evaluate_term(
    term: &FeatureMatcherTerm,
    features: &Features,
    cache: &RegexCache,
) -> Result<Option<(bool, Vec<MatchedElement>)>, ValueError> {
    let shape = match features.shape_of(&term.feature) {
        Some(shape) => shape,
        None => return Ok(None),
    };

    let result = if let Some(set) = &term.match_expressions {
        match shape {
            FeatureShape::Flag => match_keys(set, &features.flags[&term.feature], cache)?,
            FeatureShape::Attribute => {
                match_values(set, &features.attributes[&term.feature], cache)?
            }
            FeatureShape::Instance => {
                match_instances(set, &features.instances[&term.feature], cache)?
            }
        }
    } else if let Some(name_expr) = &term.match_name {
        match shape {
            FeatureShape::Flag => {
                match_key_names(name_expr, &features.flags[&term.feature], cache)?
            }
            FeatureShape::Attribute => {
                match_value_names(name_expr, &features.attributes[&term.feature], cache)?
            }
            FeatureShape::Instance => {
                match_instance_attribute_names(name_expr, &features.instances[&term.feature], cache)?
            }
        }
    } else {
        (true, Vec::new())
    };

    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::InstanceFeature;
    use nfr_value::{MatchOp, MatchValue};
    use std::collections::HashSet;

    fn flag_term(feature: &str, key: &str, op: MatchOp) -> FeatureMatcherTerm {
        let mut set = MatchExpressionSet::new();
        set.insert(key.to_string(), MatchExpression::op_only(op));
        FeatureMatcherTerm {
            feature: feature.to_string(),
            match_expressions: Some(set),
            match_name: None,
        }
    }

    #[test]
    fn rule_with_no_predicates_is_a_catch_all() {
        let rule = Rule {
            name: "catch-all".into(),
            ..Default::default()
        };
        let features = Features::new();
        let (matched, evidence) = evaluate(&rule, &features).unwrap();
        assert!(matched);
        assert!(evidence.is_empty());
    }

    #[test]
    fn match_features_ands_across_terms() {
        let features = Features::new()
            .with_flag("cpu.model", HashSet::from(["intel".to_string()]))
            .with_flag("kernel.feature", HashSet::from(["seccomp".to_string()]));

        let rule = Rule {
            name: "r1".into(),
            match_features: Some(vec![
                flag_term("cpu.model", "intel", MatchOp::Exists),
                flag_term("kernel.feature", "seccomp", MatchOp::Exists),
            ]),
            ..Default::default()
        };
        let (matched, evidence) = evaluate(&rule, &features).unwrap();
        assert!(matched);
        assert_eq!(evidence.len(), 2);
    }

    #[test]
    fn unknown_feature_gates_rule_off_without_error() {
        let features = Features::new();
        let rule = Rule {
            name: "r1".into(),
            match_features: Some(vec![flag_term("cpu.model", "intel", MatchOp::Exists)]),
            ..Default::default()
        };
        let (matched, evidence) = evaluate(&rule, &features).unwrap();
        assert!(!matched);
        assert!(evidence.is_empty());
    }

    #[test]
    fn match_any_uses_first_matching_alternative_only() {
        let features = Features::new().with_flag("cpu.model", HashSet::from(["amd".to_string()]));

        let rule = Rule {
            name: "r1".into(),
            match_any: Some(vec![
                MatchAnyElement {
                    match_features: vec![flag_term("cpu.model", "intel", MatchOp::Exists)],
                },
                MatchAnyElement {
                    match_features: vec![flag_term("cpu.model", "amd", MatchOp::Exists)],
                },
            ]),
            ..Default::default()
        };
        let (matched, evidence) = evaluate(&rule, &features).unwrap();
        assert!(matched);
        assert_eq!(
            evidence.get("cpu.model"),
            Some(&vec![MatchedElement::name("amd")])
        );
    }

    #[test]
    fn match_features_and_match_any_merge_evidence_in_order() {
        let features = Features::new()
            .with_flag("cpu.model", HashSet::from(["intel".to_string()]))
            .with_attribute(
                "cpu.topology",
                HashMap::from([("sockets".to_string(), "2".to_string())]),
            );

        let mut sockets_set = MatchExpressionSet::new();
        sockets_set.insert(
            "sockets".to_string(),
            MatchExpression::new(MatchOp::Gt, MatchValue::new(vec!["1".into()])),
        );

        let rule = Rule {
            name: "r1".into(),
            match_features: Some(vec![flag_term("cpu.model", "intel", MatchOp::Exists)]),
            match_any: Some(vec![MatchAnyElement {
                match_features: vec![FeatureMatcherTerm {
                    feature: "cpu.topology".into(),
                    match_expressions: Some(sockets_set),
                    match_name: None,
                }],
            }]),
            ..Default::default()
        };
        let (matched, evidence) = evaluate(&rule, &features).unwrap();
        assert!(matched);
        assert_eq!(
            evidence.get("cpu.model"),
            Some(&vec![MatchedElement::name("intel")])
        );
        assert_eq!(
            evidence.get("cpu.topology"),
            Some(&vec![MatchedElement::name_value("sockets", "2")])
        );
    }

    #[test]
    fn evidence_is_discarded_when_rule_does_not_match() {
        let features = Features::new()
            .with_flag("cpu.model", HashSet::from(["intel".to_string()]))
            .with_flag("kernel.feature", HashSet::new());

        let rule = Rule {
            name: "r1".into(),
            match_features: Some(vec![
                flag_term("cpu.model", "intel", MatchOp::Exists),
                flag_term("kernel.feature", "seccomp", MatchOp::Exists),
            ]),
            ..Default::default()
        };
        let (matched, evidence) = evaluate(&rule, &features).unwrap();
        assert!(!matched);
        assert!(evidence.is_empty());
    }

    #[test]
    fn instance_feature_term_collects_matching_instance_bag() {
        let features = Features::new().with_instances(
            "pci.device",
            vec![
                InstanceFeature::from([("class", "0300")]),
                InstanceFeature::from([("class", "0200"), ("vendor", "8086")]),
            ],
        );
        let mut set = MatchExpressionSet::new();
        set.insert(
            "vendor".to_string(),
            MatchExpression::new(MatchOp::In, MatchValue::new(vec!["8086".into()])),
        );
        let rule = Rule {
            name: "r1".into(),
            match_features: Some(vec![FeatureMatcherTerm {
                feature: "pci.device".into(),
                match_expressions: Some(set),
                match_name: None,
            }]),
            ..Default::default()
        };
        let (matched, evidence) = evaluate(&rule, &features).unwrap();
        assert!(matched);
        assert_eq!(evidence["pci.device"].len(), 1);
        assert_eq!(evidence["pci.device"][0].get("vendor"), Some("8086"));
    }
}
