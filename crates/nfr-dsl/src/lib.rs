//!
//! Rule document loading for NFD match rules.
//!
//! Deserializes the YAML/JSON rule-document shape into the typed
//! `nfr_eval::Rule` model and runs the validation pass (arity/content
//! invariants on every `MatchExpression`) before a caller evaluates.
//!
//! Typical pipeline:
//! 1. An external wrapper reads a rule document (a CRD, a local file, a
//!    test fixture) into bytes — that I/O is the wrapper's job, not ours.
//! 2. `load_rules` deserializes the bytes into `Vec<Rule>`.
//! 3. `validate_rules` runs the §3 invariants over every expression in every
//!    rule; invalid rules are reported and dropped, valid ones pass through.
//! 4. The caller evaluates the valid rules against a `Features` snapshot via
//!    `nfr_eval::evaluate`.

use nfr_eval::{FeatureMatcherTerm, Rule};
use nfr_value::{validate, ValueError};
use thiserror::Error;

/// An ordered collection of rules, as read from one document.
pub type RuleSet = Vec<Rule>;

#[derive(Debug, Error)]
pub enum DslError {
    #[error("failed to parse rule document: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("rule '{rule_name}' is invalid: {source}")]
    InvalidRule {
        rule_name: String,
        #[source]
        source: ValueError,
    },
}

/// Deserializes a YAML (or JSON, which is a YAML subset) rule document into
/// a `RuleSet`. Performs no validation and no evaluation.
pub fn load_rules(input: &str) -> Result<RuleSet, DslError> {
    Ok(serde_yaml::from_str(input)?)
}

/// Runs the validation pass over every rule, partitioning into rules that
/// passed and errors for the ones that didn't. A rule with an invalid
/// expression anywhere in `matchFeatures` or `matchAny` is reported and
/// excluded; the rest are still returned as valid.
pub fn validate_rules(rules: RuleSet) -> (RuleSet, Vec<DslError>) {
    let mut valid = Vec::with_capacity(rules.len());
    let mut errors = Vec::new();
    for rule in rules {
        match validate_rule(&rule) {
            Ok(()) => valid.push(rule),
            Err(source) => errors.push(DslError::InvalidRule {
                rule_name: rule.name.clone(),
                source,
            }),
        }
    }
    (valid, errors)
}

/// Convenience: parse then validate in one call.
pub fn load_and_validate(input: &str) -> Result<(RuleSet, Vec<DslError>), DslError> {
    let rules = load_rules(input)?;
    Ok(validate_rules(rules))
}

fn validate_rule(rule: &Rule) -> Result<(), ValueError> {
    if let Some(terms) = &rule.match_features {
        for term in terms {
            validate_term(term)?;
        }
    }
    if let Some(alternatives) = &rule.match_any {
        for alt in alternatives {
            for term in &alt.match_features {
                validate_term(term)?;
            }
        }
    }
    Ok(())
}

fn validate_term(term: &FeatureMatcherTerm) -> Result<(), ValueError> {
    if let Some(set) = &term.match_expressions {
        for expr in set.values() {
            validate(expr)?;
        }
    }
    if let Some(expr) = &term.match_name {
        validate(expr)?;
    }
    Ok(())
}
