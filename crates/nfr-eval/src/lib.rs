//!
//! Runtime evaluator for NFD match expressions and rules.
//!
//! Responsibilities:
//! - Evaluate a single `MatchExpression` (`expr`) against one (key, value?) pair.
//! - Evaluate a `MatchExpressionSet` (`set`) against the three feature shapes.
//! - Compose `matchFeatures`/`matchAny` into a rule verdict plus matched evidence (`rule`).
//!
//! Assumptions:
//! - Expressions are validated (`nfr_value::validate`) before evaluation; the set
//!   evaluators re-validate defensively so a caller that forgets never gets a silent
//!   wrong answer, only an error.
//! - The core is synchronous, stateless per call, and performs no I/O.

mod evidence;
mod expr;
mod features;
mod rule;
mod set;

pub use evidence::MatchedElement;
pub use expr::eval_single;
pub use features::{FeatureShape, Features, InstanceFeature};
pub use rule::{
    evaluate, evaluate_with_cache, FeatureMatcher, FeatureMatcherTerm, MatchAnyElement,
    MatchedFeatures, Rule, RuleError,
};
pub use set::{
    match_instance_attribute_names, match_instances, match_key_names, match_keys,
    match_value_names, match_values, MatchExpressionSet,
};

pub use nfr_value::{MatchExpression, MatchOp, MatchValue, RegexCache, ValueError};
