use nfr_value::{MatchExpression, MatchOp, RegexCache, ValueError};

/// Evaluates a single `MatchExpression` against one (key-implicit) value.
///
/// `value` is `None` for flag contexts (presence-only, no operand to compare
/// against) and `Some` for attribute/instance contexts. Callers are
/// responsible for the "key absent from the input collection" case — by the
/// time this function is reached, the key is known to be present; a key
/// absent from a key-set or attribute map is handled directly by the set
/// evaluators in `set.rs` (only `Any`/`DoesNotExist` succeed there, and that
/// never errors).
pub fn eval_single(
    expr: &MatchExpression,
    value: Option<&str>,
    cache: &RegexCache,
) -> Result<bool, ValueError> {
    match (expr.op, value) {
        (MatchOp::Any, _) => Ok(true),
        (MatchOp::Exists, _) => Ok(true),
        (MatchOp::DoesNotExist, _) => Ok(false),

        (MatchOp::In, None)
        | (MatchOp::NotIn, None)
        | (MatchOp::InRegexp, None)
        | (MatchOp::Gt, None)
        | (MatchOp::Lt, None)
        | (MatchOp::GtLt, None)
        | (MatchOp::IsTrue, None)
        | (MatchOp::IsFalse, None) => Err(ValueError::InvalidOperandNoValue { op: expr.op }),

        (MatchOp::In, Some(v)) => Ok(expr.value.as_slice().iter().any(|x| x == v)),
        (MatchOp::NotIn, Some(v)) => Ok(!expr.value.as_slice().iter().any(|x| x == v)),

        (MatchOp::InRegexp, Some(v)) => {
            for pattern in expr.value.as_slice() {
                if cache.get_or_compile(pattern)?.find(v).is_some() {
                    return Ok(true);
                }
            }
            Ok(false)
        }

        (MatchOp::Gt, Some(v)) => {
            let threshold = parse_int(&expr.value.as_slice()[0])?;
            Ok(parse_int(v)? > threshold)
        }
        (MatchOp::Lt, Some(v)) => {
            let threshold = parse_int(&expr.value.as_slice()[0])?;
            Ok(parse_int(v)? < threshold)
        }
        (MatchOp::GtLt, Some(v)) => {
            let lo = parse_int(&expr.value.as_slice()[0])?;
            let hi = parse_int(&expr.value.as_slice()[1])?;
            let n = parse_int(v)?;
            Ok(lo < n && n < hi)
        }

        (MatchOp::IsTrue, Some(v)) => Ok(v == "true"),
        (MatchOp::IsFalse, Some(v)) => Ok(v == "false"),
    }
}

fn parse_int(s: &str) -> Result<i64, ValueError> {
    s.parse::<i64>()
        .map_err(|source| ValueError::InvalidOperandInt {
            operand: s.to_string(),
            source,
        })
}
