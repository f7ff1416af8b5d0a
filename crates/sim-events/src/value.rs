//! World-state value model.
//!
//! The world state store is untyped: values live under dotted string paths
//! and are compared with a small operator language. [`WorldValue`] is the
//! tagged union that backs every entry; [`Comparator`] is the operator
//! language used both by quest seed activation conditions and by ad-hoc
//! `match` queries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value stored in the world state, or carried as a literal inside a
/// quest seed / branch consequence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    /// Ordered list of values.
    List(Vec<WorldValue>),
    /// Unordered set of strings; kept separate from `List` so `contains`/`in`
    /// against it don't need to special-case duplicate-free ordering.
    Set(Vec<String>),
    /// Nested mapping, used when a path's final segment addresses a subtree.
    Map(BTreeMap<String, WorldValue>),
}

impl WorldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            WorldValue::Int(v) => Some(*v),
            WorldValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            WorldValue::Int(v) => Some(*v as f64),
            WorldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WorldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WorldValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, WorldValue::Int(_) | WorldValue::Float(_))
    }
}

impl From<i64> for WorldValue {
    fn from(v: i64) -> Self {
        WorldValue::Int(v)
    }
}

impl From<f64> for WorldValue {
    fn from(v: f64) -> Self {
        WorldValue::Float(v)
    }
}

impl From<bool> for WorldValue {
    fn from(v: bool) -> Self {
        WorldValue::Bool(v)
    }
}

impl From<&str> for WorldValue {
    fn from(v: &str) -> Self {
        WorldValue::String(v.to_string())
    }
}

impl From<String> for WorldValue {
    fn from(v: String) -> Self {
        WorldValue::String(v)
    }
}

/// Operators available in the comparator language (spec §3.5, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    In,
    Contains,
}

/// A condition attached to a world-state path: either a bare literal
/// (implicit equality) or an explicit `{operator, value}` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Literal(WorldValue),
    Operator {
        operator: Comparator,
        value: WorldValue,
    },
}

impl ConditionValue {
    pub fn operator(&self) -> Comparator {
        match self {
            ConditionValue::Literal(_) => Comparator::Eq,
            ConditionValue::Operator { operator, .. } => *operator,
        }
    }

    pub fn value(&self) -> &WorldValue {
        match self {
            ConditionValue::Literal(v) => v,
            ConditionValue::Operator { value, .. } => value,
        }
    }

    /// Evaluates this condition against an observed value. A caller holding
    /// `None` (path absent) should use [`Comparator::eval_absent`] instead;
    /// absence is never passed through here.
    pub fn matches(&self, actual: &WorldValue) -> bool {
        self.operator().eval(actual, self.value())
    }
}

impl Comparator {
    /// Evaluates `actual <op> expected`. Mixed numeric/non-numeric operands
    /// fail false for every operator except `Eq`/`Ne`, which fall back to
    /// structural equality.
    pub fn eval(self, actual: &WorldValue, expected: &WorldValue) -> bool {
        use Comparator::*;
        match self {
            Eq => actual == expected,
            Ne => actual != expected,
            Lt | Le | Gt | Ge => {
                if actual.is_numeric() && expected.is_numeric() {
                    let a = actual.as_float().unwrap();
                    let b = expected.as_float().unwrap();
                    match self {
                        Lt => a < b,
                        Le => a <= b,
                        Gt => a > b,
                        Ge => a >= b,
                        _ => unreachable!(),
                    }
                } else {
                    false
                }
            }
            In => match expected {
                WorldValue::List(items) => items.contains(actual),
                WorldValue::Set(items) => actual
                    .as_str()
                    .map(|s| items.iter().any(|i| i == s))
                    .unwrap_or(false),
                _ => false,
            },
            Contains => match actual {
                WorldValue::List(items) => items.contains(expected),
                WorldValue::Set(items) => expected
                    .as_str()
                    .map(|s| items.iter().any(|i| i == s))
                    .unwrap_or(false),
                WorldValue::String(s) => expected.as_str().map(|e| s.contains(e)).unwrap_or(false),
                _ => false,
            },
        }
    }

    /// An absent world-state path evaluates false for every operator,
    /// including `Ne` (spec §4.2 invariant).
    pub fn eval_absent(self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_literal_condition() {
        let cond = ConditionValue::Literal(WorldValue::Int(5));
        assert!(cond.matches(&WorldValue::Int(5)));
        assert!(!cond.matches(&WorldValue::Int(6)));
    }

    #[test]
    fn numeric_comparators_coerce_int_and_float() {
        let cond = ConditionValue::Operator {
            operator: Comparator::Lt,
            value: WorldValue::Int(10),
        };
        assert!(cond.matches(&WorldValue::Float(8.0)));
        assert!(!cond.matches(&WorldValue::Float(12.0)));
    }

    #[test]
    fn mixed_type_comparator_fails_false() {
        assert!(!Comparator::Lt.eval(&WorldValue::String("x".into()), &WorldValue::Int(1)));
    }

    #[test]
    fn in_operator_checks_set_membership() {
        let set = WorldValue::Set(vec!["a".into(), "b".into()]);
        assert!(Comparator::In.eval(&WorldValue::String("a".into()), &set));
        assert!(!Comparator::In.eval(&WorldValue::String("c".into()), &set));
    }

    #[test]
    fn contains_operator_checks_substring() {
        let haystack = WorldValue::String("raised voices".into());
        assert!(Comparator::Contains.eval(&haystack, &WorldValue::String("voices".into())));
    }

    #[test]
    fn absent_path_is_false_for_every_operator() {
        for op in [
            Comparator::Eq,
            Comparator::Ne,
            Comparator::Lt,
            Comparator::Le,
            Comparator::Gt,
            Comparator::Ge,
            Comparator::In,
            Comparator::Contains,
        ] {
            assert!(!op.eval_absent());
        }
    }

    #[test]
    fn serializes_operator_record_with_symbolic_operator() {
        let cond = ConditionValue::Operator {
            operator: Comparator::Lt,
            value: WorldValue::Int(10),
        };
        let json = serde_json::to_string(&cond).unwrap();
        assert_eq!(json, r#"{"operator":"<","value":10}"#);
    }
}
