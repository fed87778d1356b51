//! Row-level scopes and their conjunctive merge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use gatehouse_core::{PolicyError, PolicyResult};

/// Conjunctive filter description (`{field: constraint, ...}`).
///
/// Opaque to the engine beyond being mergeable; the consumer translates it
/// into its own query language.
pub type FilterExpr = Map<String, Value>;

/// Operator key used when two scopes constrain the same field differently.
pub const AND_OPERATOR: &str = "$and";

/// A composable filter narrowing which rows are visible after an ALLOW.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "where", default)]
    pub filter: FilterExpr,
}

impl Scope {
    pub fn new(filter: FilterExpr) -> Self {
        Self { filter }
    }

    /// Single-field scope: `{where: {field: value}}`.
    pub fn field(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut filter = FilterExpr::new();
        filter.insert(field.into(), value.into());
        Self { filter }
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
    }

    /// Conjunction of both scopes.
    pub fn merge(&self, other: &Scope) -> Scope {
        Scope::new(merge_where(&self.filter, &other.filter))
    }
}

impl TryFrom<Value> for Scope {
    type Error = PolicyError;

    /// Accepts a bare filter object (`{"id": 1}`).
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(filter) => Ok(Scope::new(filter)),
            other => Err(PolicyError::scope(format!(
                "scope filter must be a JSON object, got {other}"
            ))),
        }
    }
}

impl From<FilterExpr> for Scope {
    fn from(value: FilterExpr) -> Self {
        Scope::new(value)
    }
}

/// Combine two filter expressions into one satisfied only when both are.
///
/// Disjoint fields are a shallow union. A field present in both with equal
/// values is kept once; with different values it becomes
/// `{"$and": [left, right]}` (existing `$and` operands are flattened, duplicates
/// dropped), so neither constraint is lost.
pub fn merge_where(a: &FilterExpr, b: &FilterExpr) -> FilterExpr {
    let mut merged = a.clone();

    for (field, value) in b {
        match merged.get_mut(field) {
            None => {
                merged.insert(field.clone(), value.clone());
            }
            Some(existing) if *existing == *value => {}
            Some(existing) => {
                let left = existing.take();
                *existing = conjoin(left, value.clone());
            }
        }
    }

    merged
}

/// Fallible variant for scopes supplied as raw JSON.
pub fn merge_where_values(a: Value, b: Value) -> PolicyResult<FilterExpr> {
    let a = Scope::try_from(a)?;
    let b = Scope::try_from(b)?;
    Ok(merge_where(&a.filter, &b.filter))
}

fn conjoin(left: Value, right: Value) -> Value {
    let mut operands = Vec::new();
    push_operand(&mut operands, left);
    push_operand(&mut operands, right);

    let mut expr = Map::new();
    expr.insert(AND_OPERATOR.to_string(), Value::Array(operands));
    Value::Object(expr)
}

fn push_operand(operands: &mut Vec<Value>, value: Value) {
    match value {
        Value::Object(mut obj) if obj.len() == 1 && obj.contains_key(AND_OPERATOR) => {
            match obj.remove(AND_OPERATOR) {
                Some(Value::Array(inner)) => {
                    for v in inner {
                        push_operand(operands, v);
                    }
                }
                Some(other) => {
                    // Not a well-formed `$and`; keep it as an opaque operand.
                    obj.insert(AND_OPERATOR.to_string(), other);
                    push_unique(operands, Value::Object(obj));
                }
                None => {}
            }
        }
        other => push_unique(operands, other),
    }
}

fn push_unique(operands: &mut Vec<Value>, value: Value) {
    if !operands.contains(&value) {
        operands.push(value);
    }
}
