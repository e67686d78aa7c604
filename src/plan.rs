//! Plan computation.
//!
//! [`diff`] compares the prior state of a resource with the proposed one
//! under the resource schema and produces the planned state together with
//! the attribute changes and whether the resource must be replaced.
//!
//! - Defaults fill unset attributes.
//! - Computed attributes the configuration leaves unset keep their prior value.
//! - Unset values are `null`, `""`, `[]` and `{}`; they all compare equal.
//! - [`DiffSuppress`] rules turn some differences into no-ops.

use serde_json::{Map, Value};

use crate::schema::{DiffSuppress, Schema};
use crate::types::{AttributeChange, PlanResult};

fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (is_unset(a), is_unset(b)) {
        (true, true) => true,
        (false, false) => a == b,
        _ => false,
    }
}

/// Whether two strings hold the same JSON document, ignoring formatting
/// and key order.
pub fn json_equal(a: &str, b: &str) -> bool {
    match (
        serde_json::from_str::<Value>(a),
        serde_json::from_str::<Value>(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn suppressed(
    rule: &DiffSuppress,
    prior: &Map<String, Value>,
    before: Option<&Value>,
    after: Option<&Value>,
) -> bool {
    match rule {
        DiffSuppress::DisplayName { fallback } => {
            is_unset(after) && !is_unset(before) && before == prior.get(*fallback)
        },
        DiffSuppress::Json => match (
            before.and_then(Value::as_str),
            after.and_then(Value::as_str),
        ) {
            (Some(before), Some(after)) => json_equal(before, after),
            _ => false,
        },
    }
}

fn set_value(value: Option<&Value>) -> Option<Value> {
    if is_unset(value) {
        None
    } else {
        value.cloned()
    }
}

fn change(path: &str, before: Option<&Value>, after: Option<&Value>) -> AttributeChange {
    AttributeChange::new(path, set_value(before), set_value(after))
}

/// Plan a create (`prior` is `None`) or an update of one resource.
pub fn diff(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.and_then(Value::as_object);
    let mut planned = proposed.as_object().cloned().unwrap_or_default();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.block.attributes {
        if is_unset(planned.get(name)) {
            if let Some(default) = &attr.default {
                planned.insert(name.clone(), default.clone());
            } else if attr.is_computed() {
                if let Some(value) = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null()) {
                    planned.insert(name.clone(), value.clone());
                }
            }
        }

        if attr.is_computed_only() {
            continue;
        }

        let after = planned.get(name).cloned();
        let Some(prior) = prior else {
            if !is_unset(after.as_ref()) {
                changes.push(change(name, None, after.as_ref()));
            }
            continue;
        };

        let before = prior.get(name);
        if values_equal(before, after.as_ref()) {
            continue;
        }
        if let Some(rule) = &attr.diff_suppress {
            if suppressed(rule, prior, before, after.as_ref()) {
                if let Some(before) = before {
                    planned.insert(name.clone(), before.clone());
                }
                continue;
            }
        }

        changes.push(change(name, before, after.as_ref()));
        requires_replace |= attr.force_new;
    }

    for (name, block) in &schema.block.blocks {
        let after = planned.get(name).cloned();
        match prior {
            None => {
                if !is_unset(after.as_ref()) {
                    changes.push(change(name, None, after.as_ref()));
                }
            },
            Some(prior) => {
                let before = prior.get(name);
                if !values_equal(before, after.as_ref()) {
                    changes.push(change(name, before, after.as_ref()));
                    requires_replace |= block.force_new;
                }
            },
        }
    }

    PlanResult::new(Value::Object(planned), changes, requires_replace)
}

/// Plan the destruction of a resource.
pub fn destroy(prior: &Value) -> PlanResult {
    let changes = prior
        .get("id")
        .filter(|id| !is_unset(Some(*id)))
        .map(|id| vec![AttributeChange::removed("id", id.clone())])
        .unwrap_or_default();
    PlanResult::new(Value::Null, changes, false)
}
