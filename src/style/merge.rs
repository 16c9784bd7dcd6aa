//! Property merging.
//!
//! Merging two values for the same property is not always "later wins":
//! margins pick the larger measure during inheritance, layout hints union,
//! font sizes compose multiplicatively. Each property maps to one rule, and
//! the rule can differ between the two merge contexts.

use crate::kfx::symbol::Sym;
use crate::kfx::value::{Dimension, Value, ValueMap};

/// Where a merge happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeContext {
    /// Inheritance and descendant-selector application.
    Inline,
    /// Class declarations applied over tag defaults; plain CSS cascade
    /// order wins for margins here.
    ClassOverride,
}

/// The merge rule applied to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    Override,
    OverrideMaximum,
    Cumulative,
    Relative,
    BaselineStyle,
    BackgroundRepeat,
    HorizontalPosition,
    KeepLinesTogether,
    LayoutHints,
}

/// Select the rule for a property in a context.
pub fn rule_for(property: Sym, context: MergeContext) -> MergeRule {
    match property {
        p if p.is_margin() => match context {
            MergeContext::Inline => MergeRule::OverrideMaximum,
            MergeContext::ClassOverride => MergeRule::Override,
        },
        Sym::FontSize => MergeRule::Relative,
        Sym::BaselineStyle => MergeRule::BaselineStyle,
        Sym::BackgroundRepeat => MergeRule::BackgroundRepeat,
        Sym::Float => MergeRule::HorizontalPosition,
        Sym::KeepLinesTogether => MergeRule::KeepLinesTogether,
        Sym::LayoutHints => MergeRule::LayoutHints,
        _ => MergeRule::Override,
    }
}

/// Merge one incoming value over an optional existing one.
pub fn merge_value(rule: MergeRule, existing: Option<&Value>, incoming: &Value) -> Value {
    let Some(existing) = existing else {
        return normalize_incoming(rule, incoming);
    };

    match rule {
        MergeRule::Override => incoming.clone(),
        MergeRule::OverrideMaximum => merge_maximum(existing, incoming),
        MergeRule::Cumulative => merge_cumulative(existing, incoming),
        MergeRule::Relative => merge_relative(existing, incoming),
        MergeRule::BaselineStyle => merge_baseline(existing, incoming),
        MergeRule::BackgroundRepeat => merge_background_repeat(existing, incoming),
        MergeRule::HorizontalPosition => merge_horizontal(existing, incoming),
        MergeRule::KeepLinesTogether => merge_keep_lines(existing, incoming),
        MergeRule::LayoutHints => merge_list_union(existing, incoming),
    }
}

/// Merge a property into a map under the context's rule.
pub fn merge_property(target: &mut ValueMap, property: Sym, incoming: &Value, context: MergeContext) {
    let rule = rule_for(property, context);
    let merged = merge_value(rule, target.get(property), incoming);
    target.set(property, merged);
}

/// Merge every property of `incoming` into `target`.
pub fn merge_map(target: &mut ValueMap, incoming: &ValueMap, context: MergeContext) {
    for (property, value) in incoming.iter() {
        merge_property(target, property, value, context);
    }
}

/// Sum two same-unit measures; `None` when units differ.
pub fn add_dimensions(a: &Dimension, b: &Dimension) -> Option<Dimension> {
    if a.unit == b.unit {
        Some(Dimension::new(a.value + b.value, a.unit))
    } else {
        None
    }
}

fn normalize_incoming(rule: MergeRule, incoming: &Value) -> Value {
    match (rule, incoming) {
        // A bare boolean lifts to the struct form so later struct merges
        // have a consistent shape.
        (MergeRule::KeepLinesTogether, Value::Bool(true)) => {
            let mut fields = ValueMap::new();
            fields.set(Sym::KeepLinesTogether, Value::Bool(true));
            Value::Struct(fields)
        }
        _ => incoming.clone(),
    }
}

fn merge_maximum(existing: &Value, incoming: &Value) -> Value {
    match (existing.as_dimension(), incoming.as_dimension()) {
        (Some(a), Some(b)) if a.unit == b.unit => {
            if b.value.abs() > a.value.abs() {
                incoming.clone()
            } else {
                existing.clone()
            }
        }
        _ => incoming.clone(),
    }
}

fn merge_cumulative(existing: &Value, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Value::Dimension(a), Value::Dimension(b)) => match add_dimensions(a, b) {
            Some(sum) => Value::Dimension(sum),
            None => incoming.clone(),
        },
        (Value::List(_), Value::List(_)) => merge_list_union(existing, incoming),
        (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
        _ => incoming.clone(),
    }
}

fn merge_relative(existing: &Value, incoming: &Value) -> Value {
    let (Some(a), Some(b)) = (existing.as_dimension(), incoming.as_dimension()) else {
        return incoming.clone();
    };
    match b.unit {
        // A percentage scales whatever is already there.
        Sym::Percent => Value::Dimension(Dimension::new(
            a.value * b.value / rust_decimal::Decimal::from(100),
            a.unit,
        )),
        // em against em composes multiplicatively.
        Sym::Em if a.unit == Sym::Em => {
            Value::Dimension(Dimension::new(a.value * b.value, Sym::Em))
        }
        _ => incoming.clone(),
    }
}

fn merge_baseline(existing: &Value, incoming: &Value) -> Value {
    // Prefer whichever is not `normal`.
    if incoming.as_symbol() == Some(Sym::Normal) && existing.as_symbol() != Some(Sym::Normal) {
        existing.clone()
    } else {
        incoming.clone()
    }
}

fn repeat_rank(value: &Value) -> u8 {
    match value.as_symbol() {
        Some(Sym::Repeat) => 2,
        Some(Sym::RepeatX) | Some(Sym::RepeatY) => 1,
        Some(Sym::NoRepeat) => 0,
        _ => 0,
    }
}

fn merge_background_repeat(existing: &Value, incoming: &Value) -> Value {
    if repeat_rank(incoming) >= repeat_rank(existing) {
        incoming.clone()
    } else {
        existing.clone()
    }
}

fn merge_horizontal(existing: &Value, incoming: &Value) -> Value {
    if existing == incoming {
        existing.clone()
    } else {
        Value::Symbol(Sym::Both)
    }
}

fn merge_keep_lines(existing: &Value, incoming: &Value) -> Value {
    let mut fields = match existing {
        Value::Struct(map) => map.clone(),
        Value::Bool(true) => {
            let mut map = ValueMap::new();
            map.set(Sym::KeepLinesTogether, Value::Bool(true));
            map
        }
        _ => ValueMap::new(),
    };
    match incoming {
        Value::Struct(map) => {
            for (key, value) in map.iter() {
                fields.set(key, value.clone());
            }
        }
        Value::Bool(true) => fields.set(Sym::KeepLinesTogether, Value::Bool(true)),
        _ => {}
    }
    Value::Struct(fields)
}

fn merge_list_union(existing: &Value, incoming: &Value) -> Value {
    let mut items: Vec<Value> = existing.as_list().map(<[Value]>::to_vec).unwrap_or_default();
    let incoming_items: Vec<Value> = match incoming.as_list() {
        Some(list) => list.to_vec(),
        None => vec![incoming.clone()],
    };
    for item in incoming_items {
        if !items.contains(&item) {
            items.push(item);
        }
    }
    Value::List(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dim(v: &str, unit: Sym) -> Value {
        Value::dimension(Decimal::from_str(v).unwrap(), unit)
    }

    #[test]
    fn test_margin_rule_depends_on_context() {
        assert_eq!(
            rule_for(Sym::MarginTop, MergeContext::Inline),
            MergeRule::OverrideMaximum
        );
        assert_eq!(
            rule_for(Sym::MarginTop, MergeContext::ClassOverride),
            MergeRule::Override
        );
    }

    #[test]
    fn test_override_maximum_same_unit() {
        let merged = merge_value(
            MergeRule::OverrideMaximum,
            Some(&dim("2", Sym::Lh)),
            &dim("1", Sym::Lh),
        );
        assert_eq!(merged, dim("2", Sym::Lh));

        // Different units fall back to override.
        let merged = merge_value(
            MergeRule::OverrideMaximum,
            Some(&dim("2", Sym::Lh)),
            &dim("1", Sym::Em),
        );
        assert_eq!(merged, dim("1", Sym::Em));
    }

    #[test]
    fn test_cumulative_adds_same_unit() {
        let merged = merge_value(
            MergeRule::Cumulative,
            Some(&dim("1.5", Sym::Em)),
            &dim("0.5", Sym::Em),
        );
        assert_eq!(merged, dim("2.0", Sym::Em));
    }

    #[test]
    fn test_relative_percent_scales() {
        let merged = merge_value(
            MergeRule::Relative,
            Some(&dim("2", Sym::Em)),
            &dim("75", Sym::Percent),
        );
        assert_eq!(merged, dim("1.5", Sym::Em));
    }

    #[test]
    fn test_relative_em_multiplies() {
        let merged = merge_value(
            MergeRule::Relative,
            Some(&dim("2", Sym::Em)),
            &dim("0.75", Sym::Em),
        );
        assert_eq!(merged, dim("1.5", Sym::Em));
    }

    #[test]
    fn test_baseline_prefers_non_normal() {
        let merged = merge_value(
            MergeRule::BaselineStyle,
            Some(&Value::Symbol(Sym::Subscript)),
            &Value::Symbol(Sym::Normal),
        );
        assert_eq!(merged, Value::Symbol(Sym::Subscript));

        let merged = merge_value(
            MergeRule::BaselineStyle,
            Some(&Value::Symbol(Sym::Normal)),
            &Value::Symbol(Sym::Superscript),
        );
        assert_eq!(merged, Value::Symbol(Sym::Superscript));
    }

    #[test]
    fn test_background_repeat_keeps_higher_rank() {
        let merged = merge_value(
            MergeRule::BackgroundRepeat,
            Some(&Value::Symbol(Sym::Repeat)),
            &Value::Symbol(Sym::NoRepeat),
        );
        assert_eq!(merged, Value::Symbol(Sym::Repeat));
    }

    #[test]
    fn test_horizontal_position_conflict_becomes_both() {
        let merged = merge_value(
            MergeRule::HorizontalPosition,
            Some(&Value::Symbol(Sym::Left)),
            &Value::Symbol(Sym::Right),
        );
        assert_eq!(merged, Value::Symbol(Sym::Both));
    }

    #[test]
    fn test_keep_lines_bool_lifts_to_struct() {
        let merged = merge_value(MergeRule::KeepLinesTogether, None, &Value::Bool(true));
        let map = merged.as_struct().unwrap();
        assert_eq!(map.get(Sym::KeepLinesTogether), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_layout_hints_union_preserves_order() {
        let merged = merge_value(
            MergeRule::LayoutHints,
            Some(&Value::List(vec![Value::Symbol(Sym::TreatAsTitle)])),
            &Value::List(vec![
                Value::Symbol(Sym::TreatAsTitle),
                Value::Symbol(Sym::Avoid),
            ]),
        );
        assert_eq!(
            merged,
            Value::List(vec![
                Value::Symbol(Sym::TreatAsTitle),
                Value::Symbol(Sym::Avoid)
            ])
        );
    }
}
