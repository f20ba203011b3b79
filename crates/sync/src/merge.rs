//! Field-merge strategy (§3, §4.7 step 5): `overwrite`, `preserve`, `merge`.

use serde_yaml::Value;

use crate::pipeline::MergeStrategy;

/// Apply `strategy` given the `existing` value at the target key (`None` if
/// the key is absent — undefined, not just null) and the `new` value
/// produced by this sync. Returns `None` when nothing should be written
/// (a no-op `preserve` against an already-present key).
pub fn apply_merge(strategy: MergeStrategy, existing: Option<&Value>, new: &Value) -> Option<Value> {
    match strategy {
        MergeStrategy::Overwrite => Some(new.clone()),
        MergeStrategy::Preserve => match existing {
            Some(_) => None,
            None => Some(new.clone()),
        },
        MergeStrategy::Merge => match (existing, new) {
            (Some(Value::Sequence(existing_items)), Value::Sequence(new_items)) => {
                let mut merged = existing_items.clone();
                for item in new_items {
                    if !merged.contains(item) {
                        merged.push(item.clone());
                    }
                }
                Some(Value::Sequence(merged))
            }
            (None, Value::Sequence(_)) => Some(new.clone()),
            // Scalar `merge` reduces to `preserve` (§11 open-question resolution).
            (Some(_), _) => None,
            (None, _) => Some(new.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn seq(items: &[&str]) -> Value {
        Value::Sequence(items.iter().map(|s| Value::String(s.to_string())).collect())
    }

    #[test]
    fn overwrite_always_replaces() {
        let existing = Value::String("old".into());
        let new = Value::String("new".into());
        assert_eq!(apply_merge(MergeStrategy::Overwrite, Some(&existing), &new), Some(new));
    }

    #[test]
    fn overwrite_is_idempotent() {
        let value = Value::Number(8.57.into());
        let once = apply_merge(MergeStrategy::Overwrite, None, &value);
        let twice = apply_merge(MergeStrategy::Overwrite, once.as_ref(), &value);
        assert_eq!(once, twice);
    }

    #[test]
    fn preserve_is_a_no_op_when_key_exists() {
        let existing = Value::String("My Custom Title".into());
        let new = Value::String("Gloomhaven".into());
        assert_eq!(apply_merge(MergeStrategy::Preserve, Some(&existing), &new), None);
    }

    #[test]
    fn preserve_sets_when_key_absent() {
        let new = Value::String("Gloomhaven".into());
        assert_eq!(apply_merge(MergeStrategy::Preserve, None, &new), Some(new));
    }

    #[test]
    fn merge_on_arrays_is_an_ordered_union() {
        let existing = seq(&["Co-operative Game", "Hand Management"]);
        let new = seq(&["Hand Management", "Campaign / Battle Card Driven"]);
        let merged = apply_merge(MergeStrategy::Merge, Some(&existing), &new).unwrap();
        assert_eq!(
            merged,
            seq(&["Co-operative Game", "Hand Management", "Campaign / Battle Card Driven"])
        );
    }

    #[test]
    fn merge_on_scalar_behaves_as_preserve() {
        let existing = Value::Number(8.57.into());
        let new = Value::Number(9.0.into());
        assert_eq!(apply_merge(MergeStrategy::Merge, Some(&existing), &new), None);
    }
}
