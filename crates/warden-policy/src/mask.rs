//! Field-mask merging.
//!
//! Masks only ever grow: merging is a deep union. At every key present on
//! either side:
//!
//! - `All` on either side wins (widest grant).
//! - Nested masks on both sides are merged recursively.
//! - A key present on one side only is copied as-is.
//!
//! There is no intersection or subtraction; denial is expressed by deny
//! rules blocking the whole decision, never by removing fields.

use warden_contracts::mask::{FieldMask, MaskNode};

/// Merge two optional masks without mutating either.
///
/// `None` means "no constraint from this side": merging with `None` returns a
/// clone of the other side, and two `None`s stay `None`.
pub fn merge_masks(base: Option<&FieldMask>, next: Option<&FieldMask>) -> Option<FieldMask> {
    match (base, next) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(base), Some(next)) => Some(union(base, next)),
    }
}

/// Deep union of two masks.
///
/// A `true` leaf meeting a nested mask yields `true`, whichever side it is on.
/// The alternative reading, where a nested mask against a `true` leaf is kept
/// as-is, would narrow an existing grant; the union reading keeps the wider one.
pub fn union(base: &FieldMask, next: &FieldMask) -> FieldMask {
    let mut merged = base.clone();
    for (key, incoming) in next.iter() {
        let node = match (merged.get(key), incoming) {
            (None, node) => node.clone(),
            // `true` on either side wins over a nested mask.
            (Some(MaskNode::All), _) | (Some(_), MaskNode::All) => MaskNode::All,
            (Some(MaskNode::Nested(left)), MaskNode::Nested(right)) => {
                MaskNode::Nested(union(left, right))
            }
        };
        merged.insert(key.clone(), node);
    }
    merged
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn mask(value: serde_json::Value) -> FieldMask {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_none_with_none_is_none() {
        assert_eq!(merge_masks(None, None), None);
    }

    #[test]
    fn test_none_side_returns_clone_of_other() {
        let m = mask(json!({ "title": true }));
        assert_eq!(merge_masks(None, Some(&m)), Some(m.clone()));
        assert_eq!(merge_masks(Some(&m), None), Some(m));
    }

    #[test]
    fn test_disjoint_keys_are_unioned() {
        let merged = union(&mask(json!({ "title": true })), &mask(json!({ "body": true })));
        assert_eq!(merged, mask(json!({ "title": true, "body": true })));
    }

    #[test]
    fn test_all_wins_over_nested_on_either_side() {
        let whole = mask(json!({ "author": true }));
        let part = mask(json!({ "author": { "name": true } }));
        assert_eq!(union(&whole, &part), whole);
        assert_eq!(union(&part, &whole), whole);
    }

    #[test]
    fn test_nested_masks_merge_recursively() {
        let left = mask(json!({ "author": { "name": true, "address": { "city": true } } }));
        let right = mask(json!({ "author": { "email": true, "address": { "zip": true } } }));
        assert_eq!(
            union(&left, &right),
            mask(json!({
                "author": { "name": true, "email": true, "address": { "city": true, "zip": true } }
            }))
        );
    }

    #[test]
    fn test_nested_mask_against_absent_key_is_kept_as_is() {
        let merged = union(
            &mask(json!({ "title": true })),
            &mask(json!({ "author": { "name": true } })),
        );
        assert_eq!(merged.get("author"), Some(&MaskNode::Nested(mask(json!({ "name": true })))));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let m = mask(json!({ "title": true, "author": { "name": true, "bio": { "short": true } } }));
        assert_eq!(union(&m, &m), m);
        assert_eq!(merge_masks(Some(&m), Some(&m)), Some(m));
    }

    #[test]
    fn test_merge_does_not_mutate_inputs() {
        let left = mask(json!({ "author": { "name": true } }));
        let right = mask(json!({ "author": { "email": true } }));
        let left_before = left.clone();
        let right_before = right.clone();
        let _ = merge_masks(Some(&left), Some(&right));
        assert_eq!(left, left_before);
        assert_eq!(right, right_before);
    }
}
