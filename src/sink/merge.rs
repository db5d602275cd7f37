//! Record reconciliation against the insertion node.
//!
//! Records are appended to a sequence (list mode) or inserted into a mapping
//! under the value of their key property (keyed mode). `replace_records`
//! clears the node first. An optional sort property orders the batch
//! ascending before anything is written; ties keep their input order.

use serde_yaml::{Mapping, Value};
use snafu::prelude::*;
use std::cmp::Ordering;

use crate::config::{Config, OverwriteBehavior};
use crate::document::NodeShape;
use crate::emit;
use crate::error::{EmptyBatchSnafu, MergeError, MissingPropertySnafu, ShapeMismatchSnafu};
use crate::metrics::events::RecordsMerged;

/// One unit of input data.
pub type Record = Mapping;

/// Strategy for merging records into the insertion node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Append records to a sequence.
    List,
    /// Insert records into a mapping under their key property.
    Keyed,
}

impl ReconcileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileMode::List => "list",
            ReconcileMode::Keyed => "keyed",
        }
    }

    /// The node shape this mode writes into.
    pub fn expected_shape(&self) -> NodeShape {
        match self {
            ReconcileMode::List => NodeShape::Sequence,
            ReconcileMode::Keyed => NodeShape::Mapping,
        }
    }
}

/// Overwrite and reconciliation settings for a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePolicy {
    pub behavior: OverwriteBehavior,
    pub sort_property: Option<String>,
    pub key_property: Option<String>,
}

impl MergePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            behavior: config.overwrite_behavior,
            sort_property: config.record_sort_property_name.clone(),
            key_property: config.record_key_property_name.clone(),
        }
    }

    pub fn mode(&self) -> ReconcileMode {
        if self.key_property.is_some() {
            ReconcileMode::Keyed
        } else {
            ReconcileMode::List
        }
    }

    /// Whether the insertion node is emptied before records are added.
    ///
    /// `replace_file` already starts from a fresh template, so only
    /// `replace_records` clears at the node level.
    pub fn clears_node(&self) -> bool {
        self.behavior == OverwriteBehavior::ReplaceRecords
    }

    /// This policy with replacement turned into appending.
    pub fn appending(&self) -> Self {
        Self {
            behavior: OverwriteBehavior::AppendRecords,
            ..self.clone()
        }
    }
}

/// Merge `records` into `node` according to `policy`.
///
/// Returns the number of records merged. On error the node may be partially
/// modified; callers discard the document in that case.
pub fn merge(
    node: &mut Value,
    records: Vec<Record>,
    policy: &MergePolicy,
) -> Result<usize, MergeError> {
    ensure!(!records.is_empty(), EmptyBatchSnafu);

    let records = match &policy.sort_property {
        Some(property) => sort_records(records, property)?,
        None => records,
    };
    let count = records.len();
    let mode = policy.mode();

    match (mode, node) {
        (ReconcileMode::Keyed, Value::Mapping(map)) => {
            // Guarded by `mode()`
            let property = policy.key_property.as_deref().unwrap_or_default();
            let entries = key_records(records, property)?;
            if policy.clears_node() {
                map.clear();
            }
            for (key, record) in entries {
                map.insert(key, Value::Mapping(record));
            }
        }
        (ReconcileMode::List, Value::Sequence(seq)) => {
            if policy.clears_node() {
                seq.clear();
            }
            seq.extend(records.into_iter().map(Value::Mapping));
        }
        (mode, node) => {
            return ShapeMismatchSnafu {
                expected: mode.expected_shape(),
                found: NodeShape::of(node),
            }
            .fail();
        }
    }

    emit!(RecordsMerged {
        count: count as u64,
        mode: mode.as_str(),
    });
    Ok(count)
}

/// Stable ascending sort by a property every record must carry.
fn sort_records(records: Vec<Record>, property: &str) -> Result<Vec<Record>, MergeError> {
    let mut keyed = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let value = record
                .get(property)
                .cloned()
                .context(MissingPropertySnafu { property, index })?;
            Ok((value, record))
        })
        .collect::<Result<Vec<_>, MergeError>>()?;

    keyed.sort_by(|(a, _), (b, _)| compare_values(a, b));
    Ok(keyed.into_iter().map(|(_, record)| record).collect())
}

/// Split every record into its key and the remaining properties.
///
/// Fails before anything is returned if any record lacks the key.
fn key_records(records: Vec<Record>, property: &str) -> Result<Vec<(Value, Record)>, MergeError> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            let key = record
                .shift_remove(property)
                .context(MissingPropertySnafu { property, index })?;
            Ok((key, record))
        })
        .collect()
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Sequence(_) => 4,
        Value::Mapping(_) => 5,
        Value::Tagged(tagged) => type_rank(&tagged.value),
    }
}

/// Total order over property values used for sorting.
///
/// Values of different types order null < bool < number < string <
/// sequence < mapping. Mappings compare equal to each other.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Tagged(a), b) => compare_values(&a.value, b),
        (a, Value::Tagged(b)) => compare_values(a, &b.value),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                a.cmp(&b)
            } else if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
                a.cmp(&b)
            } else {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Sequence(a), Value::Sequence(b)) => a
            .iter()
            .zip(b)
            .map(|(a, b)| compare_values(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (a, b) => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(yaml: &str) -> Record {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn policy(behavior: OverwriteBehavior) -> MergePolicy {
        MergePolicy {
            behavior,
            ..MergePolicy::default()
        }
    }

    fn keyed(behavior: OverwriteBehavior, key: &str) -> MergePolicy {
        MergePolicy {
            behavior,
            key_property: Some(key.to_string()),
            ..MergePolicy::default()
        }
    }

    #[test]
    fn test_append_keeps_prior_elements_in_order() {
        let mut node = doc("[{n: 1}, {n: 2}]");
        let records = vec![record("{n: 3}"), record("{n: 4}"), record("{n: 5}")];

        let merged = merge(&mut node, records, &policy(OverwriteBehavior::AppendRecords)).unwrap();

        assert_eq!(merged, 3);
        assert_eq!(node, doc("[{n: 1}, {n: 2}, {n: 3}, {n: 4}, {n: 5}]"));
    }

    #[test]
    fn test_replace_records_clears_sequence() {
        let mut node = doc("[{n: 1}, {n: 2}]");
        let records = vec![record("{n: 3}")];

        merge(&mut node, records, &policy(OverwriteBehavior::ReplaceRecords)).unwrap();

        assert_eq!(node, doc("[{n: 3}]"));
    }

    #[test]
    fn test_replace_file_does_not_clear_node() {
        let mut node = doc("[{n: 0}]");
        merge(&mut node, vec![record("{n: 1}")], &policy(OverwriteBehavior::ReplaceFile)).unwrap();
        assert_eq!(node, doc("[{n: 0}, {n: 1}]"));
    }

    #[test]
    fn test_keyed_insert_pops_key() {
        let mut node = doc("{}");
        let records = vec![record("{id: x, v: 1}"), record("{id: y, v: 2}")];

        merge(&mut node, records, &keyed(OverwriteBehavior::AppendRecords, "id")).unwrap();

        assert_eq!(node, doc("{x: {v: 1}, y: {v: 2}}"));
    }

    #[test]
    fn test_keyed_same_key_overwrites() {
        let mut node = doc("{}");
        let policy = keyed(OverwriteBehavior::AppendRecords, "id");

        merge(&mut node, vec![record("{id: a, v: 1}")], &policy).unwrap();
        merge(&mut node, vec![record("{id: a, v: 2}")], &policy).unwrap();

        assert_eq!(node, doc("{a: {v: 2}}"));
    }

    #[test]
    fn test_keyed_duplicate_within_batch_last_wins() {
        let mut node = doc("{}");
        let records = vec![record("{id: a, v: 1}"), record("{id: a, v: 2}")];
        merge(&mut node, records, &keyed(OverwriteBehavior::AppendRecords, "id")).unwrap();
        assert_eq!(node, doc("{a: {v: 2}}"));
    }

    #[test]
    fn test_keyed_replace_records_clears_mapping() {
        let mut node = doc("{old: {v: 0}}");
        let records = vec![record("{id: new, v: 1}")];

        merge(&mut node, records, &keyed(OverwriteBehavior::ReplaceRecords, "id")).unwrap();

        assert_eq!(node, doc("{new: {v: 1}}"));
    }

    #[test]
    fn test_keyed_missing_key_fails_without_mutation() {
        let mut node = doc("{old: {v: 0}}");
        let records = vec![record("{id: a}"), record("{v: 1}")];

        let err = merge(&mut node, records, &keyed(OverwriteBehavior::ReplaceRecords, "id"))
            .unwrap_err();

        assert!(matches!(err, MergeError::MissingProperty { index: 1, .. }));
        assert_eq!(node, doc("{old: {v: 0}}"));
    }

    #[test]
    fn test_sort_orders_ascending_and_is_stable() {
        let mut node = doc("[]");
        let records = vec![
            record("{rank: 3, tag: a}"),
            record("{rank: 1, tag: b}"),
            record("{rank: 2, tag: c}"),
            record("{rank: 1, tag: d}"),
        ];
        let policy = MergePolicy {
            sort_property: Some("rank".to_string()),
            ..MergePolicy::default()
        };

        merge(&mut node, records, &policy).unwrap();

        let tags: Vec<_> = node
            .as_sequence()
            .unwrap()
            .iter()
            .map(|r| r["tag"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(tags, ["b", "d", "c", "a"]);
    }

    #[test]
    fn test_sort_before_keying() {
        let mut node = doc("{}");
        let records = vec![record("{id: z, rank: 2}"), record("{id: a, rank: 1}")];
        let policy = MergePolicy {
            sort_property: Some("rank".to_string()),
            key_property: Some("id".to_string()),
            ..MergePolicy::default()
        };

        merge(&mut node, records, &policy).unwrap();

        let keys: Vec<_> = node
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, ["a", "z"]);
    }

    #[test]
    fn test_sort_missing_property_fails() {
        let mut node = doc("[]");
        let records = vec![record("{rank: 1}"), record("{other: 2}")];
        let policy = MergePolicy {
            sort_property: Some("rank".to_string()),
            ..MergePolicy::default()
        };

        let err = merge(&mut node, records, &policy).unwrap_err();

        assert!(matches!(
            err,
            MergeError::MissingProperty { ref property, index: 1 } if property == "rank"
        ));
    }

    #[test]
    fn test_empty_batch_fails() {
        let mut node = doc("[]");
        let err = merge(&mut node, Vec::new(), &MergePolicy::default()).unwrap_err();
        assert!(matches!(err, MergeError::EmptyBatch));
    }

    #[test]
    fn test_keyed_mode_rejects_sequence() {
        let mut node = doc("[]");
        let err = merge(
            &mut node,
            vec![record("{id: a}")],
            &keyed(OverwriteBehavior::AppendRecords, "id"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MergeError::ShapeMismatch {
                expected: NodeShape::Mapping,
                found: NodeShape::Sequence
            }
        ));
    }

    #[test]
    fn test_list_mode_rejects_mapping() {
        let mut node = doc("{}");
        let err = merge(&mut node, vec![record("{a: 1}")], &MergePolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            MergeError::ShapeMismatch {
                expected: NodeShape::Sequence,
                found: NodeShape::Mapping
            }
        ));
    }

    #[test]
    fn test_scalar_and_null_nodes_are_never_coerced() {
        for yaml in ["3", "text", "~"] {
            let mut node = doc(yaml);
            let before = node.clone();
            let err = merge(&mut node, vec![record("{a: 1}")], &MergePolicy::default());
            assert!(matches!(err, Err(MergeError::ShapeMismatch { .. })));
            assert_eq!(node, before);
        }
    }

    #[test]
    fn test_compare_values_mixed_types() {
        let values = [
            Value::from("b"),
            Value::from(2.5),
            Value::Null,
            Value::from(true),
            Value::from(-1),
            Value::from("a"),
        ];
        let mut sorted = values.to_vec();
        sorted.sort_by(compare_values);
        assert_eq!(
            sorted,
            vec![
                Value::Null,
                Value::from(true),
                Value::from(-1),
                Value::from(2.5),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_compare_values_large_unsigned() {
        let big = Value::from(u64::MAX);
        let small = Value::from(1u64);
        assert_eq!(compare_values(&small, &big), Ordering::Less);
        assert_eq!(compare_values(&Value::from(-5), &big), Ordering::Less);
    }
}
