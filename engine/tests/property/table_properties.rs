use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use tabflow::transform::aggregate::{self, drop_duplicates};
use tabflow::transform::projection::project;
use tabflow::transform::sort::sort;
use tabflow::{AggregateFunction, AggregateSpec, SortSpec, Table};

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        (-50i64..50).prop_map(|i| json!(i)),
        "[a-c]{0,2}".prop_map(Value::String),
    ]
}

fn table() -> impl Strategy<Value = Table> {
    prop::collection::vec(prop::collection::vec(cell(), 3), 0..25)
        .prop_map(|rows| Table::new(["a", "b", "c"], rows).unwrap())
}

fn cols(c: &[&str]) -> Vec<String> {
    c.iter().map(|s| s.to_string()).collect()
}

proptest! {
    #[test]
    fn projection_on_all_columns_is_identity(t in table()) {
        let all = t.columns().to_vec();
        prop_assert_eq!(project(t.clone(), Some(all.as_slice())).unwrap(), t);
    }

    #[test]
    fn sort_is_idempotent(t in table()) {
        let spec = SortSpec { ascending: cols(&["a"]), descending: cols(&["b"]) };
        let once = sort(t, Some(&spec)).unwrap();
        let twice = sort(once.clone(), Some(&spec)).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sort_keeps_every_row(t in table()) {
        let spec = SortSpec { ascending: cols(&["c"]), descending: vec![] };
        let sorted = sort(t.clone(), Some(&spec)).unwrap();

        let mut before: Vec<String> = t.rows().iter().map(|r| Value::Array(r.clone()).to_string()).collect();
        let mut after: Vec<String> = sorted.rows().iter().map(|r| Value::Array(r.clone()).to_string()).collect();
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn drop_duplicates_leaves_distinct_rows(t in table()) {
        let deduped = drop_duplicates(t.clone());
        let distinct: HashSet<String> = deduped.rows().iter().map(|r| Value::Array(r.clone()).to_string()).collect();
        prop_assert_eq!(distinct.len(), deduped.len());

        let original: HashSet<String> = t.rows().iter().map(|r| Value::Array(r.clone()).to_string()).collect();
        prop_assert_eq!(original, distinct);
    }

    #[test]
    fn grouped_sum_matches_per_group_total(t in table()) {
        let spec = AggregateSpec::new(AggregateFunction::Sum, &["b"], "total").grouped_by(&["a"]);
        let result = aggregate::apply(t.clone(), &[spec], None).unwrap();

        for row in result.rows() {
            let expected: i64 = t
                .rows()
                .iter()
                .filter(|r| r[0] == row[0])
                .filter_map(|r| r[1].as_i64())
                .sum();
            prop_assert_eq!(&row[3], &json!(expected));
        }
    }
}
