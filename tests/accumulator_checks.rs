use manifix::accumulate::CounterexampleAccumulator;
use manifix::oracle::Violation;

use serde_json::json;

fn case(id: &str, message: &str, inputs: serde_json::Value) -> Violation {
    Violation::new(id, message, vec!["store".to_owned(), "x".to_owned()])
        .with_evidence(json!({ "inputs": inputs, "expected": 2 }))
}

#[test]
fn duplicate_content_is_rejected_regardless_of_wording() {
    let mut acc = CounterexampleAccumulator::new();

    assert!(acc.add(case("o.A", "first wording", json!([1])), 0));
    // Same inputs/expected/path, different id and message.
    assert!(!acc.add(case("o.B", "second wording", json!([1])), 1));
    assert_eq!(acc.count(), 1);
}

#[test]
fn distinct_content_is_kept() {
    let mut acc = CounterexampleAccumulator::new();

    assert!(acc.add(case("o.A", "m", json!([1])), 0));
    assert!(acc.add(case("o.A", "m", json!([2])), 0));

    let mut other_path = case("o.A", "m", json!([1]));
    other_path.path = vec!["store".to_owned(), "y".to_owned()];
    assert!(acc.add(other_path, 0));

    assert_eq!(acc.count(), 3);
}

#[test]
fn satisfied_records_are_kept_but_hidden_from_get_all() {
    let mut acc = CounterexampleAccumulator::new();
    let a = case("o.A", "m", json!([1]));
    let b = case("o.B", "m", json!([2]));
    acc.add(a.clone(), 0);
    acc.add(b.clone(), 0);

    assert!(acc.mark_satisfied(&a));
    assert_eq!(acc.count(), 2);
    assert_eq!(acc.count_unsatisfied(), 1);

    let unsatisfied = acc.get_all();
    assert_eq!(unsatisfied.len(), 1);
    assert_eq!(unsatisfied[0].id, "o.B");
}

#[test]
fn mark_satisfied_without_match_reports_failure() {
    let mut acc = CounterexampleAccumulator::new();
    acc.add(case("o.A", "m", json!([1])), 0);

    assert!(!acc.mark_satisfied(&case("o.A", "m", json!([99]))));
}

#[test]
fn get_all_preserves_insertion_order() {
    let mut acc = CounterexampleAccumulator::new();
    for i in 0..4 {
        acc.add(case("o.A", "m", json!([i])), i as usize);
    }
    acc.mark_satisfied(&case("o.A", "m", json!([2])));

    let inputs: Vec<&serde_json::Value> = acc
        .get_all()
        .iter()
        .map(|v| &v.evidence.as_ref().unwrap()["inputs"][0])
        .collect();
    assert_eq!(inputs, vec![&json!(0), &json!(1), &json!(3)]);
}

#[test]
fn add_all_counts_only_new_records() {
    let mut acc = CounterexampleAccumulator::new();
    acc.add(case("o.A", "m", json!([1])), 0);

    let added = acc.add_all(
        vec![
            case("o.A", "m", json!([1])),
            case("o.A", "m", json!([2])),
            case("o.A", "m", json!([3])),
        ],
        1,
    );
    assert_eq!(added, 2);
    assert_eq!(acc.count(), 3);

    // First-seen attempt number is retained for the duplicate.
    assert_eq!(acc.records()[0].iteration, 0);
}

#[test]
fn clear_resets_both_records_and_dedup_state() {
    let mut acc = CounterexampleAccumulator::new();
    acc.add(case("o.A", "m", json!([1])), 0);
    acc.clear();

    assert_eq!(acc.count(), 0);
    assert!(acc.add(case("o.A", "m", json!([1])), 0));
}
