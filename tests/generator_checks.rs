mod common;

use common::{hole_space, ints, strs};

use manifix::constraint::Constraint;
use manifix::generate::CandidateGenerator;
use manifix::template::CandidateAssignment;
use manifix::value::Value;

fn all(generator: CandidateGenerator) -> Vec<CandidateAssignment> {
    generator.collect()
}

#[test]
fn full_product_no_duplicates_deterministic() {
    let holes = hole_space(&[
        ("a", strs(&["x", "y"])),
        ("b", ints(&[1, 2, 3])),
    ]);

    let first = all(CandidateGenerator::new(&holes, vec![]));
    let second = all(CandidateGenerator::new(&holes, vec![]));

    assert_eq!(first.len(), 6);
    assert_eq!(first, second);

    for (i, a) in first.iter().enumerate() {
        for b in &first[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn sorted_holes_rightmost_fastest() {
    // Insertion order deliberately differs from sorted order.
    let holes = hole_space(&[
        ("b", ints(&[2, 1])),
        ("a", strs(&["y", "x"])),
    ]);

    let candidates = all(CandidateGenerator::new(&holes, vec![]));

    let expect: Vec<(&str, i64)> =
        vec![("x", 1), ("x", 2), ("y", 1), ("y", 2)];
    assert_eq!(candidates.len(), expect.len());
    for (candidate, (a, b)) in candidates.iter().zip(expect) {
        assert_eq!(candidate["a"], Value::from(a));
        assert_eq!(candidate["b"], Value::from(b));
    }
}

#[test]
fn forbidden_value_prunes_exact_share() {
    let holes = hole_space(&[
        ("a", strs(&["x", "y"])),
        ("b", ints(&[1, 2, 3])),
    ]);
    let constraints = vec![Constraint::ForbiddenValue {
        hole: "b".to_owned(),
        value: Value::from(2),
    }];

    let candidates = all(CandidateGenerator::new(&holes, constraints));

    // 6 total, 6/3 = 2 removed.
    assert_eq!(candidates.len(), 4);
    assert!(candidates.iter().all(|c| c["b"] != Value::from(2)));
}

#[test]
fn forbidden_tuple_scenario() {
    let holes = hole_space(&[
        ("env", strs(&["dev", "prod"])),
        ("replicas", ints(&[2, 3])),
    ]);
    let constraints = vec![Constraint::ForbiddenTuple {
        holes: vec!["env".to_owned(), "replicas".to_owned()],
        values: vec![Value::from("prod"), Value::from(2)],
    }];

    let candidates = all(CandidateGenerator::new(&holes, constraints));

    assert_eq!(candidates.len(), 3);
    for candidate in &candidates {
        assert!(
            !(candidate["env"] == Value::from("prod")
                && candidate["replicas"] == Value::from(2))
        );
    }
}

#[test]
fn tuple_with_unknown_hole_never_excludes() {
    let holes = hole_space(&[("x", ints(&[1, 2]))]);
    let constraints = vec![Constraint::ForbiddenTuple {
        holes: vec!["x".to_owned(), "z".to_owned()],
        values: vec![Value::from(1), Value::from(9)],
    }];

    let candidates = all(CandidateGenerator::new(&holes, constraints));
    assert_eq!(candidates.len(), 2);
}

#[test]
fn empty_hole_space_yields_nothing() {
    let holes = hole_space(&[]);
    assert_eq!(all(CandidateGenerator::new(&holes, vec![])).len(), 0);
}

#[test]
fn empty_domain_yields_nothing() {
    let holes = hole_space(&[("a", ints(&[1])), ("b", vec![])]);
    assert_eq!(all(CandidateGenerator::new(&holes, vec![])).len(), 0);
}

#[test]
fn update_constraints_restarts_from_the_top() {
    let holes = hole_space(&[("x", ints(&[1, 2, 3]))]);
    let mut generator = CandidateGenerator::new(&holes, vec![]);

    let first = generator.next().unwrap();
    assert_eq!(first["x"], Value::from(1));
    let second = generator.next().unwrap();
    assert_eq!(second["x"], Value::from(2));

    generator.update_constraints(vec![Constraint::ForbiddenValue {
        hole: "x".to_owned(),
        value: Value::from(1),
    }]);

    // Restarted: 1 is pruned, so the front of the sequence is 2 again.
    let next = generator.next().unwrap();
    assert_eq!(next["x"], Value::from(2));
}

#[test]
fn estimate_size_is_domain_product() {
    let holes = hole_space(&[
        ("a", strs(&["x", "y"])),
        ("b", ints(&[1, 2, 3])),
        ("c", ints(&[7])),
    ]);
    let generator = CandidateGenerator::new(&holes, vec![]);
    assert_eq!(generator.estimate_size(), 6);
}
