mod common;

use common::temp_path;

use manifix::constraint::Constraint;
use manifix::fixbank::{
    build_signature, FixBank, FixEntry, FixMetadata, Signature,
};
use manifix::oracle::Violation;
use manifix::template::{TemplateArg, TemplateOp, PatchTemplate};
use manifix::value::Value;

use indexmap::{IndexMap, IndexSet};
use serde_json::json;

fn sample_template() -> PatchTemplate {
    let mut args = IndexMap::new();
    args.insert("replicas".to_owned(), TemplateArg::hole("replicas"));
    PatchTemplate {
        ops: vec![TemplateOp::new("EnsureReplicas", args)],
    }
}

fn sample_entry() -> FixEntry {
    let mut hole_space = IndexMap::new();
    let mut domain = IndexSet::new();
    domain.insert(Value::from(3));
    domain.insert(Value::from(4));
    hole_space.insert("replicas".to_owned(), domain);

    let mut assignment = IndexMap::new();
    assignment.insert("replicas".to_owned(), Value::from(3));

    FixEntry {
        signature: Signature {
            failed_oracles: vec!["policy".to_owned()],
            error_codes: vec!["ENV_PROD_REPLICA_COUNT".to_owned()],
            context: IndexMap::new(),
        },
        template: sample_template(),
        hole_space,
        learned_constraints: vec![Constraint::ForbiddenTuple {
            holes: vec!["env".to_owned(), "replicas".to_owned()],
            values: vec![Value::from("prod"), Value::from(2)],
        }],
        successful_assignment: Some(assignment),
        metadata: FixMetadata::default(),
    }
}

#[test]
fn round_trip_reproduces_entries() {
    let path = temp_path("roundtrip");
    let _ = std::fs::remove_file(&path);

    let mut bank = FixBank::open(&path);
    bank.add(sample_entry()).unwrap();

    let reloaded = FixBank::open(&path);
    assert_eq!(reloaded.len(), 1);

    let original = &bank.entries()[0];
    let restored = &reloaded.entries()[0];
    assert_eq!(original.signature, restored.signature);
    assert_eq!(original.template, restored.template);
    assert_eq!(original.hole_space, restored.hole_space);
    assert_eq!(original.learned_constraints, restored.learned_constraints);
    assert_eq!(
        original.successful_assignment,
        restored.successful_assignment
    );

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn persisted_file_is_versioned() {
    let path = temp_path("versioned");
    let _ = std::fs::remove_file(&path);

    let mut bank = FixBank::open(&path);
    bank.add(sample_entry()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["version"], json!("1.0"));
    assert!(parsed["entries"].is_array());

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn add_merges_on_matching_signature() {
    let mut bank = FixBank::in_memory();

    bank.add(sample_entry()).unwrap();

    let mut second = sample_entry();
    second.learned_constraints = vec![Constraint::ForbiddenValue {
        hole: "replicas".to_owned(),
        value: Value::from(1),
    }];
    bank.add(second).unwrap();

    assert_eq!(bank.len(), 1);
    let entry = &bank.entries()[0];
    assert_eq!(entry.metadata.success_count, 2);
    assert_eq!(entry.learned_constraints.len(), 2);
    assert!(entry.metadata.last_used.is_some());
}

#[test]
fn merge_unions_constraints_structurally() {
    let mut bank = FixBank::in_memory();

    bank.add(sample_entry()).unwrap();
    // Same constraints again: union must not duplicate.
    bank.add(sample_entry()).unwrap();

    let entry = &bank.entries()[0];
    assert_eq!(entry.metadata.success_count, 2);
    assert_eq!(entry.learned_constraints.len(), 1);
}

#[test]
fn lookup_ignores_context() {
    let mut bank = FixBank::in_memory();
    let mut entry = sample_entry();
    entry
        .signature
        .context
        .insert("app".to_owned(), "payments-api".to_owned());
    bank.add(entry).unwrap();

    let mut probe = sample_entry().signature;
    probe.context.insert("app".to_owned(), "totally-else".to_owned());
    assert!(bank.lookup(&probe).is_some());

    probe.error_codes = vec!["OTHER".to_owned()];
    assert!(bank.lookup(&probe).is_none());
}

#[test]
fn corrupt_store_is_treated_as_empty() {
    let path = temp_path("corrupt");
    std::fs::write(&path, "not json at all").unwrap();

    let bank = FixBank::open(&path);
    assert!(bank.is_empty());

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn signature_from_violations_is_sorted_and_deduplicated() {
    let violations = vec![
        Violation::new("security.PRIVILEGE_ESCALATION.api", "m", vec![]),
        Violation::new("policy.ENV_PROD_REPLICA_COUNT", "m", vec![])
            .with_evidence(json!({ "error_code": "ENV_PROD_REPLICA_COUNT" })),
        Violation::new("policy.MISSING_PRIORITY_CLASS", "m", vec![]),
        Violation::new("policy.ENV_PROD_REPLICA_COUNT", "m", vec![])
            .with_evidence(json!({ "error_code": "ENV_PROD_REPLICA_COUNT" })),
    ];

    let artifact_json = json!({
        "files": {
            "deployment.json": {
                "kind": "Deployment",
                "metadata": { "name": "payments-api" },
                "spec": {
                    "template": {
                        "metadata": { "labels": { "env": "prod" } },
                    },
                },
            },
        },
    });

    let signature = build_signature(&artifact_json, &violations);
    assert_eq!(signature.failed_oracles, vec!["policy", "security"]);
    assert_eq!(signature.error_codes, vec!["ENV_PROD_REPLICA_COUNT"]);
    assert_eq!(
        signature.context.get("app").map(String::as_str),
        Some("payments-api")
    );
    assert_eq!(
        signature.context.get("env").map(String::as_str),
        Some("prod")
    );
}
