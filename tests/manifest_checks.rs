mod common;

use common::temp_path;

use manifix::control::{Controller, RepairRequest};
use manifix::demos::{
    baseline_deployment, broken_deployment, demo_template_and_holes,
};
use manifix::fixbank::FixBank;
use manifix::manifest::ManifestArtifact;
use manifix::oracle::{check_all, Artifact};
use manifix::policies::standard_oracles;
use manifix::propose::HintProposer;
use manifix::repair::RepairStatus;
use manifix::template::{Patch, PatchOp};
use manifix::value::Value;

use indexmap::IndexMap;
use serde_json::json;

fn op(name: &str, args: &[(&str, Value)]) -> PatchOp {
    let args: IndexMap<String, Value> = args
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect();
    PatchOp::new(name, args)
}

fn patch(ops: Vec<PatchOp>) -> Patch {
    Patch { ops }
}

fn doc(artifact: &ManifestArtifact) -> &serde_json::Value {
    &artifact.files["deployment.json"]
}

////////////////////////////////////////////////////////////////////////////////
// Patch operations

#[test]
fn ensure_label_scopes() {
    let artifact = broken_deployment();

    let patched = artifact
        .apply_patch(&patch(vec![op(
            "EnsureLabel",
            &[
                ("scope", Value::from("both")),
                ("key", Value::from("team")),
                ("value", Value::from("payments")),
            ],
        )]))
        .unwrap();

    let both = doc(&patched);
    assert_eq!(
        both.pointer("/metadata/labels/team"),
        Some(&json!("payments"))
    );
    assert_eq!(
        both.pointer("/spec/template/metadata/labels/team"),
        Some(&json!("payments"))
    );

    let patched = artifact
        .apply_patch(&patch(vec![op(
            "EnsureLabel",
            &[
                ("scope", Value::from("podTemplate")),
                ("key", Value::from("tier")),
                ("value", Value::from("backend")),
            ],
        )]))
        .unwrap();
    let pod_only = doc(&patched);
    assert_eq!(pod_only.pointer("/metadata/labels/tier"), None);
    assert_eq!(
        pod_only.pointer("/spec/template/metadata/labels/tier"),
        Some(&json!("backend"))
    );
}

#[test]
fn ensure_image_version_distinguishes_tags_from_full_images() {
    let artifact = broken_deployment();

    // Plain tag: reuses the current image base.
    let patched = artifact
        .apply_patch(&patch(vec![op(
            "EnsureImageVersion",
            &[
                ("container", Value::from("payments-api")),
                ("version", Value::from("prod-2.0.0")),
            ],
        )]))
        .unwrap();
    assert_eq!(
        doc(&patched).pointer("/spec/template/spec/containers/0/image"),
        Some(&json!("payments-api:prod-2.0.0"))
    );

    // Full ECR path: replaces the image wholesale.
    let full = "123456789012.dkr.ecr.us-east-1.amazonaws.com/production-us/payments-api:prod-1.2.3";
    let patched = artifact
        .apply_patch(&patch(vec![op(
            "EnsureImageVersion",
            &[
                ("container", Value::from("payments-api")),
                ("version", Value::from(full)),
            ],
        )]))
        .unwrap();
    assert_eq!(
        doc(&patched).pointer("/spec/template/spec/containers/0/image"),
        Some(&json!(full))
    );
}

#[test]
fn ensure_security_baseline_sets_the_full_context() {
    let patched = broken_deployment()
        .apply_patch(&patch(vec![op(
            "EnsureSecurityBaseline",
            &[("container", Value::from("payments-api"))],
        )]))
        .unwrap();

    let ctx = doc(&patched)
        .pointer("/spec/template/spec/containers/0/securityContext")
        .unwrap();
    assert_eq!(ctx["runAsNonRoot"], json!(true));
    assert_eq!(ctx["allowPrivilegeEscalation"], json!(false));
    assert_eq!(ctx["readOnlyRootFilesystem"], json!(true));
    assert_eq!(ctx["capabilities"]["drop"], json!(["ALL"]));
}

#[test]
fn ensure_resource_profile_replaces_the_block() {
    let patched = broken_deployment()
        .apply_patch(&patch(vec![op(
            "EnsureResourceProfile",
            &[
                ("container", Value::from("payments-api")),
                ("profile", Value::from("medium")),
            ],
        )]))
        .unwrap();

    let resources = doc(&patched)
        .pointer("/spec/template/spec/containers/0/resources")
        .unwrap();
    assert_eq!(resources["requests"]["cpu"], json!("500m"));
    assert_eq!(resources["limits"]["memory"], json!("1Gi"));
}

#[test]
fn unknown_profile_is_rejected() {
    let err = broken_deployment()
        .apply_patch(&patch(vec![op(
            "EnsureResourceProfile",
            &[
                ("container", Value::from("payments-api")),
                ("profile", Value::from("gigantic")),
            ],
        )]))
        .unwrap_err();
    assert!(err.to_string().contains("gigantic"));
}

#[test]
fn ensure_priority_class_sets_and_removes() {
    let artifact = baseline_deployment();

    let patched = artifact
        .apply_patch(&patch(vec![op(
            "EnsurePriorityClass",
            &[("name", Value::from("high-priority"))],
        )]))
        .unwrap();
    assert_eq!(
        doc(&patched).pointer("/spec/priorityClassName"),
        Some(&json!("high-priority"))
    );

    let patched = artifact
        .apply_patch(&patch(vec![op(
            "EnsurePriorityClass",
            &[("name", Value::Absent)],
        )]))
        .unwrap();
    assert_eq!(doc(&patched).pointer("/spec/priorityClassName"), None);
}

#[test]
fn unknown_operation_is_rejected() {
    let err = broken_deployment()
        .apply_patch(&patch(vec![op("RotateCredentials", &[])]))
        .unwrap_err();
    assert!(err.to_string().contains("RotateCredentials"));
}

#[test]
fn apply_patch_leaves_the_original_untouched() {
    let artifact = broken_deployment();
    let before = artifact.clone();

    let _ = artifact
        .apply_patch(&patch(vec![op(
            "EnsureReplicas",
            &[("replicas", Value::from(4))],
        )]))
        .unwrap();

    assert_eq!(artifact, before);
}

#[test]
fn non_deployment_documents_pass_through() {
    let mut artifact = broken_deployment();
    artifact.files.insert(
        "service.json".to_owned(),
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": "payments-api" },
        }),
    );
    let service_before = artifact.files["service.json"].clone();

    let patched = artifact
        .apply_patch(&patch(vec![op(
            "EnsureLabel",
            &[
                ("key", Value::from("env")),
                ("value", Value::from("production-us")),
            ],
        )]))
        .unwrap();

    assert_eq!(patched.files["service.json"], service_before);
}

////////////////////////////////////////////////////////////////////////////////
// Oracles

#[test]
fn baseline_passes_every_oracle() {
    let violations =
        check_all(&baseline_deployment(), &standard_oracles()).unwrap();
    assert!(violations.is_empty(), "unexpected: {:?}", violations);
}

#[test]
fn broken_deployment_fails_the_expected_checks() {
    let violations =
        check_all(&broken_deployment(), &standard_oracles()).unwrap();

    let ids: Vec<&str> = violations.iter().map(|v| v.id.as_str()).collect();
    assert!(ids.contains(&"policy.IMAGE_NOT_FROM_ECR"));
    assert!(ids.contains(&"policy.ENV_PROD_REPLICA_COUNT"));
    assert!(ids.contains(&"policy.ENV_PROD_PROFILE_SMALL"));
    assert!(ids.contains(&"policy.ENV_PROD_IMAGE_TAG"));
    assert!(ids.contains(&"policy.MISSING_LABEL_TEAM"));
    assert!(ids.contains(&"policy.MISSING_LABEL_TIER"));
    assert!(ids.contains(&"policy.MISSING_PRIORITY_CLASS"));
    assert!(ids.contains(&"security.NO_RUN_AS_NON_ROOT.payments-api"));
    assert!(ids.contains(&"security.PRIVILEGE_ESCALATION.payments-api"));
    // env label is present, and the small resource block matches a profile.
    assert!(!ids.contains(&"policy.MISSING_LABEL_ENV"));
    assert!(!ids.iter().any(|id| id.starts_with("resource.")));
}

////////////////////////////////////////////////////////////////////////////////
// End to end

#[test]
fn broken_deployment_is_repaired_end_to_end() {
    let oracles = standard_oracles();
    let (template, holes) = demo_template_and_holes();

    let mut controller = Controller::new();
    let report = controller
        .repair_artifact(
            &broken_deployment(),
            &oracles,
            RepairRequest {
                template: Some(template),
                hole_space: Some(holes),
                ..RepairRequest::default()
            },
        )
        .unwrap();

    assert_eq!(report.outcome.status, RepairStatus::Success);
    // Constraint learning prunes the prod replica counts early; the search
    // must not degenerate into a scan of the whole product space.
    assert!(report.outcome.tried_candidates <= 10);
    assert!(!report.outcome.constraints.is_empty());

    let repaired = &report.outcome.artifact;
    assert!(check_all(repaired, &oracles).unwrap().is_empty());

    let assignment = report.outcome.last_assignment.unwrap();
    assert_eq!(assignment["replicas"], Value::from(3));
}

#[test]
fn fix_bank_accelerates_the_second_repair() {
    let path = temp_path("manifest-warm");
    let _ = std::fs::remove_file(&path);

    let oracles = standard_oracles();

    let cold_tried = {
        let (template, holes) = demo_template_and_holes();
        let mut controller =
            Controller::new().with_bank(FixBank::open(&path));
        let report = controller
            .repair_artifact(
                &broken_deployment(),
                &oracles,
                RepairRequest {
                    template: Some(template),
                    hole_space: Some(holes),
                    ..RepairRequest::default()
                },
            )
            .unwrap();
        assert_eq!(report.outcome.status, RepairStatus::Success);
        assert!(!report.fixbank_hit);
        report.outcome.tried_candidates
    };

    // A fresh controller over the persisted store: template, hole space and
    // learned constraints all come from the bank.
    let mut controller = Controller::new()
        .with_bank(FixBank::open(&path))
        .with_proposer(Box::new(HintProposer));
    let report = controller
        .repair_artifact(
            &broken_deployment(),
            &oracles,
            RepairRequest::default(),
        )
        .unwrap();

    assert_eq!(report.outcome.status, RepairStatus::Success);
    assert!(report.fixbank_hit);
    assert_eq!(report.proposer_calls, 0);
    assert!(report.outcome.tried_candidates < cold_tried);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn hint_proposer_alone_can_drive_a_repair() {
    let oracles = standard_oracles();

    let mut controller =
        Controller::new().with_proposer(Box::new(HintProposer));
    let report = controller
        .repair_artifact(
            &broken_deployment(),
            &oracles,
            RepairRequest {
                max_iters: 5,
                ..RepairRequest::default()
            },
        )
        .unwrap();

    assert_eq!(report.proposer_calls, 1);
    assert_eq!(report.outcome.status, RepairStatus::Success);
    assert!(check_all(&report.outcome.artifact, &oracles)
        .unwrap()
        .is_empty());
}
