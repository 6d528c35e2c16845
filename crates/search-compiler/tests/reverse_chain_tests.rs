//! `_has` reverse chain tests.
//!
//! Compiled reverse chains are evaluated against a small in-memory store to
//! check EXISTS semantics, including repeated `_has` keys that must each be
//! satisfied independently.

mod common;

use common::assertions::{assert_compiles, assert_diagnostic, assert_rejected};
use common::evaluator::{TestResource, TestStore};
use common::fixtures::TENANT8;
use common::harness::TestHarness;
use helios_search_compiler::types::QueryTerm;
use helios_search_compiler::{ErrorKind, RawQuery, RestrictionKind, TenantId};

fn patients() -> TestStore {
    TestStore::new()
        .with(TestResource::new("Patient", "p1").with("name", "Smith"))
        .with(TestResource::new("Patient", "p2").with("name", "Jones"))
        .with(TestResource::new("Patient", "p3").with("name", "Smithers"))
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn test_has_matches_referencing_resource() {
    let harness = TestHarness::new();
    let store = patients()
        .with(
            TestResource::new("Procedure", "pr1")
                .with("subject", "Patient/p1")
                .with("status", "completed"),
        )
        .with(
            TestResource::new("Procedure", "pr2")
                .with("subject", "Patient/p2")
                .with("status", "in-progress"),
        );

    let query = assert_compiles(harness.compile_default(
        "Patient",
        &[("_has:Procedure:subject:status", "completed")],
    ));

    match &query.terms()[0] {
        QueryTerm::ReverseChain(node) => {
            assert_eq!(node.child_type, "Procedure");
            assert_eq!(node.ref_param.code, "subject");
            assert_eq!(node.parent_type, "Patient");
        }
        other => panic!("Expected reverse chain, got {:?}", other),
    }
    assert_eq!(store.search(&query), vec!["p1"]);
}

#[test]
fn test_has_or_values() {
    let harness = TestHarness::new();
    let store = patients()
        .with(
            TestResource::new("Procedure", "pr1")
                .with("subject", "Patient/p1")
                .with("status", "completed"),
        )
        .with(
            TestResource::new("Procedure", "pr2")
                .with("subject", "Patient/p2")
                .with("status", "in-progress"),
        );

    let query = assert_compiles(harness.compile_default(
        "Patient",
        &[("_has:Procedure:subject:status", "completed,in-progress")],
    ));
    assert_eq!(store.search(&query), vec!["p1", "p2"]);
}

#[test]
fn test_repeated_has_requires_each_independently() {
    let harness = TestHarness::new();
    let query = assert_compiles(harness.compile_default(
        "Patient",
        &[
            ("_has:Procedure:subject:_id", "pr1"),
            ("_has:Procedure:subject:_id", "pr2"),
        ],
    ));
    assert_eq!(query.terms().len(), 2);

    // Each procedure references a different patient: no patient has both.
    let split = patients()
        .with(TestResource::new("Procedure", "pr1").with("subject", "Patient/p1"))
        .with(TestResource::new("Procedure", "pr2").with("subject", "Patient/p2"));
    assert!(split.search(&query).is_empty());

    // Both procedures reference p1.
    let shared = patients()
        .with(TestResource::new("Procedure", "pr1").with("subject", "Patient/p1"))
        .with(TestResource::new("Procedure", "pr2").with("subject", "Patient/p1"));
    assert_eq!(shared.search(&query), vec!["p1"]);
}

#[test]
fn test_has_combined_with_parameter() {
    let harness = TestHarness::new();
    let store = patients()
        .with(
            TestResource::new("Procedure", "pr1")
                .with("subject", "Patient/p1")
                .with("status", "completed"),
        )
        .with(
            TestResource::new("Procedure", "pr3")
                .with("subject", "Patient/p3")
                .with("status", "completed"),
        );

    let query = assert_compiles(harness.compile_default(
        "Patient",
        &[("_has:Procedure:subject:status", "completed"), ("name", "smithe")],
    ));
    assert_eq!(store.search(&query), vec!["p3"]);
}

#[test]
fn test_nested_has() {
    let harness = TestHarness::new();
    let store = patients()
        .with(TestResource::new("Encounter", "e1").with("patient", "Patient/p1"))
        .with(TestResource::new("Encounter", "e2").with("patient", "Patient/p2"))
        .with(
            TestResource::new("Procedure", "pr1")
                .with("encounter", "Encounter/e2")
                .with("status", "completed"),
        );

    let query = assert_compiles(harness.compile_default(
        "Patient",
        &[("_has:Encounter:patient:_has:Procedure:encounter:status", "completed")],
    ));
    assert_eq!(store.search(&query), vec!["p2"]);
}

#[test]
fn test_has_with_forward_chain_tail() {
    let harness = TestHarness::new();
    let store = patients()
        .with(TestResource::new("Organization", "o1").with("name", "General Hospital"))
        .with(TestResource::new("Organization", "o2").with("name", "Clinic"))
        .with(
            TestResource::new("Encounter", "e1")
                .with("patient", "Patient/p1")
                .with("service-provider", "Organization/o2"),
        )
        .with(
            TestResource::new("Encounter", "e2")
                .with("patient", "Patient/p2")
                .with("service-provider", "Organization/o1"),
        );

    let query = assert_compiles(harness.compile_default(
        "Patient",
        &[("_has:Encounter:patient:service-provider.name", "general")],
    ));
    assert_eq!(store.search(&query), vec!["p2"]);
}

#[test]
fn test_has_through_resource_target() {
    let harness = TestHarness::new();
    let store = patients()
        .with(TestResource::new("Provenance", "prov1").with("target", "Patient/p3"));

    let query = assert_compiles(harness.compile_default(
        "Patient",
        &[("_has:Provenance:target:_id", "prov1")],
    ));
    assert_eq!(store.search(&query), vec!["p3"]);
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_has_on_non_reference_parameter() {
    let harness = TestHarness::new();
    let errors = assert_rejected(
        harness.compile_default("Patient", &[("_has:Procedure:code:code", "test")]),
        ErrorKind::WrongParameterType,
    );
    assert_diagnostic(
        &errors,
        "Search parameter 'code' is not of type reference for '_has' (reverse chain) search.",
    );
}

#[test]
fn test_has_with_missing_components() {
    let harness = TestHarness::new();
    for key in ["_has", "_has:Procedure", "_has:Procedure:subject", "_has::subject:status"] {
        let errors = assert_rejected(
            harness.compile_default("Patient", &[(key, "completed")]),
            ErrorKind::MalformedReverseChain,
        );
        assert_diagnostic(
            &errors,
            "An incorrect number of components were specified for '_has' (reverse chain) search.",
        );
    }
}

#[test]
fn test_has_with_extra_components() {
    let harness = TestHarness::new();
    assert_rejected(
        harness.compile_default("Patient", &[("_has:Procedure:subject:status:not:x", "completed")]),
        ErrorKind::MalformedReverseChain,
    );
}

#[test]
fn test_has_unknown_resource_type() {
    let harness = TestHarness::new();
    let errors = assert_rejected(
        harness.compile_default("Patient", &[("_has:Unknown:subject:status", "completed")]),
        ErrorKind::UnknownResourceType,
    );
    assert_diagnostic(
        &errors,
        "Resource type 'Unknown' is not valid for '_has' (reverse chain) search.",
    );
}

#[test]
fn test_has_unknown_reference_parameter() {
    let harness = TestHarness::new();
    assert_rejected(
        harness.compile_default("Patient", &[("_has:Procedure:nonexistent:status", "completed")]),
        ErrorKind::UnknownSearchParameter,
    );
}

#[test]
fn test_has_reference_not_targeting_searched_type() {
    let harness = TestHarness::new();
    let errors = assert_rejected(
        harness.compile_default("Patient", &[("_has:Encounter:service-provider:status", "finished")]),
        ErrorKind::MismatchedTargetType,
    );
    assert_diagnostic(
        &errors,
        "Search parameter 'service-provider' target types do not include expected type 'Patient' for '_has' (reverse chain) search.",
    );
}

#[test]
fn test_has_unknown_terminal_parameter() {
    let harness = TestHarness::new();
    assert_rejected(
        harness.compile_default("Patient", &[("_has:Procedure:subject:nonexistent", "x")]),
        ErrorKind::UnknownSearchParameter,
    );
}

#[test]
fn test_system_search_rejects_has() {
    let harness = TestHarness::new();
    let result = harness.compiler().compile_system(
        &TenantId::default_tenant(),
        &RawQuery::from_pairs([("_has:Procedure:subject:status", "completed")]),
    );
    let errors = assert_rejected(result, ErrorKind::UnsupportedTopLevelHas);
    assert_diagnostic(&errors, "system search not supported with _has");
}

// ============================================================================
// Tenant combinations
// ============================================================================

#[test]
fn test_has_counts_as_single_combination_name() {
    let harness = TestHarness::new();
    assert_compiles(harness.compile(
        TENANT8,
        "Patient",
        &[("_has:Procedure:subject:status", "completed")],
    ));
    assert_compiles(harness.compile(
        TENANT8,
        "Patient",
        &[
            ("_has:Procedure:subject:status", "completed"),
            ("_has:Encounter:patient:status", "finished"),
        ],
    ));
    assert_compiles(harness.compile(
        TENANT8,
        "Patient",
        &[("name", "Smith"), ("_has:Procedure:subject:status", "completed")],
    ));
}

#[test]
fn test_has_combination_disallowed() {
    let harness = TestHarness::new();
    assert_rejected(
        harness.compile(
            TENANT8,
            "Patient",
            &[("gender", "female"), ("_has:Procedure:subject:status", "completed")],
        ),
        ErrorKind::RestrictionViolation(RestrictionKind::Combination),
    );
    assert_rejected(
        harness.compile(TENANT8, "Patient", &[]),
        ErrorKind::RestrictionViolation(RestrictionKind::Combination),
    );
}

#[test]
fn test_has_terminal_restrictions_apply_on_child_type() {
    let harness = TestHarness::new();
    assert_compiles(harness.compile(
        TENANT8,
        "Patient",
        &[("_has:Procedure:subject:status:not", "completed")],
    ));
    assert_rejected(
        harness.compile(
            TENANT8,
            "Patient",
            &[("_has:Procedure:subject:status:missing", "true")],
        ),
        ErrorKind::RestrictionViolation(RestrictionKind::Modifier),
    );
}
