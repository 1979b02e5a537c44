//! Policy decision engine tests
//!
//! Tests for the complete decision pipeline:
//! Policy lookup → Derived roles → Rule aggregation → Response

mod common;

use abac_authz::{
    engine::{ActionOutcome, CheckResourcesRequest, EffectFormat, EngineConfig, PolicyEngine},
    error::AuthzError,
    policy::{ResourcePolicy, Rule},
    types::{Effect, Principal, Resource},
};
use common::{actions, engine, expense, fresh_expense, principal, ACTIONS, EXPENSES, PRINCIPALS};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

// ============================================================================
// DECISION SCENARIO TESTS
// ============================================================================

#[test]
fn test_sally_on_expense1() {
    let engine = engine();
    let sally = principal("sally");
    let expense1 = expense("expense1");

    assert!(engine.is_allowed(&sally, &expense1, "view"));
    assert!(engine.is_allowed(&sally, &expense1, "create"));
    assert!(engine.is_allowed(&sally, &expense1, "update"));
    assert!(!engine.is_allowed(&sally, &expense1, "delete"));
    assert!(!engine.is_allowed(&sally, &expense1, "approve"));
}

#[test]
fn test_admin_wildcard_allows_everything() {
    let engine = engine();
    let ian = principal("ian");

    for name in EXPENSES {
        let resource = expense(name);
        for action in ACTIONS {
            assert!(
                engine.is_allowed(&ian, &resource, action),
                "ian should be allowed to {} {}",
                action,
                name
            );
        }
    }
}

#[test]
fn test_expense_matrix() {
    // (principal, expense, allowed actions among view/view:approver/update/delete/approve)
    let expected: &[(&str, &str, &[&str])] = &[
        ("sally", "expense1", &["view", "update"]),
        ("sally", "expense2", &["view", "view:approver"]),
        ("sally", "expense3", &["view", "update"]),
        ("sally", "expense4", &[]),
        ("sally", "expense5", &["view"]),
        ("sydney", "expense1", &[]),
        ("sydney", "expense3", &[]),
        ("mark", "expense1", &["view"]),
        ("mark", "expense4", &["view"]),
        ("simon", "expense1", &[]),
        ("simon", "expense5", &[]),
        ("frank", "expense1", &["view", "view:approver", "approve"]),
        ("frank", "expense2", &["view", "view:approver"]),
        ("frank", "expense3", &["view", "view:approver"]),
        ("frank", "expense4", &["view", "update"]),
        ("derek", "expense1", &["view", "view:approver", "delete", "approve"]),
        ("derek", "expense2", &["view", "view:approver", "delete"]),
        ("derek", "expense3", &["view", "view:approver", "delete", "approve"]),
        ("derek", "expense4", &["view", "view:approver", "delete", "approve"]),
        ("derek", "expense5", &["view", "view:approver", "delete"]),
    ];

    let engine = engine();
    let checked = ["view", "view:approver", "update", "delete", "approve"];

    for (principal_name, expense_name, allowed) in expected {
        let p = principal(principal_name);
        let r = expense(expense_name);

        for action in checked {
            assert_eq!(
                engine.is_allowed(&p, &r, action),
                allowed.contains(&action),
                "{} {} on {}",
                principal_name,
                action,
                expense_name
            );
        }
    }
}

#[test]
fn test_deny_rule_limits_finance_approvals() {
    let engine = engine();

    // frank is FINANCE but not a manager: the amount cap denies
    assert!(!engine.is_allowed(&principal("frank"), &expense("expense3"), "approve"));

    // derek is a manager: the deny condition fails and contributes nothing
    assert!(engine.is_allowed(&principal("derek"), &expense("expense3"), "approve"));
}

#[test]
fn test_owner_deletes_fresh_open_expense() {
    let engine = engine();
    let sally = principal("sally");

    assert!(engine.is_allowed(&sally, &fresh_expense("expense9", "sally"), "delete"));
    assert!(!engine.is_allowed(&sally, &fresh_expense("expense9", "frank"), "delete"));
}

// ============================================================================
// UNKNOWN DATA TESTS
// ============================================================================

#[test]
fn test_unknown_kind_denies() {
    let engine = engine();
    let sally = principal("sally");
    let invoice = Resource::new("invoice", "invoice1").with_attr("ownerId", "sally");

    assert!(!engine.is_allowed(&sally, &invoice, "view"));

    let request = CheckResourcesRequest::new(sally).with_resource(invoice, ["view", "create"]);
    let response = engine.check_resources(&request, EffectFormat::Effect).unwrap();

    let result = &response.results[0];
    assert_eq!(result.resource.kind, "invoice");
    assert_eq!(result.outcome("view"), Some(ActionOutcome::Effect(Effect::Deny)));
    assert_eq!(result.outcome("create"), Some(ActionOutcome::Effect(Effect::Deny)));
}

#[test]
fn test_unresolved_import_contributes_nothing() {
    let policy = ResourcePolicy::new("expense")
        .with_imports(["common_roles", "missing_roles"])
        .with_rule(Rule::allow(["view"]).with_derived_roles(["OWNER"]));
    let engine = PolicyEngine::new([policy], [common::common_roles()]).unwrap();

    assert!(engine.is_allowed(&principal("sally"), &expense("expense1"), "view"));
    assert!(!engine.is_allowed(&principal("frank"), &expense("expense1"), "view"));
}

#[test]
fn test_later_policy_replaces_earlier() {
    let permissive = ResourcePolicy::new("expense").with_rule(Rule::allow(["view"]).with_roles(["USER"]));
    let strict = ResourcePolicy::new("expense").with_rule(Rule::allow(["view"]).with_roles(["ADMIN"]));

    let engine = PolicyEngine::new([permissive, strict], Vec::new()).unwrap();

    assert!(!engine.is_allowed(&principal("sally"), &expense("expense1"), "view"));
    assert_eq!(engine.kinds(), vec!["expense"]);
}

#[test]
fn test_construction_rejects_malformed_rule() {
    let policy = ResourcePolicy::new("expense")
        .with_rule(Rule::allow(["view"]).with_roles(Vec::<String>::new()));

    match PolicyEngine::new([policy], Vec::new()) {
        Err(AuthzError::MalformedDefinition(msg)) => assert!(msg.contains("expense")),
        other => panic!("Expected MalformedDefinition error, got {:?}", other),
    }
}

// ============================================================================
// BATCHED CHECK TESTS
// ============================================================================

#[test]
fn test_check_resources_formats() {
    let engine = engine();
    let request = CheckResourcesRequest::new(principal("sally"))
        .with_resource(expense("expense1"), ["view", "approve"]);

    let effects = engine.check_resources(&request, EffectFormat::Effect).unwrap();
    assert_eq!(
        effects.results[0].outcome("view"),
        Some(ActionOutcome::Effect(Effect::Allow))
    );
    assert_eq!(
        effects.results[0].outcome("approve"),
        Some(ActionOutcome::Effect(Effect::Deny))
    );

    let booleans = engine.check_resources(&request, EffectFormat::Boolean).unwrap();
    assert_eq!(booleans.results[0].outcome("view"), Some(ActionOutcome::Bool(true)));
    assert_eq!(booleans.results[0].outcome("approve"), Some(ActionOutcome::Bool(false)));

    let json = serde_json::to_value(&effects).unwrap();
    assert_eq!(json["results"][0]["actions"]["view"], "EFFECT_ALLOW");
    assert_eq!(json["results"][0]["resource"]["id"], "expense1");
}

#[test]
fn test_check_resources_preserves_order() {
    let config = EngineConfig {
        parallel_threshold: 1,
        ..EngineConfig::default()
    };
    let parallel = PolicyEngine::with_config(config, [common::expense_policy()], [common::common_roles()]).unwrap();
    let sequential = engine();

    let mut request = CheckResourcesRequest::new(principal("derek"));
    for round in 0..20 {
        for name in EXPENSES {
            let resource = expense(name).with_attr("round", round);
            request = request.with_resource(resource, ACTIONS);
        }
    }
    request = request.with_resource(Resource::new("invoice", "invoice1"), ["view"]);

    let from_parallel = parallel.check_resources(&request, EffectFormat::Effect).unwrap();
    let from_sequential = sequential.check_resources(&request, EffectFormat::Effect).unwrap();

    assert_eq!(from_parallel, from_sequential);
    assert_eq!(from_parallel.len(), request.resources.len());
    for (entry, result) in request.resources.iter().zip(&from_parallel.results) {
        assert_eq!(entry.resource.id, result.resource.id);
    }
}

#[test]
fn test_check_resources_rejects_empty_input() {
    let engine = engine();

    let empty = CheckResourcesRequest::new(principal("sally"));
    assert!(matches!(
        engine.check_resources(&empty, EffectFormat::Effect),
        Err(AuthzError::InvalidInput(_))
    ));

    let no_actions = CheckResourcesRequest::new(principal("sally"))
        .with_resource(expense("expense1"), Vec::<String>::new());
    assert!(matches!(
        engine.check_resources(&no_actions, EffectFormat::Effect),
        Err(AuthzError::InvalidInput(_))
    ));
}

#[test]
fn test_requested_wildcard_action_is_literal() {
    let engine = engine();

    assert!(engine.is_allowed(&principal("ian"), &expense("expense1"), "*"));
    assert!(!engine.is_allowed(&principal("derek"), &expense("expense1"), "*"));
}

// ============================================================================
// CONCURRENCY TESTS
// ============================================================================

#[test]
fn test_concurrent_decisions() {
    let engine = Arc::new(engine());
    let workers = num_cpus::get().clamp(2, 8);

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let name = PRINCIPALS[worker % PRINCIPALS.len()];
                let p = principal(name);
                let first: Vec<bool> = EXPENSES
                    .iter()
                    .flat_map(|e| ACTIONS.iter().map(move |a| (e, a)))
                    .map(|(e, a)| engine.is_allowed(&p, &expense(e), a))
                    .collect();

                for _ in 0..50 {
                    let again: Vec<bool> = EXPENSES
                        .iter()
                        .flat_map(|e| ACTIONS.iter().map(move |a| (e, a)))
                        .map(|(e, a)| engine.is_allowed(&p, &expense(e), a))
                        .collect();
                    assert_eq!(first, again);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_engine_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PolicyEngine>();
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #[test]
    fn prop_single_and_batched_decisions_agree(
        p in 0..PRINCIPALS.len(),
        e in 0..EXPENSES.len(),
        a in 0..ACTIONS.len(),
    ) {
        let engine = engine();
        let principal = principal(PRINCIPALS[p]);
        let resource = expense(EXPENSES[e]);
        let action = ACTIONS[a];

        let single = engine.is_allowed(&principal, &resource, action);
        prop_assert_eq!(single, engine.is_allowed(&principal, &resource, action));

        let request = CheckResourcesRequest::new(principal).with_resource(resource, actions(&[action]));
        let response = engine.check_resources(&request, EffectFormat::Boolean).unwrap();
        prop_assert_eq!(response.results[0].outcome(action), Some(ActionOutcome::Bool(single)));
    }

    #[test]
    fn prop_unknown_kind_never_allows(
        kind in "[a-z]{1,12}",
        a in 0..ACTIONS.len(),
    ) {
        prop_assume!(kind != "expense");
        let engine = engine();
        let resource = Resource::new(kind, "r1");

        prop_assert!(!engine.is_allowed(&Principal::new("ian").with_role("ADMIN"), &resource, ACTIONS[a]));
    }
}
