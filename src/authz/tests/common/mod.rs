//! Shared fixtures: the expense demo policy, its derived roles and the
//! principals and resources it is exercised with.

#![allow(dead_code)]

use abac_authz::condition::ConditionNode;
use abac_authz::derived_roles::{DerivedRoleDefinition, DerivedRoleSet};
use abac_authz::policy::{ResourcePolicy, Rule};
use abac_authz::testing::Fixtures;
use abac_authz::{EvalContext, PolicyEngine, Principal, Resource};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

pub const PRINCIPALS: [&str; 7] = ["sally", "ian", "frank", "derek", "simon", "mark", "sydney"];
pub const EXPENSES: [&str; 5] = ["expense1", "expense2", "expense3", "expense4", "expense5"];
pub const ACTIONS: [&str; 6] = ["view", "view:approver", "create", "update", "delete", "approve"];

pub fn principal(name: &str) -> Principal {
    let (roles, department, region): (&[&str], &str, Option<&str>) = match name {
        "sally" => (&["USER"], "SALES", Some("EMEA")),
        "ian" => (&["ADMIN"], "IT", None),
        "frank" => (&["USER"], "FINANCE", Some("EMEA")),
        "derek" => (&["USER", "MANAGER"], "FINANCE", Some("EMEA")),
        "simon" => (&["USER", "MANAGER"], "SALES", Some("NA")),
        "mark" => (&["USER", "MANAGER"], "SALES", Some("EMEA")),
        "sydney" => (&["USER"], "SALES", Some("NA")),
        other => panic!("unknown principal fixture {}", other),
    };

    let principal = Principal::new(name)
        .with_roles(roles.iter().copied())
        .with_attr("department", department);
    match region {
        Some(region) => principal.with_attr("region", region),
        None => principal,
    }
}

pub fn expense(name: &str) -> Resource {
    let (owner, created_at, amount, status) = match name {
        "expense1" => ("sally", "2022-07-21T14:47:51.063Z", 500, "OPEN"),
        "expense2" => ("sally", "2022-09-21T12:47:51.063Z", 2500, "APPROVED"),
        "expense3" => ("sally", "2022-09-21T14:42:51.063Z", 12000, "OPEN"),
        "expense4" => ("frank", "2021-10-01T10:00:00.021-05:00", 2421, "OPEN"),
        "expense5" => ("sally", "2022-09-21T12:47:51.063Z", 2500, "REJECTED"),
        other => panic!("unknown expense fixture {}", other),
    };

    Resource::new("expense", name)
        .with_attr("ownerId", owner)
        .with_attr("createdAt", created_at)
        .with_attr("region", "EMEA")
        .with_attr("amount", amount)
        .with_attr("status", status)
}

/// An expense owned by `owner`, opened just now
pub fn fresh_expense(id: &str, owner: &str) -> Resource {
    Resource::new("expense", id)
        .with_attr("ownerId", owner)
        .with_attr("createdAt", Utc::now().to_rfc3339())
        .with_attr("region", "EMEA")
        .with_attr("amount", 100)
        .with_attr("status", "OPEN")
}

pub fn fixtures() -> Fixtures {
    let fixtures = PRINCIPALS
        .iter()
        .fold(Fixtures::new(), |fixtures, name| fixtures.with_principal(*name, principal(name)));
    EXPENSES
        .iter()
        .fold(fixtures, |fixtures, name| fixtures.with_resource(*name, expense(name)))
}

pub fn actions(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn resource_str(ctx: &EvalContext<'_>, key: &str) -> Option<String> {
    ctx.r().attr_str(key).map(str::to_string)
}

fn is_status(status: &'static str) -> ConditionNode {
    ConditionNode::predicate(move |ctx| ctx.r().attr_str("status") == Some(status))
}

fn created_within_hour(ctx: &EvalContext<'_>) -> bool {
    resource_str(ctx, "createdAt")
        .and_then(|created| DateTime::parse_from_rfc3339(&created).ok())
        .map_or(false, |created| Utc::now().signed_duration_since(created) < Duration::hours(1))
}

pub fn common_roles() -> DerivedRoleSet {
    DerivedRoleSet::new("common_roles")
        .with_description("Common dynamic roles used within the finance demo")
        .with_definitions([
            DerivedRoleDefinition::new(
                "OWNER",
                ["USER"],
                ConditionNode::predicate(|ctx| ctx.r().attr_str("ownerId") == Some(ctx.p().id.as_str())),
            ),
            DerivedRoleDefinition::new(
                "FINANCE",
                ["USER"],
                ConditionNode::predicate(|ctx| ctx.p().attr_str("department") == Some("FINANCE")),
            ),
            DerivedRoleDefinition::new(
                "FINANCE_MANAGER",
                ["MANAGER"],
                ConditionNode::predicate(|ctx| ctx.p().attr_str("department") == Some("FINANCE")),
            ),
            DerivedRoleDefinition::new(
                "REGION_MANAGER",
                ["MANAGER"],
                ConditionNode::predicate(|ctx| ctx.r().attr("region") == ctx.p().attr("region")),
            ),
        ])
}

pub fn expense_policy() -> ResourcePolicy {
    ResourcePolicy::new("expense")
        .with_import("common_roles")
        .with_rules([
            Rule::allow(["*"]).with_roles(["ADMIN"]),
            Rule::allow(["view"]).with_derived_roles(["OWNER", "FINANCE", "REGION_MANAGER"]),
            Rule::allow(["view:approver"]).with_derived_roles(["FINANCE", "FINANCE_MANAGER"]),
            Rule::allow(["view:approver"])
                .with_derived_roles(["OWNER"])
                .with_condition(is_status("APPROVED")),
            Rule::allow(["create"]).with_roles(["USER", "MANAGER"]),
            Rule::allow(["update"])
                .with_derived_roles(["OWNER"])
                .with_condition(is_status("OPEN")),
            Rule::allow(["approve"])
                .with_derived_roles(["FINANCE", "FINANCE_MANAGER"])
                .with_condition(ConditionNode::all([
                    ConditionNode::predicate(|ctx| ctx.r().attr_str("ownerId") != Some(ctx.p().id.as_str())),
                    is_status("OPEN"),
                ])),
            Rule::deny(["approve"])
                .with_roles(["USER"])
                .with_condition(ConditionNode::all([
                    ConditionNode::predicate(|ctx| !ctx.p().has_role("MANAGER")),
                    ConditionNode::predicate(|ctx| {
                        ctx.r().attr("amount").and_then(Value::as_f64).map_or(false, |amount| amount > 10_000.0)
                    }),
                ])),
            Rule::allow(["delete"]).with_derived_roles(["FINANCE_MANAGER"]),
            Rule::allow(["delete"])
                .with_derived_roles(["OWNER"])
                .with_condition(ConditionNode::all([
                    is_status("OPEN"),
                    ConditionNode::predicate(created_within_hour),
                ])),
        ])
}

/// Route engine logs to the test output; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn engine() -> PolicyEngine {
    init_tracing();
    PolicyEngine::new([expense_policy()], [common_roles()]).expect("expense fixtures are valid")
}
