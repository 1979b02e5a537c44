//! Suite execution against a policy engine

use super::fixtures::Fixtures;
use super::suite::{TestCase, TestSuite};
use crate::engine::{CheckResourcesRequest, EffectFormat, PolicyEngine};
use crate::error::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

/// An action whose outcome differed from the expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub action: String,
    pub expected: bool,
    /// `None` if the action was missing from the response
    pub actual: Option<bool>,
}

/// Result of one expected principal/resource pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    pub case: String,
    pub principal: String,
    pub resource: String,
    pub mismatches: Vec<Mismatch>,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Results of a whole suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub name: String,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|case| case.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|case| !case.passed())
    }
}

/// Runs suites through [`PolicyEngine::check_resources`] in boolean mode
#[derive(Debug)]
pub struct SuiteRunner<'e> {
    engine: &'e PolicyEngine,
    fixtures: Fixtures,
}

impl<'e> SuiteRunner<'e> {
    pub fn new(engine: &'e PolicyEngine) -> Self {
        Self {
            engine,
            fixtures: Fixtures::new(),
        }
    }

    /// Shared fixtures available to every suite; a suite's own fixtures win
    pub fn with_fixtures(mut self, fixtures: Fixtures) -> Self {
        self.fixtures = fixtures;
        self
    }

    /// Run one suite
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthzError::InvalidInput`] if the suite is invalid or
    /// references an unknown fixture.
    pub fn run_suite(&self, suite: &TestSuite) -> Result<SuiteReport> {
        suite.validate()?;

        let mut fixtures = self.fixtures.clone();
        fixtures.merge(&suite.fixtures());

        let mut cases = Vec::new();
        for case in &suite.tests {
            cases.extend(self.run_case(case, &fixtures)?);
        }

        let report = SuiteReport {
            name: suite.name.clone(),
            cases,
        };
        info!(
            suite = %report.name,
            passed = report.passed(),
            failed = report.failed(),
            "Policy suite finished"
        );

        Ok(report)
    }

    /// Run several suites with their fixtures pooled
    pub fn run_all(&self, suites: &[TestSuite]) -> Result<Vec<SuiteReport>> {
        let mut pooled = self.fixtures.clone();
        for suite in suites {
            pooled.merge(&suite.fixtures());
        }

        let runner = SuiteRunner {
            engine: self.engine,
            fixtures: pooled,
        };
        suites.iter().map(|suite| runner.run_suite(suite)).collect()
    }

    /// Run one test case against the given fixtures
    pub fn run_case(&self, case: &TestCase, fixtures: &Fixtures) -> Result<Vec<CaseReport>> {
        case.validate()?;

        for name in &case.input.principals {
            fixtures.principal(name)?;
        }
        for name in &case.input.resources {
            fixtures.resource(name)?;
        }

        let mut reports = Vec::with_capacity(case.expected.len());
        for expected in &case.expected {
            let principal = fixtures.principal(&expected.principal)?;
            let resource = fixtures.resource(&expected.resource)?;

            let request = CheckResourcesRequest::new(principal.clone())
                .with_resource(resource.clone(), expected.actions.keys().cloned());
            let response = self.engine.check_resources(&request, EffectFormat::Boolean)?;
            let result = response.results.first();

            let mismatches: Vec<Mismatch> = expected
                .actions
                .iter()
                .filter_map(|(action, outcome)| {
                    let expected = outcome.is_allowed();
                    let actual = result
                        .and_then(|result| result.outcome(action))
                        .map(|outcome| outcome.is_allowed());

                    (actual != Some(expected)).then(|| Mismatch {
                        action: action.clone(),
                        expected,
                        actual,
                    })
                })
                .collect();

            for mismatch in &mismatches {
                warn!(
                    case = %case.name,
                    principal = %expected.principal,
                    resource = %expected.resource,
                    action = %mismatch.action,
                    expected = mismatch.expected,
                    actual = ?mismatch.actual,
                    "Policy expectation not met"
                );
            }
            debug!(case = %case.name, principal = %expected.principal, resource = %expected.resource, "Case checked");

            reports.push(CaseReport {
                case: case.name.clone(),
                principal: expected.principal.clone(),
                resource: expected.resource.clone(),
                mismatches,
            });
        }

        Ok(reports)
    }
}
