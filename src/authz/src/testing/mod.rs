//! Fixture-driven policy test suites
//!
//! A [`TestSuite`] names principal and resource fixtures and lists test
//! cases with the outcomes each principal should get on each resource.
//! [`SuiteRunner`] runs the cases through an engine and reports every
//! action whose outcome differs from the expectation.

pub mod fixtures;
pub mod runner;
pub mod suite;

pub use fixtures::{Fixtures, PrincipalFixture, ResourceFixture};
pub use runner::{CaseReport, Mismatch, SuiteReport, SuiteRunner};
pub use suite::{ExpectedResult, TestCase, TestInput, TestSuite};
