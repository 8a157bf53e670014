// Shared fixtures for the integration and contract tests.
//
// Included from each test file with
//   #[path = "../helpers/mod.rs"] mod helpers;
//
// Everything runs against the in-memory stores, a scripted provider strategy
// and a recording identity service, so no database or sandbox account is
// needed. Provider adapters are exercised separately against wiremock.
#![allow(dead_code)]

pub mod fake_identity;
pub mod fake_provider;

pub use assertions::*;
pub use fake_identity::*;
pub use fake_provider::*;
pub use test_data::*;
