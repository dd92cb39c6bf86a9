//! IAM Policy Construction
//!
//! Builds the custom IAM policy an application's role gets, from the
//! `services` section of its pipeline properties.
//!
//! ## Flow
//!
//! 1. Normalize each `services` entry into a list of resource items
//! 2. Resolve the account number (only if something was requested)
//! 3. Render one statement template per service
//! 4. Collect statements into a `{"Version", "Statement"}` document

pub mod policy;
pub mod sts;
pub mod templates;
pub mod types;

pub use policy::{construct_policy, detect_shape, parse_statements, TemplateShape};
pub use sts::{AccountLookup, StaticAccount, StsAccountLookup};
pub use templates::{BuiltinTemplates, TemplateRenderer};
pub use types::{Policy, PolicyContext, PolicyError, ServiceGrant, TemplateVars, POLICY_VERSION};
