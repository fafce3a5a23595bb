//! Domain types shared by every EZPass component.

mod answer;
mod locator;
mod mapping;
mod origin;
mod role;

pub use answer::{AccountCandidate, CredentialAnswer, CredentialRecord, RoleAssignment};
pub use locator::{FieldLocator, LocatorShape, PathSegment};
pub use mapping::FieldMapping;
pub use origin::OriginKey;
pub use role::Role;

#[cfg(test)]
#[path = "answer_tests.rs"]
mod answer_tests;
