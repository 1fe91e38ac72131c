//! `roster-core`: participant ledger domain primitives.
//!
//! This crate contains **pure domain** types and rules (no IO, no storage):
//! identifiers, supported languages, the participant record and its upsert
//! rules, and the listing policy.

pub mod clock;
pub mod error;
pub mod id;
pub mod lang;
pub mod listing;
pub mod participant;

pub use clock::{Clock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::UserId;
pub use lang::Lang;
pub use listing::{ListLimit, ListPolicy};
pub use participant::{ParticipantRecord, Participation, SourceTag};
