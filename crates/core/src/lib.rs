//! `cashnote-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! versioned entities, strongly-typed identifiers, and the error taxonomy the
//! storage layer classifies into.

pub mod credential;
pub mod entity;
pub mod error;
pub mod id;
pub mod money_flow;
pub mod user;

pub use credential::{AuthProvider, UserAuth};
pub use entity::{Entity, Versioned};
pub use error::{DomainError, DomainResult, StoreError, StoreResult};
pub use id::{AuthProviderId, FlowId, UserAuthId, UserId};
pub use money_flow::MoneyFlow;
pub use user::User;
