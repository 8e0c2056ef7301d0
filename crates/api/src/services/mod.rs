//! Service layer: orchestration between HTTP handlers and the store.

pub mod auth;
pub mod error;
pub mod money_flow;

pub use auth::{AuthService, TokenPair, EMAIL_PASSWORD_PROVIDER};
pub use error::ServiceError;
pub use money_flow::{FlowPatch, FlowSummary, MoneyFlowService, NewFlow};
