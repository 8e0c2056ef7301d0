pub mod auth;
pub mod money_flows;
pub mod system;
