//! MoneyFlow entity: a single expense record owned by a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Versioned};
use crate::error::{DomainError, DomainResult};
use crate::id::{FlowId, UserId};

/// Default currency when the caller omits one.
pub const DEFAULT_CURRENCY: &str = "IDR";

/// An expense record.
///
/// Carries no natural key: two flows with identical fields are distinct
/// records. Tags are a free-form list persisted as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyFlow {
    pub id: FlowId,
    pub user_id: UserId,
    pub category: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MoneyFlow {
    pub fn new(user_id: UserId, amount: f64, currency: impl Into<String>) -> DomainResult<Self> {
        if amount <= 0.0 {
            return Err(DomainError::validation("amount must be greater than 0"));
        }

        let mut currency = currency.into();
        if currency.is_empty() {
            currency = DEFAULT_CURRENCY.to_string();
        }

        let now = Utc::now();
        Ok(Self {
            id: FlowId::new(),
            user_id,
            category: None,
            amount,
            currency,
            description: None,
            tags: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = Some(category.into());
        self.updated_at = Utc::now();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
        self.updated_at = Utc::now();
    }

    pub fn set_amount(&mut self, amount: f64) -> DomainResult<()> {
        if amount <= 0.0 {
            return Err(DomainError::validation("amount must be greater than 0"));
        }
        self.amount = amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.push(tag.into());
        self.updated_at = Utc::now();
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
        self.updated_at = Utc::now();
    }
}

impl Entity for MoneyFlow {
    type Id = FlowId;

    fn id(&self) -> &FlowId {
        &self.id
    }
}

impl Versioned for MoneyFlow {
    fn version(&self) -> i32 {
        self.version
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    fn soft_delete(&mut self) {
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> UserId {
        UserId::new()
    }

    #[test]
    fn rejects_non_positive_amount() {
        assert!(MoneyFlow::new(owner(), 0.0, "IDR").is_err());
        assert!(MoneyFlow::new(owner(), -5.0, "IDR").is_err());
    }

    #[test]
    fn defaults_currency_when_empty() {
        let flow = MoneyFlow::new(owner(), 25_000.0, "").unwrap();
        assert_eq!(flow.currency, DEFAULT_CURRENCY);
    }

    #[test]
    fn new_flow_has_no_tags_and_version_zero() {
        let flow = MoneyFlow::new(owner(), 25_000.0, "IDR").unwrap();
        assert!(flow.tags.is_empty());
        assert_eq!(flow.version, 0);
        assert!(!flow.is_deleted());
    }

    #[test]
    fn set_amount_validates() {
        let mut flow = MoneyFlow::new(owner(), 25_000.0, "IDR").unwrap();
        assert!(flow.set_amount(-1.0).is_err());
        assert_eq!(flow.amount, 25_000.0);
        flow.set_amount(30_000.0).unwrap();
        assert_eq!(flow.amount, 30_000.0);
    }

    #[test]
    fn field_setters_do_not_bump_version() {
        let mut flow = MoneyFlow::new(owner(), 25_000.0, "IDR").unwrap();
        flow.set_category("food");
        flow.set_description("lunch");
        flow.add_tag("warung");
        flow.set_tags(vec!["warung".into(), "cash".into()]);
        assert_eq!(flow.version, 0);
    }
}
