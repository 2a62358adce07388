use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainError, Entity, RecordId, SyncMarker};

/// Customer status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Prospect,
    Active,
    Inactive,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Prospect => "prospect",
            CustomerStatus::Active => "active",
            CustomerStatus::Inactive => "inactive",
        }
    }
}

/// Input for a new customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl CustomerDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        validate_email(&self.email)
    }

    pub fn into_customer(
        self,
        id: RecordId,
        status: CustomerStatus,
        sync_status: SyncMarker,
        now: DateTime<Utc>,
    ) -> Result<Customer, DomainError> {
        self.validate()?;
        Ok(Customer {
            id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone: self.phone,
            address: self.address,
            status,
            created_at: now,
            sync_status,
        })
    }
}

/// Customer as cached on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_status: SyncMarker,
}

impl Entity for Customer {
    fn id(&self) -> &RecordId {
        &self.id
    }
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(DomainError::validation("email must contain exactly one '@'"));
    };
    if local.is_empty() {
        return Err(DomainError::validation("email local part is empty"));
    }
    if domain.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(DomainError::validation("email domain is invalid"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("email cannot contain whitespace"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft(email: &str) -> CustomerDraft {
        CustomerDraft {
            name: "  Acme Hardware ".to_string(),
            email: email.to_string(),
            phone: Some("+1 555 0100".to_string()),
            address: None,
        }
    }

    #[test]
    fn into_customer_normalizes_name_and_email() {
        let customer = draft("Buyer@Acme.COM")
            .into_customer(
                RecordId::new_local(),
                CustomerStatus::Prospect,
                SyncMarker::Pending,
                Utc::now(),
            )
            .unwrap();

        assert_eq!(customer.name, "Acme Hardware");
        assert_eq!(customer.email, "buyer@acme.com");
        assert_eq!(customer.status, CustomerStatus::Prospect);
        assert!(customer.id.is_local());
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut d = draft("a@b.co");
        d.name = "   ".to_string();
        assert!(matches!(d.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for bad in ["", "no-at-sign", "@acme.com", "a@", "a@b@c.com", "a@acme", "a@.com", "a b@c.com"] {
            assert!(validate_email(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn plain_emails_are_accepted() {
        assert!(validate_email("buyer@acme.com").is_ok());
        assert!(validate_email("first.last@sub.example.org").is_ok());
    }

    proptest! {
        #[test]
        fn generated_addresses_validate(
            local in "[a-z][a-z0-9._]{0,15}",
            domain in "[a-z]{1,10}",
            tld in "[a-z]{2,4}",
        ) {
            let email = format!("{local}@{domain}.{tld}");
            prop_assert!(validate_email(&email).is_ok());
        }
    }
}
