//! Contact list management for the CMS.

use std::sync::Arc;

use tracing::debug;
use tracing::info;

use crate::model::ContactField;
use crate::model::ContactModel;
use crate::repository::Repository;
use crate::repository::error::DatabaseError;
use crate::repository::table::Table;
use crate::service::error::ServiceError;

/// Service for the contact list.
///
/// Keeps `recipient_en` unique and at most one row flagged as default. Each
/// operation runs in a single transaction.
pub struct ContactService {
    db: Arc<Repository>,
}

impl ContactService {
    /// Creates a new contact service.
    pub fn new(db: Arc<Repository>) -> Self {
        Self { db }
    }

    /// Inserts a contact. With `is_default` set, every other row loses its flag first.
    ///
    /// # Performance
    /// * DB calls: 2-3
    pub async fn add_contact(&self, contact: &ContactModel) -> Result<(), ServiceError> {
        let mut tx = self.db.begin().await?;

        if self
            .db
            .contacts
            .select(&mut *tx, &contact.recipient_en)
            .await?
            .is_some()
        {
            return Err(ServiceError::DuplicateKey {
                key: contact.recipient_en.clone(),
            });
        }

        if contact.is_default {
            self.db.contacts.clear_default(&mut *tx).await?;
        }

        self.db
            .contacts
            .insert(&mut *tx, contact)
            .await
            .map_err(|e| ServiceError::from_write(e, &contact.recipient_en))?;

        tx.commit().await.map_err(DatabaseError::from)?;
        info!(
            recipient = %contact.recipient_en,
            is_default = contact.is_default,
            "Contact added"
        );
        Ok(())
    }

    /// Updates one column of the contact keyed by `key`.
    ///
    /// # Performance
    /// * DB calls: 2-3
    pub async fn update_field(
        &self,
        key: &str,
        field: ContactField,
        value: &str,
    ) -> Result<(), ServiceError> {
        let key = key.to_string();
        let mut tx = self.db.begin().await?;

        if self.db.contacts.select(&mut *tx, &key).await?.is_none() {
            return Err(ServiceError::NotFound { key });
        }

        match field {
            ContactField::RecipientEn if value != key => {
                if self
                    .db
                    .contacts
                    .select(&mut *tx, &value.to_string())
                    .await?
                    .is_some()
                {
                    return Err(ServiceError::DuplicateKey {
                        key: value.to_string(),
                    });
                }
            }
            ContactField::RecipientFa => {
                if self
                    .db
                    .contacts
                    .exists_recipient_fa_except(&mut *tx, value, &key)
                    .await?
                {
                    return Err(ServiceError::DuplicateKey {
                        key: value.to_string(),
                    });
                }
            }
            _ => {}
        }

        self.db
            .contacts
            .update_field(&mut *tx, &key, field, value)
            .await
            .map_err(|e| ServiceError::from_write(e, value))?;

        tx.commit().await.map_err(DatabaseError::from)?;
        info!(recipient = %key, %field, "Contact field updated");
        Ok(())
    }

    /// Sets or clears the default flag. Unknown keys are ignored.
    ///
    /// Clearing can leave the list without a default recipient.
    ///
    /// # Performance
    /// * DB calls: 1-3
    pub async fn set_default(&self, key: &str, checked: bool) -> Result<(), ServiceError> {
        let key = key.to_string();
        let mut tx = self.db.begin().await?;

        if self.db.contacts.select(&mut *tx, &key).await?.is_none() {
            debug!(recipient = %key, "set_default on unknown contact ignored");
            return Ok(());
        }

        if checked {
            self.db.contacts.clear_default(&mut *tx).await?;
        }
        self.db
            .contacts
            .set_default_flag(&mut *tx, &key, checked)
            .await
            .map_err(|e| ServiceError::from_write(e, &key))?;

        tx.commit().await.map_err(DatabaseError::from)?;
        info!(recipient = %key, checked, "Default recipient changed");
        Ok(())
    }

    /// Removes a contact. Returns whether a row was removed; unknown keys are not an error.
    ///
    /// # Performance
    /// * DB calls: 1
    pub async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        let key = key.to_string();
        let mut tx = self.db.begin().await?;
        let removed = self.db.contacts.delete(&mut *tx, &key).await?;
        tx.commit().await.map_err(DatabaseError::from)?;

        if removed {
            info!(recipient = %key, "Contact erased");
        } else {
            debug!(recipient = %key, "Erase of unknown contact ignored");
        }
        Ok(removed)
    }

    /// # Performance
    /// * DB calls: 1
    pub async fn get(&self, key: &str) -> Result<Option<ContactModel>, ServiceError> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.contacts.select(&mut *conn, &key.to_string()).await?)
    }

    /// All contacts ordered by `recipient_en` ascending.
    ///
    /// # Performance
    /// * DB calls: 1
    pub async fn list_all(&self) -> Result<Vec<ContactModel>, ServiceError> {
        let mut conn = self.db.acquire().await?;
        Ok(self.db.contacts.select_all(&mut *conn).await?)
    }
}
