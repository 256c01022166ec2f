//! Mailing-list subscription lifecycle.
//!
//! ```text
//! Unregistered -> PendingConfirmation -> Confirmed
//! Confirmed | PendingConfirmation -> PendingUnsubscription -> Unsubscribed
//! ```
//!
//! Requests only ever touch `pending_subscription`. `confirm` promotes it into
//! `subscription`; `cancel` discards it.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use tracing::warn;
use uuid::Uuid;

use crate::form::is_valid_email;
use crate::form::normalize_inbox;
use crate::mail::MailComposer;
use crate::mail::MailError;
use crate::mail::MailMessage;
use crate::mail::Mailer;
use crate::model::Languages;
use crate::model::SubscriberModel;
use crate::model::SubscriberState;
use crate::model::Subscription;
use crate::repository::Repository;
use crate::repository::error::DatabaseError;
use crate::repository::table::Table;
use crate::service::error::ServiceError;

/// Source of opaque subscriber tokens.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs.
pub struct UuidTokenGenerator;

impl TokenGenerator for UuidTokenGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Outcome of a subscribe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeResult {
    /// First request for this inbox; a new row and token were created.
    Created { subscriber: SubscriberModel },
    /// The inbox was known; only its pending request changed.
    Updated { subscriber: SubscriberModel },
}

impl SubscribeResult {
    pub fn subscriber(&self) -> &SubscriberModel {
        match self {
            SubscribeResult::Created { subscriber } | SubscribeResult::Updated { subscriber } => {
                subscriber
            }
        }
    }
}

pub struct SubscriptionService {
    db: Arc<Repository>,
    tokens: Arc<dyn TokenGenerator>,
    mailer: Arc<dyn Mailer>,
    composer: MailComposer,
    max_token_attempts: u32,
}

impl SubscriptionService {
    pub fn new(
        db: Arc<Repository>,
        tokens: Arc<dyn TokenGenerator>,
        mailer: Arc<dyn Mailer>,
        composer: MailComposer,
        max_token_attempts: u32,
    ) -> Self {
        Self {
            db,
            tokens,
            mailer,
            composer,
            max_token_attempts: max_token_attempts.max(1),
        }
    }

    /// Records a subscribe request for `inbox`, compared case-insensitively.
    ///
    /// Unknown inboxes get a new row with a fresh token and `subscription =
    /// none`. Known inboxes keep their token and confirmed subscription; only
    /// the pending request is replaced.
    ///
    /// # Performance
    /// * DB calls: 2 + token retries
    pub async fn request_subscribe(
        &self,
        inbox: &str,
        languages: Languages,
    ) -> Result<SubscribeResult, ServiceError> {
        let pending = Subscription::from_languages(languages);
        let now = Utc::now();
        let inbox = normalize_inbox(inbox);

        let mut tx = self.db.begin().await?;
        let result = match self.db.subscribers.select(&mut *tx, &inbox).await? {
            None => {
                let uuid = self.unique_token(&mut *tx).await?;
                let subscriber = SubscriberModel {
                    inbox: inbox.clone(),
                    uuid,
                    subscription: Subscription::None,
                    pending_subscription: Some(pending),
                    updated_at: now,
                };
                self.db
                    .subscribers
                    .insert(&mut *tx, &subscriber)
                    .await
                    .map_err(|e| ServiceError::from_write(e, &inbox))?;
                SubscribeResult::Created { subscriber }
            }
            Some(mut subscriber) => {
                self.db
                    .subscribers
                    .update_pending(&mut *tx, &inbox, Some(pending), now)
                    .await?;
                subscriber.pending_subscription = Some(pending);
                subscriber.updated_at = now;
                SubscribeResult::Updated { subscriber }
            }
        };
        tx.commit().await.map_err(DatabaseError::from)?;

        info!(inbox = %inbox, %pending, "Subscribe request recorded");
        self.notify(
            self.composer
                .subscribe_confirmation(result.subscriber()),
        )
        .await;
        Ok(result)
    }

    /// Records an unsubscribe request reached through a mailed link.
    ///
    /// `uuid` must belong to `inbox`. The requested target keeps the languages
    /// that were *not* checked, and waits for confirmation like any other
    /// request.
    ///
    /// # Performance
    /// * DB calls: 2
    pub async fn request_unsubscribe(
        &self,
        inbox: &str,
        uuid: &str,
        languages: Languages,
    ) -> Result<SubscriberModel, ServiceError> {
        let inbox = normalize_inbox(inbox);
        if !is_valid_email(&inbox) {
            return Err(ServiceError::InvalidToken);
        }

        let target = Subscription::from_languages(languages.complement());
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        let mut subscriber = self
            .db
            .subscribers
            .select_by_uuid(&mut *tx, uuid)
            .await?
            .filter(|s| s.inbox == inbox)
            .ok_or(ServiceError::InvalidToken)?;

        self.db
            .subscribers
            .update_pending(&mut *tx, &subscriber.inbox, Some(target), now)
            .await?;
        tx.commit().await.map_err(DatabaseError::from)?;

        subscriber.pending_subscription = Some(target);
        subscriber.updated_at = now;

        info!(inbox = %subscriber.inbox, %target, "Unsubscribe request recorded");
        self.notify(self.composer.unsubscribe_confirmation(&subscriber))
            .await;
        Ok(subscriber)
    }

    /// Applies the pending request: `subscription = pending`, pending cleared.
    ///
    /// Confirming with nothing pending leaves the row unchanged.
    ///
    /// # Performance
    /// * DB calls: 3
    pub async fn confirm(&self, uuid: &str) -> Result<SubscriberModel, ServiceError> {
        let mut tx = self.db.begin().await?;
        let before = self
            .db
            .subscribers
            .select_by_uuid(&mut *tx, uuid)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        if before.pending_subscription.is_none() {
            return Ok(before);
        }

        self.db
            .subscribers
            .promote_pending(&mut *tx, uuid, Utc::now())
            .await?;
        let after = self
            .db
            .subscribers
            .select_by_uuid(&mut *tx, uuid)
            .await?
            .ok_or_else(|| ServiceError::UnexpectedResult {
                message: format!("Subscriber {} vanished while confirming", before.inbox),
            })?;
        tx.commit().await.map_err(DatabaseError::from)?;

        info!(
            inbox = %after.inbox,
            from = %before.subscription,
            to = %after.subscription,
            "Subscription confirmed"
        );
        Ok(after)
    }

    /// Discards the pending request; the confirmed subscription is untouched.
    ///
    /// # Performance
    /// * DB calls: 2
    pub async fn cancel(&self, uuid: &str) -> Result<SubscriberModel, ServiceError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut subscriber = self
            .db
            .subscribers
            .select_by_uuid(&mut *tx, uuid)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        self.db
            .subscribers
            .update_pending(&mut *tx, &subscriber.inbox, None, now)
            .await?;
        tx.commit().await.map_err(DatabaseError::from)?;

        subscriber.pending_subscription = None;
        subscriber.updated_at = now;
        info!(inbox = %subscriber.inbox, "Pending subscription request cancelled");
        Ok(subscriber)
    }

    /// Resolves the inbox a token belongs to, for pre-filling the unsubscribe form.
    ///
    /// # Performance
    /// * DB calls: 1
    pub async fn lookup_inbox(&self, uuid: &str) -> Result<String, ServiceError> {
        let mut conn = self.db.acquire().await?;
        self.db
            .subscribers
            .select_by_uuid(&mut *conn, uuid)
            .await?
            .map(|s| s.inbox)
            .ok_or(ServiceError::InvalidToken)
    }

    /// # Performance
    /// * DB calls: 1
    pub async fn get_subscriber(&self, inbox: &str) -> Result<Option<SubscriberModel>, ServiceError> {
        let mut conn = self.db.acquire().await?;
        Ok(self
            .db
            .subscribers
            .select(&mut *conn, &normalize_inbox(inbox))
            .await?)
    }

    /// # Performance
    /// * DB calls: 1
    pub async fn state(&self, inbox: &str) -> Result<SubscriberState, ServiceError> {
        Ok(self
            .get_subscriber(inbox)
            .await?
            .map_or(SubscriberState::Unregistered, |s| s.state()))
    }

    /// Draws tokens until one is not used by any row.
    async fn unique_token(
        &self,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<String, ServiceError> {
        for attempt in 1..=self.max_token_attempts {
            let token = self.tokens.generate();
            if !self.db.subscribers.exists_by_uuid(&mut *conn, &token).await? {
                return Ok(token);
            }
            warn!(attempt, "Subscriber token collision, retrying");
        }
        Err(ServiceError::UnexpectedResult {
            message: format!(
                "Could not generate a unique subscriber token after {} attempts",
                self.max_token_attempts
            ),
        })
    }

    /// Mail failures never undo a recorded request.
    async fn notify(&self, message: Result<MailMessage, MailError>) {
        let result = match message {
            Ok(message) => self.mailer.send(message).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to send confirmation mail: {e}");
        }
    }
}
