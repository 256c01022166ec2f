//! Business logic services for the contact list and the mailing list.

use std::sync::Arc;

use crate::config::Config;
use crate::mail::MailComposer;
use crate::mail::Mailer;
use crate::repository::Repository;
use crate::service::contact_service::ContactService;
use crate::service::subscription_service::SubscriptionService;
use crate::service::subscription_service::TokenGenerator;

pub mod contact_service;
pub mod error;
pub mod subscription_service;

/// Container for all application services.
pub struct Services {
    pub contacts: Arc<ContactService>,
    pub subscription: Arc<SubscriptionService>,
}

impl Services {
    /// Creates and initializes all services.
    pub fn new(
        db: Arc<Repository>,
        config: &Config,
        tokens: Arc<dyn TokenGenerator>,
        mailer: Arc<dyn Mailer>,
    ) -> anyhow::Result<Self> {
        let composer = MailComposer::new(config)?;

        Ok(Self {
            contacts: Arc::new(ContactService::new(db.clone())),
            subscription: Arc::new(SubscriptionService::new(
                db,
                tokens,
                mailer,
                composer,
                config.uuid_max_attempts,
            )),
        })
    }
}
