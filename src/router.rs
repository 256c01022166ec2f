//! Request dispatch for the contact editor and the subscription pages.
//!
//! Every form submission is a [`Request`]; the router validates it, calls one
//! service operation and answers with a [`Response`] for the UI to render.
//! Datastore failures are logged here and reduced to a generic message.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::error;
use uuid::Uuid;

use crate::captcha::CaptchaChallenge;
use crate::captcha::CaptchaStore;
use crate::config::Config;
pub use crate::confirmation::ConfirmAction;
use crate::confirmation::ConfirmationStore;
pub use crate::confirmation::PendingConfirmation;
use crate::form::ContactForm;
use crate::form::FormRules;
use crate::form::SubscribeForm;
use crate::form::UnsubscribeForm;
use crate::form::ValidationError;
use crate::model::ContactField;
use crate::model::ContactModel;
use crate::model::Language;
use crate::model::Subscription;
use crate::service::Services;
use crate::service::error::ServiceError;
use crate::service::subscription_service::SubscribeResult;

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogChoice {
    Ok,
    Cancel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    ListContacts,
    AddContact(ContactForm),
    UpdateContactField {
        key: String,
        field: ContactField,
        value: String,
    },
    SetDefaultContact {
        key: String,
        checked: bool,
    },
    /// Erase button pressed; answers with a confirmation prompt.
    EraseContact {
        key: String,
        #[serde(default)]
        language: Option<Language>,
    },
    ConfirmErase {
        confirmation: PendingConfirmation,
        choice: DialogChoice,
    },
    NewCaptcha,
    Subscribe(SubscribeForm),
    /// Opening the unsubscribe link from a mail.
    OpenUnsubscribe {
        uuid: String,
    },
    Unsubscribe(UnsubscribeForm),
    Confirm {
        uuid: String,
    },
    Cancel {
        uuid: String,
    },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::ListContacts => "list_contacts",
            Request::AddContact(_) => "add_contact",
            Request::UpdateContactField { .. } => "update_contact_field",
            Request::SetDefaultContact { .. } => "set_default_contact",
            Request::EraseContact { .. } => "erase_contact",
            Request::ConfirmErase { .. } => "confirm_erase",
            Request::NewCaptcha => "new_captcha",
            Request::Subscribe(_) => "subscribe",
            Request::OpenUnsubscribe { .. } => "open_unsubscribe",
            Request::Unsubscribe(_) => "unsubscribe",
            Request::Confirm { .. } => "confirm",
            Request::Cancel { .. } => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Contacts {
        contacts: Vec<ContactModel>,
    },
    ConfirmPending {
        confirmation: PendingConfirmation,
        question: String,
    },
    Captcha(CaptchaChallenge),
    Subscribed {
        inbox: String,
        created: bool,
    },
    UnsubscribeForm {
        inbox: String,
        uuid: String,
    },
    UnsubscribeRequested {
        inbox: String,
    },
    Confirmed {
        inbox: String,
        subscription: Subscription,
    },
    Cancelled {
        inbox: String,
        subscription: Subscription,
    },
    Invalid {
        field: String,
        message: String,
    },
    Error {
        message: String,
    },
}

pub struct Router {
    services: Arc<Services>,
    captcha: CaptchaStore,
    confirmations: ConfirmationStore,
    rules: FormRules,
}

impl Router {
    pub fn new(services: Arc<Services>, config: &Config) -> Self {
        Self {
            services,
            captcha: CaptchaStore::new(config.captcha_ttl),
            confirmations: ConfirmationStore::new(config.confirm_ttl),
            rules: FormRules::new(config),
        }
    }

    /// Handles one request. Never fails; errors become [`Response::Invalid`]
    /// or [`Response::Error`].
    pub async fn handle(&self, request: Request) -> Response {
        let action = request.name();
        debug!(action, "Handling request");
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => error_response(action, err),
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response, ServiceError> {
        let contacts = &self.services.contacts;
        let subscription = &self.services.subscription;

        match request {
            Request::ListContacts => self.contacts_response().await,
            Request::AddContact(form) => {
                let contact = form.validate(&self.rules)?;
                contacts.add_contact(&contact).await?;
                self.contacts_response().await
            }
            Request::UpdateContactField { key, field, value } => {
                let value = self.rules.contact_field(field, &value)?;
                contacts.update_field(&key, field, &value).await?;
                self.contacts_response().await
            }
            Request::SetDefaultContact { key, checked } => {
                contacts.set_default(&key, checked).await?;
                self.contacts_response().await
            }
            Request::EraseContact { key, language } => {
                let name = match (language, contacts.get(&key).await?) {
                    (Some(Language::Fa), Some(contact)) => contact.recipient_fa,
                    _ => key.clone(),
                };
                let confirmation = self
                    .confirmations
                    .issue(ConfirmAction::EraseContact, &key)
                    .await;
                Ok(Response::ConfirmPending {
                    confirmation,
                    question: format!("Are you sure you want to erase {name}?"),
                })
            }
            Request::ConfirmErase {
                confirmation,
                choice,
            } => {
                let issued = self.confirmations.take(&confirmation).await;
                match (choice, issued) {
                    (DialogChoice::Cancel, _) => {}
                    (DialogChoice::Ok, false) => return Err(ServiceError::ConfirmationExpired),
                    (DialogChoice::Ok, true) => match confirmation.action {
                        ConfirmAction::EraseContact => {
                            contacts.delete(&confirmation.target).await?;
                        }
                    },
                }
                self.contacts_response().await
            }
            Request::NewCaptcha => Ok(Response::Captcha(self.captcha.issue().await)),
            Request::Subscribe(form) => {
                let (inbox, languages) = form.validate(&self.rules)?;
                self.check_captcha(&form.captcha_id, &form.captcha_answer)
                    .await?;
                let result = subscription.request_subscribe(&inbox, languages).await?;
                Ok(Response::Subscribed {
                    inbox,
                    created: matches!(result, SubscribeResult::Created { .. }),
                })
            }
            Request::OpenUnsubscribe { uuid } => {
                let inbox = subscription.lookup_inbox(&uuid).await?;
                Ok(Response::UnsubscribeForm { inbox, uuid })
            }
            Request::Unsubscribe(form) => {
                let (inbox, languages) = form.validate(&self.rules)?;
                self.check_captcha(&form.captcha_id, &form.captcha_answer)
                    .await?;
                let subscriber = subscription
                    .request_unsubscribe(&inbox, &form.uuid, languages)
                    .await?;
                Ok(Response::UnsubscribeRequested {
                    inbox: subscriber.inbox,
                })
            }
            Request::Confirm { uuid } => {
                let subscriber = subscription.confirm(&uuid).await?;
                Ok(Response::Confirmed {
                    inbox: subscriber.inbox,
                    subscription: subscriber.subscription,
                })
            }
            Request::Cancel { uuid } => {
                let subscriber = subscription.cancel(&uuid).await?;
                Ok(Response::Cancelled {
                    inbox: subscriber.inbox,
                    subscription: subscriber.subscription,
                })
            }
        }
    }

    async fn contacts_response(&self) -> Result<Response, ServiceError> {
        Ok(Response::Contacts {
            contacts: self.services.contacts.list_all().await?,
        })
    }

    async fn check_captcha(&self, id: &Uuid, answer: &str) -> Result<(), ValidationError> {
        if self.captcha.verify(id, answer).await {
            Ok(())
        } else {
            Err(ValidationError::CaptchaMismatch)
        }
    }
}

fn error_response(action: &'static str, err: ServiceError) -> Response {
    if err.is_datastore_error() {
        error!(action, error = %err, "Request failed");
        return Response::Error {
            message: GENERIC_ERROR_MESSAGE.to_string(),
        };
    }

    debug!(action, error = %err, "Request rejected");
    match err {
        ServiceError::Validation(v) => Response::Invalid {
            field: v.field().to_string(),
            message: v.to_string(),
        },
        ServiceError::DuplicateKey { key } => Response::Error {
            message: format!("\"{key}\" already exists."),
        },
        ServiceError::NotFound { key } => Response::Error {
            message: format!("\"{key}\" could not be found."),
        },
        ServiceError::InvalidToken => Response::Error {
            message: "This link is invalid or no longer valid.".to_string(),
        },
        ServiceError::ConfirmationExpired => Response::Error {
            message: "This confirmation has expired. Please try again.".to_string(),
        },
        other => {
            error!(action, error = %other, "Unhandled request error");
            Response::Error {
                message: GENERIC_ERROR_MESSAGE.to_string(),
            }
        }
    }
}
