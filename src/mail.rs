//! Confirmation mail composition and dispatch.
//!
//! Delivery itself is a collaborator behind [`Mailer`]. The bundled
//! [`LogMailer`] only records messages in the log.

use derive_builder::Builder;
use minijinja::Environment;
use minijinja::context;
use tracing::info;

use crate::config::Config;
use crate::model::SubscriberModel;
use crate::model::Subscription;

const SUBSCRIBE_TEMPLATE: &str = "\
Hello,

We received a request to send {{ languages }} newsletters to {{ inbox }}.

To confirm, open:
{{ confirm_url }}

If you did not ask for this, discard the request:
{{ cancel_url }}
";

const UNSUBSCRIBE_TEMPLATE: &str = "\
Hello,

We received a request to change the newsletters sent to {{ inbox }}.
{% if languages == \"no\" %}You will no longer receive any newsletter.{% else %}You will keep receiving {{ languages }} newsletters.{% endif %}

To confirm, open:
{{ confirm_url }}

To keep your current subscription, open:
{{ cancel_url }}
";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MailError {
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Invalid message: {0}")]
    Build(#[from] MailMessageBuilderError),

    #[error("Delivery failed: {message}")]
    Delivery { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Writes outgoing mail to the log instead of delivering it.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            "Outgoing mail:\n{}",
            message.body
        );
        Ok(())
    }
}

/// Renders confirmation mail for subscription requests.
pub struct MailComposer {
    env: Environment<'static>,
    sender: String,
    public_url: String,
}

impl MailComposer {
    pub fn new(config: &Config) -> Result<Self, MailError> {
        let mut env = Environment::new();
        env.add_template("subscribe", SUBSCRIBE_TEMPLATE)?;
        env.add_template("unsubscribe", UNSUBSCRIBE_TEMPLATE)?;

        Ok(Self {
            env,
            sender: config.mail_sender.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn confirm_url(&self, uuid: &str) -> String {
        format!("{}/subscription/confirm/{}", self.public_url, uuid)
    }

    pub fn cancel_url(&self, uuid: &str) -> String {
        format!("{}/subscription/cancel/{}", self.public_url, uuid)
    }

    pub fn subscribe_confirmation(
        &self,
        subscriber: &SubscriberModel,
    ) -> Result<MailMessage, MailError> {
        self.compose("subscribe", "Confirm your newsletter subscription", subscriber)
    }

    pub fn unsubscribe_confirmation(
        &self,
        subscriber: &SubscriberModel,
    ) -> Result<MailMessage, MailError> {
        self.compose("unsubscribe", "Confirm your newsletter change", subscriber)
    }

    fn compose(
        &self,
        template: &str,
        subject: &str,
        subscriber: &SubscriberModel,
    ) -> Result<MailMessage, MailError> {
        let pending = subscriber.pending_subscription.unwrap_or_default();
        let body = self.env.get_template(template)?.render(context! {
            inbox => subscriber.inbox,
            languages => languages_text(pending),
            confirm_url => self.confirm_url(&subscriber.uuid),
            cancel_url => self.cancel_url(&subscriber.uuid),
        })?;

        Ok(MailMessageBuilder::default()
            .from(self.sender.as_str())
            .to(subscriber.inbox.as_str())
            .subject(subject)
            .body(body)
            .build()?)
    }
}

fn languages_text(subscription: Subscription) -> &'static str {
    match subscription {
        Subscription::None => "no",
        Subscription::En => "English",
        Subscription::Fa => "Persian",
        Subscription::EnFa => "English and Persian",
    }
}
