use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use sqlx::FromRow;

/// A content language a subscriber can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fa,
}

/// The set of languages checked on a subscribe/unsubscribe form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Languages {
    #[serde(default)]
    pub en: bool,
    #[serde(default)]
    pub fa: bool,
}

impl Languages {
    pub const NONE: Languages = Languages { en: false, fa: false };
    pub const EN: Languages = Languages { en: true, fa: false };
    pub const FA: Languages = Languages { en: false, fa: true };
    pub const BOTH: Languages = Languages { en: true, fa: true };

    pub fn is_empty(&self) -> bool {
        !self.en && !self.fa
    }

    pub fn contains(&self, language: Language) -> bool {
        match language {
            Language::En => self.en,
            Language::Fa => self.fa,
        }
    }

    /// Languages that are not in this set.
    pub fn complement(&self) -> Languages {
        Languages {
            en: !self.en,
            fa: !self.fa,
        }
    }

    pub fn is_subset(&self, other: &Languages) -> bool {
        (!self.en || other.en) && (!self.fa || other.fa)
    }
}

impl FromIterator<Language> for Languages {
    fn from_iter<I: IntoIterator<Item = Language>>(iter: I) -> Self {
        iter.into_iter().fold(Languages::NONE, |mut acc, lang| {
            match lang {
                Language::En => acc.en = true,
                Language::Fa => acc.fa = true,
            }
            acc
        })
    }
}

/// Mailing-list subscription value as stored in the `subscribers` table.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Subscription {
    #[default]
    None,
    En,
    Fa,
    EnFa,
}

impl Subscription {
    pub fn from_languages(languages: Languages) -> Self {
        match (languages.en, languages.fa) {
            (true, true) => Subscription::EnFa,
            (true, false) => Subscription::En,
            (false, true) => Subscription::Fa,
            (false, false) => Subscription::None,
        }
    }

    pub fn languages(&self) -> Languages {
        match self {
            Subscription::None => Languages::NONE,
            Subscription::En => Languages::EN,
            Subscription::Fa => Languages::FA,
            Subscription::EnFa => Languages::BOTH,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subscription::None => "none",
            Subscription::En => "en",
            Subscription::Fa => "fa",
            Subscription::EnFa => "en_fa",
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recipient in the CMS contact list.
///
/// `recipient_en` is the primary key. At most one row carries `is_default`.
#[derive(FromRow, Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct ContactModel {
    pub recipient_en: String,
    pub recipient_fa: String,
    pub email: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Contact columns that can be edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    RecipientEn,
    RecipientFa,
    Email,
}

impl ContactField {
    pub fn column(&self) -> &'static str {
        match self {
            ContactField::RecipientEn => "recipient_en",
            ContactField::RecipientFa => "recipient_fa",
            ContactField::Email => "email",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A mailing-list subscriber.
///
/// `subscription` only changes on confirmation; `pending_subscription` holds
/// the latest unconfirmed request, or `None` when nothing is awaiting
/// confirmation.
#[derive(FromRow, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SubscriberModel {
    pub inbox: String,
    pub uuid: String,
    pub subscription: Subscription,
    pub pending_subscription: Option<Subscription>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriberModel {
    pub fn state(&self) -> SubscriberState {
        match (self.subscription, self.pending_subscription) {
            (Subscription::None, None) => SubscriberState::Unsubscribed,
            (_, None) => SubscriberState::Confirmed,
            (_, Some(Subscription::None)) => SubscriberState::PendingUnsubscription,
            (Subscription::None, Some(_)) => SubscriberState::PendingConfirmation,
            (confirmed, Some(pending)) => {
                let pending = pending.languages();
                let confirmed = confirmed.languages();
                if pending != confirmed && pending.is_subset(&confirmed) {
                    SubscriberState::PendingUnsubscription
                } else {
                    SubscriberState::PendingConfirmation
                }
            }
        }
    }
}

/// Lifecycle position of a subscriber.
///
/// Derived from the stored row only, so history is not visible: a first
/// request that was cancelled before confirmation reads as `Unsubscribed`,
/// the same as a confirmed subscriber who later dropped every language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberState {
    /// No row for the inbox.
    Unregistered,
    /// A request adds languages that are not yet confirmed.
    PendingConfirmation,
    /// Active subscription, nothing pending.
    Confirmed,
    /// A request drops languages, or asks for none at all.
    PendingUnsubscription,
    /// No active subscription and nothing pending.
    Unsubscribed,
}
