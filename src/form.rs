//! Form field validation.
//!
//! Every check here runs before any datastore call so a rejected submission
//! never produces a partial write.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::Config;
use crate::model::ContactField;
use crate::model::ContactModel;
use crate::model::Languages;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+\-]+@[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)*\.[a-z]{2,}$")
        .expect("email pattern is a valid regex")
});

/// Whether `value` looks like a deliverable email address.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

/// Canonical form of a subscriber inbox: trimmed and lowercased.
pub fn normalize_inbox(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },

    #[error("{field} is not a valid email address")]
    InvalidEmail { field: &'static str },

    #[error("At least one language must be selected")]
    NoLanguageSelected,

    #[error("Captcha answer is incorrect or has expired")]
    CaptchaMismatch,
}

impl ValidationError {
    /// Name of the offending form field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Required { field }
            | ValidationError::Length { field, .. }
            | ValidationError::InvalidEmail { field } => field,
            ValidationError::NoLanguageSelected => "languages",
            ValidationError::CaptchaMismatch => "captcha",
        }
    }
}

/// Field rules shared by all forms.
#[derive(Debug, Clone)]
pub struct FormRules {
    pub min_name_len: usize,
    pub max_name_len: usize,
}

impl Default for FormRules {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl FormRules {
    pub fn new(config: &Config) -> Self {
        Self {
            min_name_len: config.min_recipient_name_len,
            max_name_len: config.max_recipient_name_len,
        }
    }

    pub fn recipient_name(&self, field: &'static str, value: &str) -> Result<String, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::Required { field });
        }
        let len = value.chars().count();
        if len < self.min_name_len || len > self.max_name_len {
            return Err(ValidationError::Length {
                field,
                min: self.min_name_len,
                max: self.max_name_len,
            });
        }
        Ok(value.to_string())
    }

    pub fn email(&self, field: &'static str, value: &str) -> Result<String, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::Required { field });
        }
        if !is_valid_email(value) {
            return Err(ValidationError::InvalidEmail { field });
        }
        Ok(value.to_string())
    }

    /// A subscriber address; one inbox per mailbox regardless of case.
    pub fn inbox(&self, value: &str) -> Result<String, ValidationError> {
        self.email("inbox", value).map(|v| normalize_inbox(&v))
    }

    pub fn languages(&self, languages: Languages) -> Result<Languages, ValidationError> {
        if languages.is_empty() {
            return Err(ValidationError::NoLanguageSelected);
        }
        Ok(languages)
    }

    /// Validates an in-place edit of a single contact column.
    pub fn contact_field(&self, field: ContactField, value: &str) -> Result<String, ValidationError> {
        match field {
            ContactField::RecipientEn => self.recipient_name("recipient_en", value),
            ContactField::RecipientFa => self.recipient_name("recipient_fa", value),
            ContactField::Email => self.email("email", value),
        }
    }
}

/// Submission of the "add contact" form.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub recipient_en: String,
    pub recipient_fa: String,
    pub email: String,
    #[serde(default)]
    pub is_default: bool,
}

impl ContactForm {
    pub fn validate(&self, rules: &FormRules) -> Result<ContactModel, ValidationError> {
        Ok(ContactModel {
            recipient_en: rules.recipient_name("recipient_en", &self.recipient_en)?,
            recipient_fa: rules.recipient_name("recipient_fa", &self.recipient_fa)?,
            email: rules.email("email", &self.email)?,
            is_default: self.is_default,
        })
    }
}

/// Submission of the public subscribe form.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeForm {
    pub inbox: String,
    pub languages: Languages,
    pub captcha_id: Uuid,
    pub captcha_answer: String,
}

impl SubscribeForm {
    /// Returns the trimmed inbox and the selected languages.
    pub fn validate(&self, rules: &FormRules) -> Result<(String, Languages), ValidationError> {
        let inbox = rules.inbox(&self.inbox)?;
        let languages = rules.languages(self.languages)?;
        Ok((inbox, languages))
    }
}

/// Submission of the public unsubscribe form, reached through a mailed link.
#[derive(Debug, Clone, Deserialize)]
pub struct UnsubscribeForm {
    pub inbox: String,
    pub uuid: String,
    pub languages: Languages,
    pub captcha_id: Uuid,
    pub captcha_answer: String,
}

impl UnsubscribeForm {
    pub fn validate(&self, rules: &FormRules) -> Result<(String, Languages), ValidationError> {
        let inbox = rules.inbox(&self.inbox)?;
        let languages = rules.languages(self.languages)?;
        Ok((inbox, languages))
    }
}
