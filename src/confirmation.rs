//! Ok/Cancel prompts for destructive actions.
//!
//! The router issues a [`PendingConfirmation`] when a destructive button is
//! pressed and only acts on a decision that echoes one it issued. Each prompt
//! is single-use and expires after the configured TTL.

use std::collections::HashMap;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Actions that need an explicit Ok/Cancel before they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmAction {
    EraseContact,
}

/// A question waiting for the user's answer. The client echoes it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub id: Uuid,
    pub action: ConfirmAction,
    pub target: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct IssuedConfirmation {
    action: ConfirmAction,
    target: String,
    expires_at: DateTime<Utc>,
}

pub struct ConfirmationStore {
    ttl: chrono::Duration,
    issued: Mutex<HashMap<Uuid, IssuedConfirmation>>,
}

impl ConfirmationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::minutes(5)),
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub async fn issue(&self, action: ConfirmAction, target: &str) -> PendingConfirmation {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let expires_at = now + self.ttl;

        let mut issued = self.issued.lock().await;
        issued.retain(|_, c| c.expires_at > now);
        issued.insert(
            id,
            IssuedConfirmation {
                action,
                target: target.to_string(),
                expires_at,
            },
        );

        PendingConfirmation {
            id,
            action,
            target: target.to_string(),
            expires_at,
        }
    }

    /// Consumes an issued prompt. Returns `false` for unknown, expired or
    /// altered prompts; only the server-side record is trusted.
    pub async fn take(&self, confirmation: &PendingConfirmation) -> bool {
        let Some(issued) = self.issued.lock().await.remove(&confirmation.id) else {
            return false;
        };
        issued.expires_at > Utc::now()
            && issued.action == confirmation.action
            && issued.target == confirmation.target
    }

    pub async fn outstanding(&self) -> usize {
        self.issued.lock().await.len()
    }
}
