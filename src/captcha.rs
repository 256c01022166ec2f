//! Arithmetic captcha challenges for the public forms.
//!
//! Only the challenge id and question ever leave the process. Challenges are
//! single-use and expire after the configured TTL.

use std::collections::HashMap;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// What a client gets to render.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CaptchaChallenge {
    pub id: Uuid,
    pub question: String,
}

#[derive(Debug, Clone)]
struct IssuedChallenge {
    answer: i64,
    expires_at: DateTime<Utc>,
}

pub struct CaptchaStore {
    ttl: chrono::Duration,
    issued: Mutex<HashMap<Uuid, IssuedChallenge>>,
}

impl CaptchaStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::minutes(5)),
            issued: Mutex::new(HashMap::new()),
        }
    }

    /// Issues a fresh `a + b` challenge.
    pub async fn issue(&self) -> CaptchaChallenge {
        let (a, b) = {
            let mut rng = rand::rng();
            (rng.random_range(1..=9i64), rng.random_range(1..=9i64))
        };
        self.insert(a, b).await
    }

    async fn insert(&self, a: i64, b: i64) -> CaptchaChallenge {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let mut issued = self.issued.lock().await;
        issued.retain(|_, c| c.expires_at > now);
        issued.insert(
            id,
            IssuedChallenge {
                answer: a + b,
                expires_at: now + self.ttl,
            },
        );

        CaptchaChallenge {
            id,
            question: format!("{a} + {b}"),
        }
    }

    /// Checks an answer. The challenge is consumed whether or not it matches.
    pub async fn verify(&self, id: &Uuid, answer: &str) -> bool {
        let Some(challenge) = self.issued.lock().await.remove(id) else {
            return false;
        };
        if challenge.expires_at <= Utc::now() {
            return false;
        }
        answer
            .trim()
            .parse::<i64>()
            .is_ok_and(|given| given == challenge.answer)
    }

    pub async fn outstanding(&self) -> usize {
        self.issued.lock().await.len()
    }
}
