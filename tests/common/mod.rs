//! Common test utilities and mock implementations.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cms_forms::config::Config;
use cms_forms::mail::MailError;
use cms_forms::mail::MailMessage;
use cms_forms::mail::Mailer;
use cms_forms::repository::Repository;
use cms_forms::service::Services;
use cms_forms::service::subscription_service::TokenGenerator;
use cms_forms::service::subscription_service::UuidTokenGenerator;
use mockall::mock;
use uuid::Uuid;

/// Sets up a temporary test database.
pub async fn setup_db() -> (Arc<Repository>, PathBuf) {
    let uuid = Uuid::new_v4();
    let db_path = std::env::temp_dir().join(format!("cms-forms-test-{}.db", uuid));
    let db_url = format!("sqlite://{}", db_path.to_str().unwrap());

    let db = Repository::new(&db_url, db_path.to_str().unwrap())
        .await
        .expect("Failed to create database");

    db.run_migrations().await.expect("Failed to run migrations");

    (Arc::new(db), db_path)
}

/// Cleans up the test database file.
pub async fn teardown_db(db: Arc<Repository>, db_path: PathBuf) {
    db.close().await;
    if db_path.exists() {
        let _ = std::fs::remove_file(db_path);
    }
}

// MOCKS

mock! {
    pub Tokens {}

    impl TokenGenerator for Tokens {
        fn generate(&self) -> String;
    }
}

mock! {
    pub Mailer {}

    #[async_trait]
    impl Mailer for Mailer {
        async fn send(&self, message: MailMessage) -> Result<(), MailError>;
    }
}

/// A mailer that accepts any number of messages.
#[allow(dead_code)]
pub fn quiet_mailer() -> MockMailer {
    let mut mailer = MockMailer::new();
    mailer.expect_send().returning(|_| Ok(()));
    mailer
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        public_url: "https://cms.test".to_string(),
        mail_sender: "news@cms.test".to_string(),
        uuid_max_attempts: 3,
        ..Config::default()
    }
}

/// Builds services with real tokens and a quiet mailer.
#[allow(dead_code)]
pub fn services(db: Arc<Repository>) -> Arc<Services> {
    services_with(db, Arc::new(UuidTokenGenerator), Arc::new(quiet_mailer()))
}

#[allow(dead_code)]
pub fn services_with(
    db: Arc<Repository>,
    tokens: Arc<dyn TokenGenerator>,
    mailer: Arc<dyn Mailer>,
) -> Arc<Services> {
    Arc::new(
        Services::new(db, &test_config(), tokens, mailer).expect("Failed to build services"),
    )
}
