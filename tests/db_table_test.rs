use chrono::Utc;
use cms_forms::model::ContactField;
use cms_forms::model::ContactModel;
use cms_forms::model::SubscriberModel;
use cms_forms::model::Subscription;
use cms_forms::repository::table::Table;
use cms_forms::repository::table::TableBase;

mod common;

// --- 1. Test Harness Macro ---
// Handles setup, execution, and teardown automatically.
macro_rules! db_test {
    ($name:ident, |$db:ident, $conn:ident| $body:block) => {
        #[tokio::test]
        async fn $name() {
            let ($db, db_path) = common::setup_db().await;
            {
                let mut $conn = $db.acquire().await.expect("Failed to acquire connection");

                // Execute the test logic
                $body
            }

            common::teardown_db($db, db_path).await;
        }
    };
}

// --- 2. Data Fixture Macros ---

macro_rules! create_contact {
    ($db:expr, $conn:expr, $key:expr) => {
        create_contact!($db, $conn, $key, {})
    };
    ($db:expr, $conn:expr, $key:expr, { $($field:ident : $val:expr),* }) => {
        {
            #[allow(unused_mut)]
            let mut contact = ContactModel {
                recipient_en: $key.to_string(),
                recipient_fa: format!("fa-{}", $key),
                email: format!("{}@x.com", $key.to_lowercase()),
                is_default: false,
            };
            $(contact.$field = $val.into();)*
            $db.contacts
                .insert(&mut *$conn, &contact)
                .await
                .expect("Failed to insert contact")
        }
    };
}

macro_rules! create_subscriber {
    ($db:expr, $conn:expr, $inbox:expr, $uuid:expr) => {
        $db.subscribers
            .insert(
                &mut *$conn,
                &SubscriberModel {
                    inbox: $inbox.to_string(),
                    uuid: $uuid.to_string(),
                    subscription: Subscription::None,
                    pending_subscription: Some(Subscription::En),
                    updated_at: Utc::now(),
                },
            )
            .await
            .expect("Failed to insert subscriber")
    };
}

mod contact_table_tests {
    use super::*;

    db_test!(insert_and_select, |db, conn| {
        let key = create_contact!(db, conn, "Sales", { recipient_fa: "فروش" });
        assert_eq!(key, "Sales");

        let fetched = db.contacts.select(&mut *conn, &key).await.unwrap().unwrap();
        assert_eq!(fetched.recipient_fa, "فروش");
        assert_eq!(fetched.email, "sales@x.com");
        assert!(!fetched.is_default);
    });

    db_test!(key_lookup_is_case_sensitive, |db, conn| {
        create_contact!(db, conn, "Sales");
        let fetched = db
            .contacts
            .select(&mut *conn, &"sales".to_string())
            .await
            .unwrap();
        assert!(fetched.is_none());
    });

    db_test!(duplicate_key_is_rejected, |db, conn| {
        create_contact!(db, conn, "Sales");
        let err = db
            .contacts
            .insert(
                &mut *conn,
                &ContactModel {
                    recipient_en: "Sales".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    });

    db_test!(select_all_is_ordered, |db, conn| {
        create_contact!(db, conn, "Support");
        create_contact!(db, conn, "Billing");
        create_contact!(db, conn, "Sales");

        let keys: Vec<String> = db
            .contacts
            .select_all(&mut *conn)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.recipient_en)
            .collect();
        assert_eq!(keys, vec!["Billing", "Sales", "Support"]);
    });

    db_test!(update_field, |db, conn| {
        create_contact!(db, conn, "Sales");
        let updated = db
            .contacts
            .update_field(&mut *conn, "Sales", ContactField::Email, "deals@x.com")
            .await
            .unwrap();
        assert!(updated);

        let missing = db
            .contacts
            .update_field(&mut *conn, "Nobody", ContactField::Email, "n@x.com")
            .await
            .unwrap();
        assert!(!missing);

        let fetched = db
            .contacts
            .select(&mut *conn, &"Sales".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.email, "deals@x.com");
    });

    db_test!(exists_recipient_fa_except, |db, conn| {
        create_contact!(db, conn, "Sales", { recipient_fa: "فروش" });
        create_contact!(db, conn, "Support", { recipient_fa: "پشتیبانی" });

        assert!(
            db.contacts
                .exists_recipient_fa_except(&mut *conn, "فروش", "Support")
                .await
                .unwrap()
        );
        assert!(
            !db.contacts
                .exists_recipient_fa_except(&mut *conn, "فروش", "Sales")
                .await
                .unwrap()
        );
    });

    db_test!(single_default_is_enforced_by_schema, |db, conn| {
        create_contact!(db, conn, "Sales", { is_default: true });
        let err = db
            .contacts
            .insert(
                &mut *conn,
                &ContactModel {
                    recipient_en: "Support".to_string(),
                    recipient_fa: "پشتیبانی".to_string(),
                    email: "support@x.com".to_string(),
                    is_default: true,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        assert_eq!(db.contacts.clear_default(&mut *conn).await.unwrap(), 1);
        assert!(db.contacts.select_default(&mut *conn).await.unwrap().is_none());
    });

    db_test!(delete, |db, conn| {
        create_contact!(db, conn, "Sales");
        assert!(db.contacts.delete(&mut *conn, &"Sales".to_string()).await.unwrap());
        assert!(!db.contacts.delete(&mut *conn, &"Sales".to_string()).await.unwrap());
        assert_eq!(db.contacts.count().await.unwrap(), 0);
    });
}

mod subscriber_table_tests {
    use super::*;

    db_test!(insert_and_select_by_uuid, |db, conn| {
        create_subscriber!(db, conn, "a@x.com", "token-a");

        let fetched = db
            .subscribers
            .select_by_uuid(&mut *conn, "token-a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.inbox, "a@x.com");
        assert_eq!(fetched.subscription, Subscription::None);
        assert_eq!(fetched.pending_subscription, Some(Subscription::En));

        assert!(db.subscribers.exists_by_uuid(&mut *conn, "token-a").await.unwrap());
        assert!(!db.subscribers.exists_by_uuid(&mut *conn, "token-b").await.unwrap());
    });

    db_test!(uuid_is_unique, |db, conn| {
        create_subscriber!(db, conn, "a@x.com", "token-a");
        let err = db
            .subscribers
            .insert(
                &mut *conn,
                &SubscriberModel {
                    inbox: "b@x.com".to_string(),
                    uuid: "token-a".to_string(),
                    subscription: Subscription::None,
                    pending_subscription: None,
                    updated_at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    });

    db_test!(promote_and_clear_pending, |db, conn| {
        create_subscriber!(db, conn, "a@x.com", "token-a");

        assert!(
            db.subscribers
                .promote_pending(&mut *conn, "token-a", Utc::now())
                .await
                .unwrap()
        );
        let fetched = db
            .subscribers
            .select(&mut *conn, &"a@x.com".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.subscription, Subscription::En);
        assert_eq!(fetched.pending_subscription, None);

        // Nothing pending: subscription is kept
        db.subscribers
            .promote_pending(&mut *conn, "token-a", Utc::now())
            .await
            .unwrap();
        let fetched = db
            .subscribers
            .select(&mut *conn, &"a@x.com".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.subscription, Subscription::En);

        db.subscribers
            .update_pending(&mut *conn, "a@x.com", Some(Subscription::EnFa), Utc::now())
            .await
            .unwrap();
        db.subscribers
            .update_pending(&mut *conn, "a@x.com", None, Utc::now())
            .await
            .unwrap();
        let fetched = db
            .subscribers
            .select(&mut *conn, &"a@x.com".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.pending_subscription, None);
        assert_eq!(fetched.subscription, Subscription::En);
    });
}

db_test!(delete_all_tables, |db, conn| {
    create_contact!(db, conn, "Sales");
    create_subscriber!(db, conn, "a@x.com", "token-a");

    db.delete_all_tables().await.unwrap();
    assert_eq!(db.contacts.count().await.unwrap(), 0);
    assert_eq!(db.subscribers.count().await.unwrap(), 0);
});
