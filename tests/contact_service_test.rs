use cms_forms::model::ContactField;
use cms_forms::model::ContactModel;
use cms_forms::service::error::ServiceError;

mod common;

fn contact(key: &str, fa: &str, is_default: bool) -> ContactModel {
    ContactModel {
        recipient_en: key.to_string(),
        recipient_fa: fa.to_string(),
        email: format!("{}@x.com", key.to_lowercase()),
        is_default,
    }
}

fn defaults(contacts: &[ContactModel]) -> Vec<&str> {
    contacts
        .iter()
        .filter(|c| c.is_default)
        .map(|c| c.recipient_en.as_str())
        .collect()
}

#[tokio::test]
async fn test_add_contact_default_is_exclusive() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    service
        .add_contact(&contact("Sales", "فروش", true))
        .await
        .unwrap();
    service
        .add_contact(&contact("Support", "پشتیبانی", true))
        .await
        .unwrap();

    let all = service.list_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(defaults(&all), vec!["Support"]);

    common::teardown_db(db, db_path).await;
}

#[tokio::test]
async fn test_add_contact_duplicate_leaves_table_unchanged() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    service
        .add_contact(&contact("Sales", "فروش", true))
        .await
        .unwrap();
    let before = service.list_all().await.unwrap();

    // A default duplicate must not clear the existing default either.
    let err = service
        .add_contact(&contact("Sales", "دیگر", true))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateKey { ref key } if key == "Sales"));

    assert_eq!(service.list_all().await.unwrap(), before);

    common::teardown_db(db, db_path).await;
}

#[tokio::test]
async fn test_list_all_is_sorted_by_key() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    for key in ["Support", "Billing", "Sales"] {
        service
            .add_contact(&contact(key, &format!("fa-{key}"), false))
            .await
            .unwrap();
    }

    let keys: Vec<String> = service
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.recipient_en)
        .collect();
    assert_eq!(keys, vec!["Billing", "Sales", "Support"]);

    common::teardown_db(db, db_path).await;
}

#[tokio::test]
async fn test_update_field_email() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    service
        .add_contact(&contact("Sales", "فروش", false))
        .await
        .unwrap();
    service
        .update_field("Sales", ContactField::Email, "deals@x.com")
        .await
        .unwrap();

    let sales = service.get("Sales").await.unwrap().unwrap();
    assert_eq!(sales.email, "deals@x.com");

    common::teardown_db(db, db_path).await;
}

#[tokio::test]
async fn test_update_field_rename_key() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    service
        .add_contact(&contact("Sales", "فروش", true))
        .await
        .unwrap();
    service
        .add_contact(&contact("Support", "پشتیبانی", false))
        .await
        .unwrap();

    // Renaming onto an existing key is rejected.
    let err = service
        .update_field("Sales", ContactField::RecipientEn, "Support")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateKey { ref key } if key == "Support"));

    // Renaming to itself is a no-op, not a duplicate.
    service
        .update_field("Sales", ContactField::RecipientEn, "Sales")
        .await
        .unwrap();

    service
        .update_field("Sales", ContactField::RecipientEn, "Deals")
        .await
        .unwrap();
    assert!(service.get("Sales").await.unwrap().is_none());
    let deals = service.get("Deals").await.unwrap().unwrap();
    assert_eq!(deals.recipient_fa, "فروش");
    assert!(deals.is_default);

    common::teardown_db(db, db_path).await;
}

#[tokio::test]
async fn test_update_field_recipient_fa_must_be_unique() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    service
        .add_contact(&contact("Sales", "فروش", false))
        .await
        .unwrap();
    service
        .add_contact(&contact("Support", "پشتیبانی", false))
        .await
        .unwrap();

    let err = service
        .update_field("Support", ContactField::RecipientFa, "فروش")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateKey { .. }));

    // Keeping its own value is fine.
    service
        .update_field("Sales", ContactField::RecipientFa, "فروش")
        .await
        .unwrap();

    let support = service.get("Support").await.unwrap().unwrap();
    assert_eq!(support.recipient_fa, "پشتیبانی");

    common::teardown_db(db, db_path).await;
}

#[tokio::test]
async fn test_update_field_unknown_key() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    let err = service
        .update_field("Nobody", ContactField::Email, "n@x.com")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { ref key } if key == "Nobody"));

    common::teardown_db(db, db_path).await;
}

#[tokio::test]
async fn test_set_default() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    service
        .add_contact(&contact("Sales", "فروش", true))
        .await
        .unwrap();
    service
        .add_contact(&contact("Support", "پشتیبانی", false))
        .await
        .unwrap();

    service.set_default("Support", true).await.unwrap();
    assert_eq!(defaults(&service.list_all().await.unwrap()), vec!["Support"]);

    // Unknown key: nothing changes.
    service.set_default("Nobody", true).await.unwrap();
    assert_eq!(defaults(&service.list_all().await.unwrap()), vec!["Support"]);

    // Unchecking a non-default row leaves the default in place.
    service.set_default("Sales", false).await.unwrap();
    assert_eq!(defaults(&service.list_all().await.unwrap()), vec!["Support"]);

    // Unchecking the default leaves no default at all.
    service.set_default("Support", false).await.unwrap();
    assert!(defaults(&service.list_all().await.unwrap()).is_empty());

    common::teardown_db(db, db_path).await;
}

#[tokio::test]
async fn test_delete() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    service
        .add_contact(&contact("Sales", "فروش", false))
        .await
        .unwrap();

    assert!(!service.delete("Nobody").await.unwrap());
    assert_eq!(service.list_all().await.unwrap().len(), 1);

    assert!(service.delete("Sales").await.unwrap());
    assert!(service.list_all().await.unwrap().is_empty());

    common::teardown_db(db, db_path).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_contact_reports_duplicates() {
    let (db, db_path) = common::setup_db().await;
    let service = common::services(db.clone()).contacts.clone();

    for round in 0..5 {
        let key = format!("Desk{round}");
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let service = service.clone();
                let contact = contact(&key, &format!("fa-{round}-{i}"), true);
                tokio::spawn(async move { service.add_contact(&contact).await })
            })
            .collect();

        let mut added = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => added += 1,
                Err(ServiceError::DuplicateKey { key: dup }) => assert_eq!(dup, key),
                Err(other) => panic!("Expected DuplicateKey, got {other}"),
            }
        }
        assert_eq!(added, 1);
    }

    let all = service.list_all().await.unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(defaults(&all).len(), 1);

    common::teardown_db(db, db_path).await;
}
