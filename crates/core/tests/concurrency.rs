//! Concurrency tests against a real `PostgreSQL`.
//!
//! Row locks and unique indexes cannot be exercised with a mock
//! connection, so these run only with the `db-tests` feature:
//!
//!   cargo test -p enrollo-core --features db-tests --test concurrency
//!
//! Connection settings come from `TEST_DB_HOST` (localhost), `TEST_DB_PORT`
//! (5433), `TEST_DB_USER` and `TEST_DB_PASSWORD` (both `enrollo_test`). The
//! user must be allowed to create databases; each test makes its own.

#![cfg(feature = "db-tests")]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use enrollo_common::{AppError, AppResult, LocalStorage};
use enrollo_core::{
    AuthService, ExternalIdentity, FileService, FileUpload, IdentityProvider, JoinRequest,
    LedgerService, QrDecoder, RegistrationService, SlipVerifier, TopupService, VerifiedSlip,
};
use enrollo_db::{
    entities::{
        activity, activity_schedule, file, oauth_account, registration, student_information,
        transaction,
        user::{self, UserRole},
    },
    repositories::{
        FileRepository, OAuthAccountRepository, SessionRepository, TopupTransactionRepository,
        TransactionRepository, UserRepository,
    },
    test_utils::TestDatabase,
};
use futures::future::join_all;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

const ACCOUNT: &str = "123-4-56789-0";

struct FixedQr;

#[async_trait::async_trait]
impl QrDecoder for FixedQr {
    async fn decode(&self, _image: &[u8]) -> AppResult<String> {
        Ok("0041000600000101030040220014242082547BPM049885102TH9104CF62".to_string())
    }
}

struct FixedSlip;

#[async_trait::async_trait]
impl SlipVerifier for FixedSlip {
    async fn verify(&self, _payload: &str) -> AppResult<VerifiedSlip> {
        Ok(VerifiedSlip {
            amount: 50_000,
            transaction_ref: "014242082547BPM04988".to_string(),
            receiver_account: "xxx-x-x6789-x".to_string(),
        })
    }
}

struct FixedIdentity;

#[async_trait::async_trait]
impl IdentityProvider for FixedIdentity {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> AppResult<String> {
        Ok(format!("https://idp.test/auth?state={state}"))
    }

    async fn exchange_code(&self, _code: &str) -> AppResult<ExternalIdentity> {
        Ok(ExternalIdentity {
            provider_account_id: "g-42".to_string(),
            email: Some("first@example.com".to_string()),
            display_name: Some("First Login".to_string()),
            avatar_url: None,
        })
    }
}

fn file_service(db: &Arc<DatabaseConnection>) -> FileService {
    let dir = std::env::temp_dir().join(format!("enrollo-it-{}", uuid::Uuid::new_v4()));
    FileService::new(
        FileRepository::new(db.clone()),
        Arc::new(LocalStorage::new(dir, "/files".to_string(), "secret".to_string())),
        "enrollo".to_string(),
        60,
    )
}

fn image() -> FileUpload {
    FileUpload {
        filename: "slip.png".to_string(),
        content_type: "image/png".to_string(),
        data: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

async fn seed_user(db: &DatabaseConnection, id: &str) {
    let now = Utc::now();
    user::ActiveModel {
        id: Set(id.to_string()),
        email: Set(format!("{id}@example.com")),
        display_name: Set(id.to_string()),
        profile_image_url: Set(None),
        balance: Set(0),
        role: Set(UserRole::Member),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        deleted_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap();
}

async fn seed_student(db: &DatabaseConnection, id: &str, user_id: &str) {
    let now = Utc::now();
    student_information::ActiveModel {
        id: Set(id.to_string()),
        user_id: Set(user_id.to_string()),
        prefix: Set("Ms.".to_string()),
        full_name: Set(format!("Student {id}")),
        education_level: Set(3),
        school: Set("School".to_string()),
        food_allergies: Set(None),
        parent_name: Set("Parent".to_string()),
        parent_email: Set("parent@example.com".to_string()),
        secondary_email: Set(None),
        phone_number: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();
}

/// An approved, open activity with one schedule of the given capacity.
async fn seed_activity(db: &DatabaseConnection, max_users: i32) -> String {
    let now = Utc::now();
    seed_user(db, "owner").await;
    file::ActiveModel {
        id: Set("thumb".to_string()),
        bucket: Set("enrollo".to_string()),
        key: Set("thumb.png".to_string()),
        filename: Set("thumb.png".to_string()),
        mimetype: Set("image/png".to_string()),
        size: Set(4),
        created_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();
    activity::ActiveModel {
        id: Set("act1".to_string()),
        owner_id: Set("owner".to_string()),
        title: Set("Science camp".to_string()),
        thumbnail_file_id: Set("thumb".to_string()),
        description: Set("Three days of experiments".to_string()),
        description_short: Set("Experiments".to_string()),
        approved: Set(true),
        registration_open_at: Set((now - Duration::days(1)).into()),
        registration_close_at: Set((now + Duration::days(1)).into()),
        created_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();
    activity_schedule::ActiveModel {
        id: Set("sched1".to_string()),
        activity_id: Set("act1".to_string()),
        event_start_at: Set((now + Duration::days(7)).into()),
        price: Set(150_000),
        max_users: Set(max_users),
    }
    .insert(db)
    .await
    .unwrap();
    "sched1".to_string()
}

#[tokio::test]
async fn test_concurrent_joins_respect_capacity() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new(
        sea_orm::Database::connect(test_db.config.database_url()).await.unwrap(),
    );

    let schedule_id = seed_activity(&db, 3).await;
    for i in 0..8 {
        seed_user(&db, &format!("u{i}")).await;
        seed_student(&db, &format!("s{i}"), &format!("u{i}")).await;
    }

    let service = RegistrationService::new(db.clone(), file_service(&db));
    let joins = (0..8).map(|i| {
        let service = service.clone();
        let request =
            JoinRequest::new(format!("u{i}"), "act1", [schedule_id.clone()], format!("s{i}"))
                .unwrap();
        async move { service.join_activity(request, None).await }
    });
    let results = join_all(joins).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 3);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AppError::Forbidden(_)))
    );

    test_db.drop_database().await.unwrap();
}

#[tokio::test]
async fn test_batch_join_rolls_back_when_one_schedule_is_full() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new(
        sea_orm::Database::connect(test_db.config.database_url()).await.unwrap(),
    );

    let open = seed_activity(&db, 5).await;
    activity_schedule::ActiveModel {
        id: Set("sched2".to_string()),
        activity_id: Set("act1".to_string()),
        event_start_at: Set((Utc::now() + Duration::days(8)).into()),
        price: Set(150_000),
        max_users: Set(1),
    }
    .insert(db.as_ref())
    .await
    .unwrap();
    for i in 0..2 {
        seed_user(&db, &format!("u{i}")).await;
        seed_student(&db, &format!("s{i}"), &format!("u{i}")).await;
    }

    let service = RegistrationService::new(db.clone(), file_service(&db));
    let first = JoinRequest::new("u0", "act1", ["sched2".to_string()], "s0").unwrap();
    service.join_activity(first, None).await.unwrap();

    let batch =
        JoinRequest::new("u1", "act1", [open.clone(), "sched2".to_string()], "s1").unwrap();
    assert!(matches!(
        service.join_activity(batch, None).await,
        Err(AppError::Forbidden(_))
    ));

    let rows = registration::Entity::find()
        .filter(registration::Column::StudentInformationId.eq("s1"))
        .all(db.as_ref())
        .await
        .unwrap();
    assert!(rows.is_empty());

    test_db.drop_database().await.unwrap();
}

#[tokio::test]
async fn test_slip_redeemed_once_under_race() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new(
        sea_orm::Database::connect(test_db.config.database_url()).await.unwrap(),
    );
    seed_user(&db, "payer").await;

    let ledger = LedgerService::new(db.clone(), TransactionRepository::new(db.clone()));
    let service = TopupService::new(
        db.clone(),
        Arc::new(FixedQr),
        Arc::new(FixedSlip),
        file_service(&db),
        ledger,
        TopupTransactionRepository::new(db.clone()),
        ACCOUNT.to_string(),
    );

    let attempts = (0..4).map(|_| {
        let service = service.clone();
        async move { service.create_topup_payment("payer", image()).await }
    });
    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AppError::Conflict(_)))
    );

    let payer = user::Entity::find_by_id("payer").one(db.as_ref()).await.unwrap().unwrap();
    assert_eq!(payer.balance, 50_000);

    test_db.drop_database().await.unwrap();
}

#[tokio::test]
async fn test_ledger_reconciles_under_concurrent_mutations() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new(
        sea_orm::Database::connect(test_db.config.database_url()).await.unwrap(),
    );
    seed_user(&db, "saver").await;

    let ledger = LedgerService::new(db.clone(), TransactionRepository::new(db.clone()));
    ledger.credit("saver", 10_000).await.unwrap();

    let mutations = (0..20).map(|i| {
        let ledger = ledger.clone();
        async move {
            if i % 2 == 0 {
                ledger.credit("saver", 700).await
            } else {
                ledger.debit("saver", 1_300).await
            }
        }
    });
    join_all(mutations).await;

    let saver = user::Entity::find_by_id("saver").one(db.as_ref()).await.unwrap().unwrap();
    let entries = transaction::Entity::find().all(db.as_ref()).await.unwrap();
    let net: i64 = entries
        .iter()
        .map(|t| match t.transaction_type {
            transaction::TransactionType::Topup => t.amount,
            transaction::TransactionType::Payment => -t.amount,
        })
        .sum();

    assert!(saver.balance >= 0);
    assert_eq!(saver.balance, net);
    assert!(entries.iter().all(|t| t.balance_after >= 0));

    test_db.drop_database().await.unwrap();
}

#[tokio::test]
async fn test_simultaneous_first_logins_share_one_account() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new(
        sea_orm::Database::connect(test_db.config.database_url()).await.unwrap(),
    );

    let service = AuthService::new(
        Arc::new(FixedIdentity),
        UserRepository::new(db.clone()),
        OAuthAccountRepository::new(db.clone()),
        SessionRepository::new(db.clone()),
        3 * 24 * 60 * 60,
    );
    let logins = (0..4).map(|_| {
        let service = service.clone();
        async move { service.login("code").await }
    });
    let sessions: Vec<_> = join_all(logins)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let users = user::Entity::find().all(db.as_ref()).await.unwrap();
    assert_eq!(users.len(), 1);
    assert!(sessions.iter().all(|s| s.user_id == users[0].id));
    let links = oauth_account::Entity::find().all(db.as_ref()).await.unwrap();
    assert_eq!(links.len(), 1);

    test_db.drop_database().await.unwrap();
}
