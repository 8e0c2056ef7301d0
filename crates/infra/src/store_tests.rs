//! Store-contract tests against the in-memory backend.
//!
//! The Postgres backend implements the same contract; these tests pin the
//! observable semantics (version gating, soft-delete filtering, natural-key
//! uniqueness, unit-of-work atomicity) without needing a database.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use cashnote_core::{AuthProvider, MoneyFlow, StoreError, User, UserAuth, UserId, Versioned};

use crate::context::OpContext;
use crate::memory::{
    InMemoryAuthProviderRepository, InMemoryDatabase, InMemoryMoneyFlowRepository,
    InMemoryUserAuthRepository, InMemoryUserRepository, MemTxManager,
};
use crate::repository::{
    AuthProviderRepository, MoneyFlowRepository, TxError, TxManager, UserAuthRepository,
    UserRepository,
};

fn fixtures() -> (
    Arc<InMemoryDatabase>,
    InMemoryUserRepository,
    InMemoryMoneyFlowRepository,
) {
    let db = InMemoryDatabase::new();
    (
        db.clone(),
        InMemoryUserRepository::new(db.clone()),
        InMemoryMoneyFlowRepository::new(db),
    )
}

async fn seed_user(repo: &InMemoryUserRepository, phone: &str) -> User {
    let mut user = User::new("Budi Santoso", phone);
    repo.create(&OpContext::root(), &mut user).await.unwrap();
    user
}

#[tokio::test]
async fn update_bumps_version_once_per_touch() {
    let (_, users, _) = fixtures();
    let ctx = OpContext::root();
    let mut user = seed_user(&users, "+628111111111").await;

    for i in 1..=5 {
        user.rename(format!("Budi {i}"));
        user.touch();
        users.update(&ctx, &user).await.unwrap();
    }

    let stored = users.find_by_id(&ctx, user.id).await.unwrap();
    assert_eq!(stored.version, 5);
    assert_eq!(stored.full_name, "Budi 5");
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let (_, users, _) = fixtures();
    let ctx = OpContext::root();
    let user = seed_user(&users, "+628111111112").await;

    let mut first = user.clone();
    first.rename("First Writer");
    first.touch();
    users.update(&ctx, &first).await.unwrap();

    // Second writer still holds version 0.
    let mut second = user;
    second.rename("Second Writer");
    second.touch();
    let err = users.update(&ctx, &second).await.unwrap_err();
    assert_eq!(err, StoreError::Conflict);

    let stored = users.find_by_id(&ctx, first.id).await.unwrap();
    assert_eq!(stored.full_name, "First Writer");
}

#[tokio::test]
async fn concurrent_writers_exactly_one_wins() {
    let (_, users, _) = fixtures();
    let ctx = OpContext::root();
    let user = seed_user(&users, "+628111111113").await;

    let mut a = user.clone();
    a.rename("Writer A");
    a.touch();
    let mut b = user;
    b.rename("Writer B");
    b.touch();

    let (ra, rb) = tokio::join!(users.update(&ctx, &a), users.update(&ctx, &b));
    assert_ne!(ra.is_ok(), rb.is_ok());
    assert!(matches!(
        if ra.is_ok() { rb } else { ra },
        Err(StoreError::Conflict)
    ));

    let stored = users.find_by_id(&ctx, a.id).await.unwrap();
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn update_of_missing_id_is_a_conflict() {
    let (_, users, _) = fixtures();
    let mut ghost = User::new("Nobody", "+628000000000");
    ghost.touch();
    let err = users.update(&OpContext::root(), &ghost).await.unwrap_err();
    assert_eq!(err, StoreError::Conflict);
}

#[tokio::test]
async fn soft_deleted_rows_are_invisible_and_phone_is_reusable() {
    let (_, users, _) = fixtures();
    let ctx = OpContext::root();
    let user = seed_user(&users, "+628111111114").await;

    users.delete(&ctx, user.id).await.unwrap();

    assert_eq!(
        users.find_by_id(&ctx, user.id).await.unwrap_err(),
        StoreError::NotFound
    );
    assert_eq!(
        users
            .find_by_phone_number(&ctx, "+628111111114")
            .await
            .unwrap_err(),
        StoreError::NotFound
    );
    assert_eq!(
        users.delete(&ctx, user.id).await.unwrap_err(),
        StoreError::NotFound
    );

    // The phone number is free again.
    let replacement = seed_user(&users, "+628111111114").await;
    let stored = users.find_by_phone_number(&ctx, "+628111111114").await.unwrap();
    assert_eq!(stored.id, replacement.id);
}

#[tokio::test]
async fn duplicate_phone_among_active_rows_is_rejected() {
    let (_, users, _) = fixtures();
    seed_user(&users, "+628111111115").await;

    let mut dup = User::new("Imposter", "+628111111115");
    let err = users
        .create(&OpContext::root(), &mut dup)
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Duplicate);
}

#[tokio::test]
async fn list_is_newest_first_and_pages_without_overlap() {
    let (_, users, _) = fixtures();
    let ctx = OpContext::root();
    for i in 0..5 {
        seed_user(&users, &format!("+62812000000{i}")).await;
    }

    let first = users.list(&ctx, 3, 0).await.unwrap();
    let second = users.list(&ctx, 3, 3).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 2);

    let mut seen: Vec<_> = first.iter().chain(&second).map(|u| u.id).collect();
    seen.dedup();
    assert_eq!(seen.len(), 5);
    assert!(first
        .windows(2)
        .all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn totals_are_zero_on_empty_and_exclude_deleted() {
    let (_, users, flows) = fixtures();
    let ctx = OpContext::root();
    let user = seed_user(&users, "+628111111116").await;

    assert_eq!(flows.total_by_user(&ctx, user.id).await.unwrap(), 0.0);

    let mut lunch = MoneyFlow::new(user.id, 25_000.0, "IDR").unwrap();
    lunch.set_category("food");
    flows.create(&ctx, &mut lunch).await.unwrap();
    let mut bus = MoneyFlow::new(user.id, 5_000.0, "IDR").unwrap();
    bus.set_category("transport");
    flows.create(&ctx, &mut bus).await.unwrap();

    assert_eq!(flows.total_by_user(&ctx, user.id).await.unwrap(), 30_000.0);
    assert_eq!(
        flows
            .total_by_user_and_category(&ctx, user.id, "food")
            .await
            .unwrap(),
        25_000.0
    );

    flows.delete(&ctx, bus.id).await.unwrap();
    assert_eq!(flows.total_by_user(&ctx, user.id).await.unwrap(), 25_000.0);

    // Totals never count another user's records.
    assert_eq!(
        flows.total_by_user(&ctx, UserId::new()).await.unwrap(),
        0.0
    );
}

#[tokio::test]
async fn date_range_query_is_inclusive_and_owner_scoped() {
    let (_, users, flows) = fixtures();
    let ctx = OpContext::root();
    let user = seed_user(&users, "+628111111117").await;
    let other = seed_user(&users, "+628111111118").await;

    let mut mine = MoneyFlow::new(user.id, 10_000.0, "IDR").unwrap();
    flows.create(&ctx, &mut mine).await.unwrap();
    let mut theirs = MoneyFlow::new(other.id, 99_000.0, "IDR").unwrap();
    flows.create(&ctx, &mut theirs).await.unwrap();

    let start = mine.created_at - ChronoDuration::minutes(1);
    let end = mine.created_at + ChronoDuration::minutes(1);
    let hits = flows
        .find_by_user_and_date_range(&ctx, user.id, start, end)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, mine.id);

    let before = flows
        .find_by_user_and_date_range(
            &ctx,
            user.id,
            start - ChronoDuration::hours(2),
            start - ChronoDuration::hours(1),
        )
        .await
        .unwrap();
    assert!(before.is_empty());
}

#[tokio::test]
async fn transaction_commits_all_writes() {
    let db = InMemoryDatabase::new();
    let users = InMemoryUserRepository::new(db.clone());
    let user_auths = InMemoryUserAuthRepository::new(db.clone());
    let providers = InMemoryAuthProviderRepository::new(db.clone());
    let tm = MemTxManager::new(db);
    let ctx = OpContext::root();

    let mut provider = AuthProvider::new("Email & Password", "email-password");
    providers.create(&ctx, &mut provider).await.unwrap();
    let provider_id = provider.id;

    let users2 = users.clone();
    let user_auths2 = user_auths.clone();
    let created = tm
        .run_in_transaction(
            ctx.clone(),
            Box::new(move |tx_ctx| {
                Box::pin(async move {
                    let mut user = User::new("Siti Aminah", "+628222222221");
                    users2.create(&tx_ctx, &mut user).await?;
                    let mut auth = UserAuth::new(
                        user.id,
                        provider_id,
                        "siti@example.com",
                        "$2b$04$hash",
                    );
                    user_auths2.create(&tx_ctx, &mut auth).await?;
                    Ok(user)
                })
            }),
        )
        .await
        .unwrap();

    assert!(users.find_by_id(&ctx, created.id).await.is_ok());
    assert!(user_auths
        .find_by_credential(&ctx, "siti@example.com", provider_id)
        .await
        .is_ok());
}

#[tokio::test]
async fn transaction_rolls_back_every_write_on_error() {
    let db = InMemoryDatabase::new();
    let users = InMemoryUserRepository::new(db.clone());
    let user_auths = InMemoryUserAuthRepository::new(db.clone());
    let providers = InMemoryAuthProviderRepository::new(db.clone());
    let tm = MemTxManager::new(db);
    let ctx = OpContext::root();

    let mut provider = AuthProvider::new("Email & Password", "email-password");
    providers.create(&ctx, &mut provider).await.unwrap();
    let provider_id = provider.id;

    // Pre-existing link forces a Duplicate after the user insert succeeds.
    let owner = {
        let mut u = User::new("Owner", "+628222222222");
        users.create(&ctx, &mut u).await.unwrap();
        u
    };
    let mut existing = UserAuth::new(owner.id, provider_id, "taken@example.com", "hash");
    user_auths.create(&ctx, &mut existing).await.unwrap();

    let users2 = users.clone();
    let user_auths2 = user_auths.clone();
    let result: Result<User, _> = tm
        .run_in_transaction(
            ctx.clone(),
            Box::new(move |tx_ctx| {
                Box::pin(async move {
                    let mut user = User::new("Latecomer", "+628222222223");
                    users2.create(&tx_ctx, &mut user).await?;
                    let mut auth =
                        UserAuth::new(user.id, provider_id, "taken@example.com", "hash");
                    user_auths2.create(&tx_ctx, &mut auth).await?;
                    Ok(user)
                })
            }),
        )
        .await;

    assert_eq!(result.unwrap_err(), StoreError::Duplicate);
    // The user insert inside the failed transaction is gone.
    assert_eq!(
        users
            .find_by_phone_number(&ctx, "+628222222223")
            .await
            .unwrap_err(),
        StoreError::NotFound
    );
}

#[tokio::test]
async fn nested_transaction_defers_to_the_outer_one() {
    let db = InMemoryDatabase::new();
    let users = InMemoryUserRepository::new(db.clone());
    let tm = Arc::new(MemTxManager::new(db));

    let users2 = users.clone();
    let tm2 = tm.clone();
    let result: Result<(), _> = tm
        .run_in_transaction(
            OpContext::root(),
            Box::new(move |outer_ctx| {
                Box::pin(async move {
                    let mut user = User::new("Outer", "+628222222224");
                    users2.create(&outer_ctx, &mut user).await?;

                    let inner_users = users2.clone();
                    tm2.run_in_transaction(
                        outer_ctx.clone(),
                        Box::new(move |inner_ctx| {
                            Box::pin(async move {
                                assert!(inner_ctx.in_transaction());
                                let mut second = User::new("Inner", "+628222222225");
                                inner_users.create(&inner_ctx, &mut second).await
                            })
                        }),
                    )
                    .await?;

                    // Inner failure would surface here and roll everything back.
                    Err(StoreError::unknown("abort outer"))
                })
            }),
        )
        .await;

    assert!(result.is_err());
    let ctx = OpContext::root();
    assert!(users.find_by_phone_number(&ctx, "+628222222224").await.is_err());
    assert!(users.find_by_phone_number(&ctx, "+628222222225").await.is_err());
}

#[tokio::test]
async fn manual_begin_commit_roundtrip() {
    let db = InMemoryDatabase::new();
    let users = InMemoryUserRepository::new(db.clone());
    let tm = MemTxManager::new(db);

    let ctx = OpContext::root();
    let tx_ctx = tm.begin(&ctx).await.unwrap();
    assert!(tx_ctx.in_transaction());

    let mut user = User::new("Manual", "+628222222226");
    users.create(&tx_ctx, &mut user).await.unwrap();
    tm.commit(&tx_ctx).await.unwrap();

    assert!(users.find_by_id(&ctx, user.id).await.is_ok());
    // The handle is spent.
    assert_eq!(
        tm.commit(&tx_ctx).await.unwrap_err(),
        TxError::AlreadyCompleted
    );
}

#[tokio::test]
async fn manual_rollback_discards_writes() {
    let db = InMemoryDatabase::new();
    let users = InMemoryUserRepository::new(db.clone());
    let tm = MemTxManager::new(db);

    let ctx = OpContext::root();
    let tx_ctx = tm.begin(&ctx).await.unwrap();
    let mut user = User::new("Rolled Back", "+628222222227");
    users.create(&tx_ctx, &mut user).await.unwrap();
    tm.rollback(&tx_ctx).await.unwrap();

    assert_eq!(
        users.find_by_id(&ctx, user.id).await.unwrap_err(),
        StoreError::NotFound
    );
}

#[tokio::test]
async fn rollback_does_not_erase_writes_committed_while_transaction_open() {
    let db = InMemoryDatabase::new();
    let flows = InMemoryMoneyFlowRepository::new(db.clone());
    let tm = MemTxManager::new(db);
    let ctx = OpContext::root();

    let tx_ctx = tm.begin(&ctx).await.unwrap();

    // An independent writer queues behind the open transaction and lands
    // once it resolves; rolling back must not restore over it.
    let writer = {
        let flows = flows.clone();
        tokio::spawn(async move {
            let mut flow = MoneyFlow::new(UserId::new(), 7_500.0, "IDR").unwrap();
            flows.create(&OpContext::root(), &mut flow).await.unwrap();
            flow
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    tm.rollback(&tx_ctx).await.unwrap();

    let flow = writer.await.unwrap();
    assert!(flows.find_by_id(&ctx, flow.id).await.is_ok());
}

#[tokio::test]
async fn commit_without_transaction_is_an_error() {
    let tm = MemTxManager::new(InMemoryDatabase::new());
    assert_eq!(
        tm.commit(&OpContext::root()).await.unwrap_err(),
        TxError::NoActiveTransaction
    );
}

#[tokio::test]
async fn expired_context_cancels_store_calls() {
    let (_, users, _) = fixtures();
    let ctx = OpContext::root().with_timeout(Duration::ZERO);
    let mut user = User::new("Too Late", "+628222222228");
    assert_eq!(
        users.create(&ctx, &mut user).await.unwrap_err(),
        StoreError::Cancelled
    );
}
