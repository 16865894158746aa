// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end scenarios for the order-accrual checking pipeline
//! (SPEC_FULL.md §8 scenarios 1, 4, 6): intake -> queue -> worker pool ->
//! loyalty client -> storage, and the withdrawal confirmer.

use gophermart::domain::{CheckStatus, NewOrder, NewUser, WithdrawalStatus};
use gophermart::loyalty::LoyaltyClient;
use gophermart::queue::{CheckTask, InProcessQueue, TaskQueue};
use gophermart::storage::{MemoryStorage, Storage};
use gophermart::worker::WorkerPool;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Scenario 1: a PROCESSED loyalty response credits the owner's balance
/// and terminates the order.
#[tokio::test]
async fn happy_path_credits_balance_and_terminates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders/12345674"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "order": "12345674",
            "status": "PROCESSED",
            "accrual": 30,
        })))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let queue: Arc<InProcessQueue> = Arc::new(InProcessQueue::new());
    let loyalty = Arc::new(LoyaltyClient::new(server.uri()));
    let cancel = CancellationToken::new();

    let user = storage
        .create_user(
            NewUser {
                login: "alice".into(),
                password_hash: "x".into(),
            },
            &cancel,
        )
        .await
        .unwrap();
    storage
        .put_order(
            NewOrder {
                code: "12345674".into(),
                user_id: user.user_id,
            },
            &cancel,
        )
        .await
        .unwrap();
    let order = storage.order_by_code("12345674", &cancel).await.unwrap();
    queue.publish(CheckTask::from(order)).await.unwrap();

    let pool_cancel = cancel.clone();
    let pool_storage = storage.clone();
    let pool_queue: Arc<dyn TaskQueue> = queue.clone();
    let pool_handle = tokio::spawn(async move {
        WorkerPool::new(1)
            .run(pool_queue, pool_storage, loyalty, pool_cancel)
            .await
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(6);
    loop {
        let order = storage.order_by_code("12345674", &cancel).await.unwrap();
        if order.is_check_done {
            assert_eq!(order.check_status, CheckStatus::Processed);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "order never terminated");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let credited = storage.user_by_login("alice", &cancel).await.unwrap();
    assert_eq!(credited.points, Decimal::from(30));
    let orders = storage.orders(user.user_id, &cancel).await.unwrap();
    assert_eq!(orders[0].accrual, Decimal::from(30));

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), pool_handle).await;
}

/// Scenario 4: five bad responses back off linearly (60/120/180/240/300s,
/// asserted separately in `worker::check`'s own tests); the sixth
/// terminates the order as INVALID with `check_attempts=5`.
#[tokio::test]
async fn repeated_bad_responses_terminate_as_invalid() {
    use gophermart::worker::run_check;

    let storage = Arc::new(MemoryStorage::new());
    let cancel = CancellationToken::new();
    storage
        .put_order(
            NewOrder {
                code: "12345674".into(),
                user_id: 1,
            },
            &cancel,
        )
        .await
        .unwrap();

    let mut order = storage.order_by_code("12345674", &cancel).await.unwrap();
    for _ in 0..5 {
        run_check(
            storage.as_ref(),
            &order,
            gophermart::loyalty::Outcome::TransportError,
            &cancel,
        )
        .await
        .unwrap();
        order = storage.order_by_code("12345674", &cancel).await.unwrap();
        assert!(!order.is_check_done);
    }

    run_check(
        storage.as_ref(),
        &order,
        gophermart::loyalty::Outcome::Invalid,
        &cancel,
    )
    .await
    .unwrap();
    let terminal = storage.order_by_code("12345674", &cancel).await.unwrap();
    assert!(terminal.is_check_done);
    assert_eq!(terminal.check_status, CheckStatus::Invalid);
    assert_eq!(terminal.check_attempts, 5);
}

/// Scenario 6: a withdrawal is PENDING immediately after `AddWithdraw`,
/// and the confirmer settles it.
#[tokio::test]
async fn withdrawal_is_settled_by_the_confirmer() {
    let storage = Arc::new(MemoryStorage::new());
    let cancel = CancellationToken::new();

    let user = storage
        .create_user(
            NewUser {
                login: "alice".into(),
                password_hash: "x".into(),
            },
            &cancel,
        )
        .await
        .unwrap();
    storage
        .put_order(
            NewOrder {
                code: "12345674".into(),
                user_id: user.user_id,
            },
            &cancel,
        )
        .await
        .unwrap();
    storage
        .add_points(user.user_id, Decimal::from(100), "12345674", &cancel)
        .await
        .unwrap();
    storage
        .add_withdraw(user.user_id, "12345674", Decimal::from(40), &cancel)
        .await
        .unwrap();

    let user_after = storage.user_by_login("alice", &cancel).await.unwrap();
    assert_eq!(user_after.points, Decimal::from(60));
    assert_eq!(user_after.withdrawn, Decimal::from(40));

    let confirmer_cancel = cancel.clone();
    let confirmer_storage = storage.clone();
    let handle = tokio::spawn(async move { gophermart::confirmer::run(confirmer_storage, confirmer_cancel).await });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let withdrawals = storage.withdraws_by_user_id(user.user_id, &cancel).await.unwrap();
        if withdrawals[0].status == WithdrawalStatus::Settled {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "withdrawal never settled");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
}
