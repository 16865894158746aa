// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scenario-level tests against the HTTP surface (SPEC_FULL.md §8
//! scenarios 2, 3, 6) plus the register/login/withdraw round trip.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use gophermart::domain::WithdrawalStatus;
use gophermart::http::{build_router, AppState};
use gophermart::queue::InProcessQueue;
use gophermart::storage::{MemoryStorage, Storage};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn app() -> (axum::Router, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let state = AppState {
        storage: storage.clone(),
        queue: Arc::new(InProcessQueue::new()),
        cancel: CancellationToken::new(),
    };
    (build_router(state), storage)
}

async fn register(app: &axum::Router, login: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/user/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({"login": login, "password": "pw1"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

/// Scenario 3: a Luhn-invalid order number is rejected with 422 and no
/// order row is created.
#[tokio::test]
async fn luhn_invalid_order_is_rejected() {
    let (app, storage) = app();
    let cookie = register(&app, "alice").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/user/orders")
                .header(header::COOKIE, cookie)
                .body(Body::from("12345678"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let cancel = CancellationToken::new();
    assert!(storage
        .order_by_code("12345678", &cancel)
        .await
        .is_err());
}

/// Scenario 2: a second user submitting an already-claimed order code
/// gets 409; the original owner re-submitting it gets 200 (already-own).
#[tokio::test]
async fn duplicate_order_code_is_a_conflict_for_another_user() {
    let (app, _storage) = app();
    let alice_cookie = register(&app, "alice").await;
    let bob_cookie = register(&app, "bob").await;

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/user/orders")
                .header(header::COOKIE, alice_cookie.clone())
                .body(Body::from("12345674"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let resubmit = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/user/orders")
                .header(header::COOKIE, alice_cookie)
                .body(Body::from("12345674"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resubmit.status(), StatusCode::OK);

    let conflict = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/user/orders")
                .header(header::COOKIE, bob_cookie)
                .body(Body::from("12345674"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(conflict.status(), StatusCode::CONFLICT);
}

/// Scenario 6 (intake half): a withdrawal request debits the balance
/// atomically and appears as PENDING immediately, before the confirmer
/// has run at all.
#[tokio::test]
async fn withdraw_debits_balance_and_queues_pending_settlement() {
    let (app, storage) = app();
    let cookie = register(&app, "alice").await;
    let cancel = CancellationToken::new();

    let alice = storage.user_by_login("alice", &cancel).await.unwrap();
    storage
        .put_order(
            gophermart::domain::NewOrder {
                code: "12345674".into(),
                user_id: alice.user_id,
            },
            &cancel,
        )
        .await
        .unwrap();
    storage
        .add_points(alice.user_id, Decimal::from(100), "12345674", &cancel)
        .await
        .unwrap();

    let withdraw_response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/user/balance/withdraw")
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({"order": "12345674", "sum": "40"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(withdraw_response.status(), StatusCode::OK);

    let updated = storage.user_by_login("alice", &cancel).await.unwrap();
    assert_eq!(updated.points, Decimal::from(60));
    assert_eq!(updated.withdrawn, Decimal::from(40));

    let pending = storage.active_withdrawals(&cancel).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, WithdrawalStatus::Pending);
}

/// Withdrawing more than the user's balance is rejected with 402 and
/// leaves the balance untouched.
#[tokio::test]
async fn withdraw_beyond_balance_is_rejected() {
    let (app, _storage) = app();
    let cookie = register(&app, "alice").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/user/balance/withdraw")
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({"order": "12345674", "sum": "40"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

/// An unauthenticated request is rejected before any handler logic runs.
#[tokio::test]
async fn missing_session_cookie_is_unauthorized() {
    let (app, _storage) = app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/user/balance")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
