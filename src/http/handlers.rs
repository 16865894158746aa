// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Route handlers. `submit_order`/`withdraw` implement spec.md §4.7 and
//! §6 verbatim; `register`/`login` are the ambient session layer spec.md
//! §1 names as an external collaborator but that a runnable repo still
//! needs behind the `token` cookie (SPEC_FULL.md §4.7).

use crate::domain::{NewOrder, NewUser};
use crate::error::ApiError;
use crate::http::auth::{AuthedUser, SESSION_COOKIE};
use crate::http::state::AppState;
use crate::luhn;
use crate::queue::CheckTask;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::CookieJar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Publish deadline for order intake back-pressure (spec.md §4.7 "the
/// handler blocks up to its own deadline").
const PUBLISH_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct Credentials {
    login: String,
    password: String,
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(anyhow::anyhow!(err.to_string())))
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    if body.login.is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation("login and password are required".into()));
    }

    let password_hash = hash_password(&body.password)?;
    let user = state
        .storage
        .create_user(
            NewUser {
                login: body.login,
                password_hash,
            },
            &state.cancel,
        )
        .await?;

    let token = Uuid::new_v4().to_string();
    state
        .storage
        .set_auth_token(user.user_id, &token, &state.cancel)
        .await?;

    Ok((jar.add(session_cookie(token)), StatusCode::OK))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    if body.login.is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation("login and password are required".into()));
    }

    let user = state
        .storage
        .user_by_login(&body.login, &state.cancel)
        .await
        .map_err(|_| ApiError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = Uuid::new_v4().to_string();
    state
        .storage
        .set_auth_token(user.user_id, &token, &state.cancel)
        .await?;

    Ok((jar.add(session_cookie(token)), StatusCode::OK))
}

pub async fn submit_order(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    body: String,
) -> Result<StatusCode, ApiError> {
    let code = body.trim().to_string();
    if code.is_empty() {
        return Err(ApiError::Validation("order number is required".into()));
    }
    if !luhn::is_valid(&code) {
        return Err(ApiError::InvalidOrder);
    }

    match state.storage.order_by_code(&code, &state.cancel).await {
        Ok(existing) if existing.user_id == user.user_id => return Ok(StatusCode::OK),
        Ok(_) => return Err(ApiError::Conflict("order already submitted by another user".into())),
        Err(crate::error::StorageError::NotFound) => {}
        Err(err) => return Err(err.into()),
    }

    state
        .storage
        .put_order(
            NewOrder {
                code: code.clone(),
                user_id: user.user_id,
            },
            &state.cancel,
        )
        .await?;

    let order = state.storage.order_by_code(&code, &state.cancel).await?;
    match tokio::time::timeout(PUBLISH_DEADLINE, state.queue.publish(CheckTask::from(order))).await
    {
        Ok(Ok(())) => Ok(StatusCode::ACCEPTED),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(ApiError::Internal(anyhow::anyhow!(
            "timed out publishing check task"
        ))),
    }
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state.storage.orders(user.user_id, &state.cancel).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(orders).into_response())
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    current: Decimal,
    withdrawn: Decimal,
}

pub async fn balance(
    AuthedUser(user): AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(BalanceResponse {
        current: user.points,
        withdrawn: user.withdrawn,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    order: String,
    sum: Decimal,
}

pub async fn withdraw(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
    Json(body): Json<WithdrawRequest>,
) -> Result<StatusCode, ApiError> {
    if !luhn::is_valid(&body.order) {
        return Err(ApiError::InvalidOrder);
    }

    state
        .storage
        .add_withdraw(user.user_id, &body.order, body.sum, &state.cancel)
        .await?;

    Ok(StatusCode::OK)
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    AuthedUser(user): AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let withdrawals = state
        .storage
        .withdraws_by_user_id(user.user_id, &state.cancel)
        .await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(withdrawals).into_response())
}
