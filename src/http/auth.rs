// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cookie-based session auth (SPEC_FULL.md §4.7 "ambient"). The `token`
//! cookie carries a user's `auth_token`; an extractor resolves it to a
//! `User` snapshot before the handler body runs, so a missing or unknown
//! token yields 401 up front.

use crate::domain::User;
use crate::error::ApiError;
use crate::http::state::AppState;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

pub const SESSION_COOKIE: &str = "token";

pub struct AuthedUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or(ApiError::Unauthorized)?;

        let user = app_state
            .storage
            .user_by_token(&token, &app_state.cancel)
            .await
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthedUser(user))
    }
}
