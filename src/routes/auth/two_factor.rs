/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::auth::proof::SecondFactorProof;
use crate::auth::two_factor::{Enrollment, TwoFactorStatus};
use crate::database::definitions::account::{TwoFactorMethod, User};
use crate::prelude::*;
use crate::require_session;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Router};

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route("/status", get(status).layer(require_session!(state)))
        .route("/setup", post(setup).layer(require_session!(state)))
        .route("/verify", post(verify).layer(require_session!(state)))
        .route("/disable", post(disable).layer(require_session!(state)))
        .route("/send-code", post(send_code))
        .route("/login-verify", post(login_verify))
        .with_state(state)
}

async fn status(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
) -> Json<TwoFactorStatus> {
    Json(state.two_factor().status(&user))
}

#[derive(Deserialize, Debug, Clone)]
struct SetupRequest {
    method: TwoFactorMethod,
}

async fn setup(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Json(data): Json<SetupRequest>,
) -> Result<Json<Enrollment>> {
    Ok(Json(state.two_factor().enroll(&user, data.method).await?))
}

#[derive(Deserialize, Debug, Clone)]
struct VerifyRequest {
    method: TwoFactorMethod,
    code: String,
}

async fn verify(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Json(data): Json<VerifyRequest>,
) -> Result<Json<TwoFactorStatus>> {
    Ok(Json(
        state
            .two_factor()
            .verify(&user, data.method, data.code.trim())
            .await?,
    ))
}

async fn disable(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
) -> Result<Json<TwoFactorStatus>> {
    Ok(Json(state.two_factor().disable(&user).await?))
}

#[derive(Deserialize, Debug, Clone)]
struct SendCodeRequest {
    email: String,
    password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SendCodeResponse {
    pub sent: bool,
    pub method: TwoFactorMethod,
}

async fn send_code(
    State(state): State<ApplicationState>,
    Json(data): Json<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>> {
    let method = state
        .two_factor()
        .send_login_code(data.email.as_str(), data.password.as_str())
        .await?;

    Ok(Json(SendCodeResponse { sent: true, method }))
}

#[derive(Deserialize, Debug, Clone)]
struct LoginVerifyRequest {
    email: String,
    password: String,
    code: String,
}

async fn login_verify(
    State(state): State<ApplicationState>,
    Json(data): Json<LoginVerifyRequest>,
) -> Result<Json<SecondFactorProof>> {
    Ok(Json(
        state
            .two_factor()
            .verify_login(
                data.email.as_str(),
                data.password.as_str(),
                data.code.trim(),
            )
            .await?,
    ))
}
