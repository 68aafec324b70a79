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

use crate::auth::session::Session;
use crate::auth::{Authenticate, Registration};
use crate::database::definitions::account::{Profile, User};
use crate::prelude::*;
use crate::require_session;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Extension, Router};
use chrono::Utc;

pub mod two_factor;

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route(
            "/logout",
            post(logout).layer(require_session!(state)),
        )
        .route(
            "/phone",
            put(update_phone_number).layer(require_session!(state)),
        )
        .with_state(state.clone())
        .nest("/2fa", two_factor::router(state))
}

async fn register(
    State(state): State<ApplicationState>,
    Json(data): Json<Registration>,
) -> Result<(StatusCode, Json<Profile>)> {
    let user = crate::auth::register(state.store().clone(), &data).await?;

    Ok((StatusCode::CREATED, Json(Profile::from(&user))))
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    email: String,
    password: String,
    /// the proof returned by the second factor verification
    two_factor_proof: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
    pub user: Profile,
}

async fn login(
    State(state): State<ApplicationState>,
    Json(data): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let store = state.store().as_ref();

    // fetch the user
    match store.find_user_by_email(data.email.as_str()).await? {
        Some(user) => {
            user.login(
                data.password.as_str(),
                data.two_factor_proof.as_deref(),
                state.proofs(),
                Utc::now(),
            )?;

            // start a new session
            let session = user.start_session(store).await?;

            Ok(Json(LoginResponse {
                session,
                user: Profile::from(&user),
            }))
        }
        None => Err(ApplicationError::Unauthorized),
    }
}

async fn logout(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
) -> Result<StatusCode> {
    user.logout(state.store().as_ref()).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct PhoneNumberRequest {
    phone_number: String,
}

async fn update_phone_number(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Json(data): Json<PhoneNumberRequest>,
) -> Result<Json<Profile>> {
    let phone_number = data.phone_number.trim();
    if phone_number.is_empty() {
        return Err(ApplicationError::BadRequest(t!("auth.phone_required")));
    }

    state
        .store()
        .save_phone_number(user.id(), phone_number)
        .await?;

    Ok(Json(Profile::from(&user.with_phone_number(phone_number))))
}
