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
use crate::prelude::*;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

fn bearer<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Resolves the session and its user, and stores both in the request extensions.
pub async fn require_session<B>(
    State(state): State<ApplicationState>,
    mut request: Request<B>,
    next: Next<B>,
) -> Response {
    let Some(session_id) = bearer(&request).map(str::to_owned) else {
        return ApplicationError::Unauthorized.into_response();
    };
    let store = state.store().as_ref();

    // verify the session
    let session = match Session::validate_session(session_id.as_str(), store).await {
        Ok(session) => session,
        Err(error) => return error.into_response(),
    };

    // fetch the user
    match store.find_user(session.target()).await {
        Ok(Some(user)) => {
            let extensions = request.extensions_mut();
            extensions.insert(user);
            extensions.insert(session);

            next.run(request).await
        }
        Ok(None) => ApplicationError::Unauthorized.into_response(),
        Err(error) => error.into_response(),
    }
}

#[macro_export]
macro_rules! require_session {
    ($state:expr) => {
        axum::middleware::from_fn_with_state(
            $state.clone(),
            $crate::auth::middleware::require_session,
        )
    };
}
