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

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub const TWO_FACTOR_REQUIRED: &str = "2FA_REQUIRED";

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    InvalidCode(String),
    #[error("{}", TWO_FACTOR_REQUIRED)]
    TwoFactorRequired,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Extraction(String),
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    SurrealdbError(#[from] surrealdb::Error),
    #[error("Internal error occurred")]
    InternalServerError,
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    SMTPError(#[from] lettre::transport::smtp::Error),
    #[error(transparent)]
    HttpClientError(#[from] reqwest::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ApplicationError>;

impl From<argon2::password_hash::Error> for ApplicationError {
    fn from(error: argon2::password_hash::Error) -> Self {
        error!("Password hashing failed: {}", error);
        Self::InternalServerError
    }
}

macro_rules! log_test_error {
    ($error:expr) => {
        #[cfg(test)]
        {
            println!("Err: {:?}", $error.to_string());
        }
    };
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        match self {
            ApplicationError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({ "error": t!("auth.unauthorized") })),
            ),
            ApplicationError::InvalidCode(error) => {
                log_test_error!(error);
                (StatusCode::UNAUTHORIZED, axum::Json(json!({ "error": error })))
            }
            ApplicationError::TwoFactorRequired => (
                StatusCode::FORBIDDEN,
                axum::Json(json!({
                    "error": t!("auth.two_factor_required"),
                    "code": TWO_FACTOR_REQUIRED
                })),
            ),
            ApplicationError::BadRequest(error) => {
                log_test_error!(error);
                (StatusCode::BAD_REQUEST, axum::Json(json!({ "error": error })))
            }
            ApplicationError::NotFound(error) => {
                (StatusCode::NOT_FOUND, axum::Json(json!({ "error": error })))
            }
            ApplicationError::Conflict(error) => {
                (StatusCode::CONFLICT, axum::Json(json!({ "error": error })))
            }
            ApplicationError::Extraction(error) => {
                log_test_error!(error);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    axum::Json(json!({ "error": error })),
                )
            }
            ApplicationError::Upstream(error) => {
                warn!("Collaborator failure: {}", error);
                (StatusCode::BAD_GATEWAY, axum::Json(json!({ "error": error })))
            }
            _ => {
                error!("Err: {}", self.to_string());

                #[cfg(test)]
                {
                    println!("Err: {:?}", self.to_string());
                }

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(json!({ "error": t!("error.internal") })),
                )
            }
        }
        .into_response()
    }
}
