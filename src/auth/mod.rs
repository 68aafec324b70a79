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

use crate::auth::proof::ProofIssuer;
use crate::auth::session::{EndSession, Session, WriteSession};
use crate::database::definitions::account::{User, WriteUser};
use crate::prelude::*;
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

pub mod middleware;
pub mod proof;
pub mod session;
pub mod two_factor;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

const NAME_LENGTH: std::ops::RangeInclusive<usize> = 2..=100;
const PASSWORD_LENGTH: usize = 8;

/// Compares the password against the stored argon2 hash.
#[instrument(skip_all)]
pub fn verify_password(user: &User, password: &str) -> Result<()> {
    let hash = PasswordHash::new(user.password().as_str())?;

    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .map_err(|_| ApplicationError::Unauthorized)
}

/// Resolves the user behind an email and password. An unknown email and a wrong password are
/// both [`ApplicationError::Unauthorized`].
#[instrument(skip_all)]
pub async fn verify_credentials(store: &dyn Store, email: &str, password: &str) -> Result<User> {
    let user = store
        .find_user_by_email(email)
        .await?
        .ok_or(ApplicationError::Unauthorized)?;
    verify_password(&user, password)?;

    Ok(user)
}

#[async_trait]
pub trait Authenticate {
    /// The primary login check. A user with an enabled second factor additionally needs a valid
    /// proof issued by the second factor verification.
    fn login(
        &self,
        password: &str,
        proof: Option<&str>,
        proofs: &ProofIssuer,
        now: DateTime<Utc>,
    ) -> Result<()>;
    async fn logout(&self, store: &dyn Store) -> Result<()>;
    async fn start_session(&self, store: &dyn Store) -> Result<Session>;
}

#[async_trait]
impl Authenticate for User {
    #[instrument(skip_all, fields(user = %self.id()))]
    fn login(
        &self,
        password: &str,
        proof: Option<&str>,
        proofs: &ProofIssuer,
        now: DateTime<Utc>,
    ) -> Result<()> {
        verify_password(self, password)?;

        if self.two_factor_enabled() {
            return match proof {
                Some(token) => proofs.verify(token, self.id(), now),
                None => Err(ApplicationError::TwoFactorRequired),
            };
        }

        Ok(())
    }

    async fn logout(&self, store: &dyn Store) -> Result<()> {
        EndSession::new(self.id(), store).await
    }

    async fn start_session(&self, store: &dyn Store) -> Result<Session> {
        WriteSession::new(self.id(), store).await
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub password: String,
    pub password_confirmation: String,
    pub phone_number: Option<String>,
}

impl Registration {
    fn validate(&self) -> Result<()> {
        if !EMAIL.is_match(self.email.trim()) {
            return Err(ApplicationError::BadRequest(t!("auth.email_invalid")));
        }
        if !NAME_LENGTH.contains(&self.name.trim().chars().count()) {
            return Err(ApplicationError::BadRequest(t!("auth.name_length")));
        }
        if self.password.chars().count() < PASSWORD_LENGTH {
            return Err(ApplicationError::BadRequest(t!("auth.password_length")));
        }
        if self.password != self.password_confirmation {
            return Err(ApplicationError::BadRequest(t!("auth.password_mismatch")));
        }

        Ok(())
    }
}

#[instrument(skip_all)]
pub async fn register(store: Arc<dyn Store>, registration: &Registration) -> Result<User> {
    registration.validate()?;

    let user = WriteUser::from(store)
        .set_email(Some(registration.email.as_str()))
        .set_name(Some(registration.name.as_str()))
        .set_password(Some(registration.password.as_str()))
        .set_phone_number(registration.phone_number.as_deref())
        .to_owned()
        .await?;
    info!("Registered user {}", user.id());

    Ok(user)
}
