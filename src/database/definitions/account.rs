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

use crate::prelude::*;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use strum::{AsRefStr, EnumString};

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorMethod {
    Authenticator,
    Email,
    Sms,
}

/// The material backing the second factor. A TOTP secret lives as long as the enrollment, a
/// one-time code is consumed by its first successful use and expires after a ttl.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TwoFactorSecret {
    Totp {
        secret: String,
    },
    Otp {
        code: String,
        #[serde(rename = "issuedAt")]
        issued_at: DateTime<Utc>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TwoFactorState {
    Disabled,
    Pending(TwoFactorMethod),
    Enabled(TwoFactorMethod),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Getters, Default)]
#[get = "pub"]
pub struct TwoFactor {
    #[getset(skip)]
    enabled: bool,
    method: Option<TwoFactorMethod>,
    secret: Option<TwoFactorSecret>,
}

impl TwoFactor {
    pub fn pending(method: TwoFactorMethod, secret: TwoFactorSecret) -> Self {
        Self {
            enabled: false,
            method: Some(method),
            secret: Some(secret),
        }
    }

    pub fn enabled(method: TwoFactorMethod, secret: Option<TwoFactorSecret>) -> Self {
        Self {
            enabled: true,
            method: Some(method),
            secret,
        }
    }

    pub fn state(&self) -> TwoFactorState {
        match (self.enabled, self.method) {
            (true, Some(method)) => TwoFactorState::Enabled(method),
            (false, Some(method)) if self.secret.is_some() => TwoFactorState::Pending(method),
            _ => TwoFactorState::Disabled,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Getters)]
#[get = "pub"]
pub struct User {
    id: String,
    email: String,
    password: String,
    name: String,
    phone_number: Option<String>,
    #[serde(default)]
    two_factor: TwoFactor,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl User {
    pub fn two_factor_enabled(&self) -> bool {
        self.two_factor.enabled
    }

    pub fn with_two_factor(mut self, two_factor: TwoFactor) -> Self {
        self.two_factor = two_factor;
        self.updated_at = Utc::now();
        self
    }

    pub fn with_phone_number(mut self, phone_number: &str) -> Self {
        self.phone_number = Some(phone_number.to_owned());
        self.updated_at = Utc::now();
        self
    }
}

/// The publicly visible part of a [`User`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub two_factor_enabled: bool,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            phone_number: user.phone_number.clone(),
            two_factor_enabled: user.two_factor.enabled,
        }
    }
}

#[derive(Clone, Getters, Setters)]
pub struct WriteUser<'a> {
    #[get = "pub"]
    #[set = "pub"]
    email: Option<&'a str>,
    #[get = "pub"]
    #[set = "pub"]
    name: Option<&'a str>,
    #[get = "pub"]
    #[set = "pub"]
    password: Option<&'a str>,
    #[get = "pub"]
    #[set = "pub"]
    phone_number: Option<&'a str>,
    store: Arc<dyn Store>,
}

impl<'a> From<Arc<dyn Store>> for WriteUser<'a> {
    fn from(store: Arc<dyn Store>) -> Self {
        Self {
            email: None,
            name: None,
            password: None,
            phone_number: None,
            store,
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

impl<'a> IntoFuture for WriteUser<'a> {
    type Output = Result<User>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let (Some(email), Some(name), Some(password)) = (self.email, self.name, self.password)
            else {
                return Err(ApplicationError::InternalServerError);
            };

            let now = Utc::now();
            let user = User {
                id: nanoid::nanoid!(),
                email: email.trim().to_lowercase(),
                password: hash_password(password)?,
                name: name.trim().to_owned(),
                phone_number: self
                    .phone_number
                    .map(str::trim)
                    .filter(|phone| !phone.is_empty())
                    .map(str::to_owned),
                two_factor: TwoFactor::default(),
                updated_at: now,
                created_at: now,
            };

            self.store.create_user(&user).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[tokio::test]
    async fn test_write() -> std::result::Result<(), axum::BoxError> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());

        let user = WriteUser::from(store.clone())
            .set_name(Some(" name "))
            .set_email(Some("Test@Test.de"))
            .set_password(Some("password"))
            .to_owned()
            .await?;

        assert_eq!(user.name, "name".to_owned());
        assert_eq!(user.email, "test@test.de".to_owned());
        assert_ne!(user.password, "password".to_owned());
        assert_eq!(user.two_factor.state(), TwoFactorState::Disabled);

        let duplicate = WriteUser::from(store)
            .set_name(Some("other"))
            .set_email(Some("test@test.de"))
            .set_password(Some("password"))
            .to_owned()
            .await;
        assert!(matches!(duplicate, Err(ApplicationError::Conflict(_))));

        Ok(())
    }

    #[test]
    fn test_state() {
        let secret = TwoFactorSecret::Totp {
            secret: "SECRET".to_owned(),
        };

        assert_eq!(TwoFactor::default().state(), TwoFactorState::Disabled);
        assert_eq!(
            TwoFactor::pending(TwoFactorMethod::Authenticator, secret).state(),
            TwoFactorState::Pending(TwoFactorMethod::Authenticator)
        );
        assert_eq!(
            TwoFactor::enabled(TwoFactorMethod::Sms, None).state(),
            TwoFactorState::Enabled(TwoFactorMethod::Sms)
        );
    }

    #[test]
    fn test_secret_encoding() {
        let secret = TwoFactorSecret::Otp {
            code: "123456".to_owned(),
            issued_at: Utc::now(),
        };
        let value = serde_json::to_value(&secret).unwrap();

        assert_eq!(value["type"], "otp");
        assert_eq!(value["code"], "123456");
        assert!(value.get("issuedAt").is_some());
    }
}
