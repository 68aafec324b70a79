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

//! The second factor state machine: `disabled -> pending(method) -> enabled(method)` and back
//! to `disabled`, plus the login time code delivery and verification.

use crate::auth::proof::{ProofIssuer, SecondFactorProof};
use crate::auth::two_factor::totp::{AuthenticatorSetup, TotpService};
use crate::database::definitions::account::{
    TwoFactor, TwoFactorMethod, TwoFactorSecret, TwoFactorState, User,
};
use crate::delivery::DeliveryChannel;
use crate::prelude::*;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub mod code;
pub mod totp;

#[derive(Debug, Clone)]
pub struct TwoFactorOptions {
    pub issuer: String,
    pub code_ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorStatus {
    pub enabled: bool,
    pub method: Option<TwoFactorMethod>,
    pub pending: bool,
    pub phone_number: Option<String>,
}

/// What the client needs to complete an enrollment. One-time codes are never part of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Enrollment {
    Authenticator(AuthenticatorSetup),
    #[serde(rename_all = "camelCase")]
    CodeSent { method: TwoFactorMethod, sent: bool },
}

pub struct TwoFactorService {
    store: Arc<dyn Store>,
    delivery: Arc<dyn DeliveryChannel>,
    proofs: Arc<ProofIssuer>,
    totp: TotpService,
    options: TwoFactorOptions,
}

impl TwoFactorService {
    pub fn new(
        store: Arc<dyn Store>,
        delivery: Arc<dyn DeliveryChannel>,
        proofs: Arc<ProofIssuer>,
        options: TwoFactorOptions,
    ) -> Self {
        Self {
            store,
            delivery,
            proofs,
            totp: TotpService::new(options.issuer.as_str()),
            options,
        }
    }

    pub fn status(&self, user: &User) -> TwoFactorStatus {
        let two_factor = user.two_factor();

        TwoFactorStatus {
            enabled: user.two_factor_enabled(),
            method: *two_factor.method(),
            pending: matches!(two_factor.state(), TwoFactorState::Pending(_)),
            phone_number: user.phone_number().clone(),
        }
    }

    pub async fn enroll(&self, user: &User, method: TwoFactorMethod) -> Result<Enrollment> {
        self.enroll_at(user, method, Utc::now()).await
    }

    #[instrument(skip(self, user, now), fields(user = %user.id()))]
    pub async fn enroll_at(
        &self,
        user: &User,
        method: TwoFactorMethod,
        now: DateTime<Utc>,
    ) -> Result<Enrollment> {
        if let TwoFactorState::Enabled(_) = user.two_factor().state() {
            return Err(ApplicationError::BadRequest(t!(
                "two_factor.already_enabled"
            )));
        }

        match method {
            TwoFactorMethod::Authenticator => {
                let secret = self.totp.generate_secret();
                let setup = self.totp.provision(secret.as_str(), user.email())?;

                self.store
                    .save_two_factor(
                        user.id(),
                        &TwoFactor::pending(method, TwoFactorSecret::Totp { secret }),
                    )
                    .await?;
                info!("Started authenticator enrollment");

                Ok(Enrollment::Authenticator(setup))
            }
            TwoFactorMethod::Email | TwoFactorMethod::Sms => {
                // checked before anything is generated or stored
                let recipient = self.recipient(user, method)?;
                let code = code::generate_code();

                self.store
                    .save_two_factor(
                        user.id(),
                        &TwoFactor::pending(
                            method,
                            TwoFactorSecret::Otp {
                                code: code.clone(),
                                issued_at: now,
                            },
                        ),
                    )
                    .await?;

                let message = Message::enrollment(method, code.as_str());
                self.deliver(user, method, recipient.as_str(), message)
                    .await?;
                info!("Sent enrollment code");

                Ok(Enrollment::CodeSent { method, sent: true })
            }
        }
    }

    pub async fn verify(
        &self,
        user: &User,
        method: TwoFactorMethod,
        code: &str,
    ) -> Result<TwoFactorStatus> {
        self.verify_at(user, method, code, Utc::now()).await
    }

    #[instrument(skip(self, user, code, now), fields(user = %user.id()))]
    pub async fn verify_at(
        &self,
        user: &User,
        method: TwoFactorMethod,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<TwoFactorStatus> {
        if !code::is_well_formed(code) {
            return Err(ApplicationError::BadRequest(t!("two_factor.code_shape")));
        }

        let two_factor = user.two_factor();
        if two_factor.method() != &Some(method) || two_factor.secret().is_none() {
            return Err(ApplicationError::BadRequest(t!("two_factor.not_pending")));
        }

        if !self.matches(two_factor, code, now)? {
            return Err(ApplicationError::InvalidCode(t!("two_factor.invalid_code")));
        }

        // the totp secret is needed for future logins, a one-time code is consumed
        let secret = match two_factor.secret() {
            Some(TwoFactorSecret::Totp { secret }) => Some(TwoFactorSecret::Totp {
                secret: secret.clone(),
            }),
            _ => None,
        };
        let enabled = TwoFactor::enabled(method, secret);
        self.store.save_two_factor(user.id(), &enabled).await?;
        info!("Enabled second factor");

        Ok(self.status(&user.clone().with_two_factor(enabled)))
    }

    #[instrument(skip_all, fields(user = %user.id()))]
    pub async fn disable(&self, user: &User) -> Result<TwoFactorStatus> {
        let disabled = TwoFactor::default();
        self.store.save_two_factor(user.id(), &disabled).await?;
        info!("Disabled second factor");

        Ok(self.status(&user.clone().with_two_factor(disabled)))
    }

    pub async fn send_login_code(&self, email: &str, password: &str) -> Result<TwoFactorMethod> {
        self.send_login_code_at(email, password, Utc::now()).await
    }

    /// Issues and delivers a fresh login code. Requires the password so codes cannot be
    /// triggered by anyone knowing only the email.
    #[instrument(skip_all)]
    pub async fn send_login_code_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<TwoFactorMethod> {
        let user = crate::auth::verify_credentials(self.store.as_ref(), email, password).await?;

        let method = match user.two_factor().state() {
            TwoFactorState::Enabled(method) => method,
            _ => {
                return Err(ApplicationError::BadRequest(t!(
                    "two_factor.not_enabled"
                )))
            }
        };
        if method == TwoFactorMethod::Authenticator {
            return Err(ApplicationError::BadRequest(t!(
                "two_factor.no_delivery"
            )));
        }

        let recipient = self.recipient(&user, method)?;
        let code = code::generate_code();
        self.store
            .save_two_factor(
                user.id(),
                &TwoFactor::enabled(
                    method,
                    Some(TwoFactorSecret::Otp {
                        code: code.clone(),
                        issued_at: now,
                    }),
                ),
            )
            .await?;

        let message = Message::login(method, code.as_str());
        self.deliver(&user, method, recipient.as_str(), message)
            .await?;
        info!("Sent login code");

        Ok(method)
    }

    pub async fn verify_login(
        &self,
        email: &str,
        password: &str,
        code: &str,
    ) -> Result<SecondFactorProof> {
        self.verify_login_at(email, password, code, Utc::now())
            .await
    }

    /// Re-checks the password and the code, then returns the proof the primary login accepts
    /// in place of the second factor. No half authenticated state is kept on the server.
    #[instrument(skip_all)]
    pub async fn verify_login_at(
        &self,
        email: &str,
        password: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<SecondFactorProof> {
        if !code::is_well_formed(code) {
            return Err(ApplicationError::BadRequest(t!("two_factor.code_shape")));
        }

        let user = crate::auth::verify_credentials(self.store.as_ref(), email, password).await?;
        let two_factor = user.two_factor();
        let TwoFactorState::Enabled(method) = two_factor.state() else {
            return Err(ApplicationError::BadRequest(t!("two_factor.not_enabled")));
        };

        if !self.matches(two_factor, code, now)? {
            return Err(ApplicationError::InvalidCode(t!("two_factor.invalid_code")));
        }

        if let Some(TwoFactorSecret::Otp { .. }) = two_factor.secret() {
            self.store
                .save_two_factor(user.id(), &TwoFactor::enabled(method, None))
                .await?;
        }

        self.proofs.issue(user.id(), now)
    }

    fn matches(&self, two_factor: &TwoFactor, code: &str, now: DateTime<Utc>) -> Result<bool> {
        match two_factor.secret() {
            Some(TwoFactorSecret::Totp { secret }) => {
                self.totp
                    .check(secret.as_str(), code, now.timestamp().max(0) as u64)
            }
            Some(TwoFactorSecret::Otp {
                code: expected,
                issued_at,
            }) => Ok(expected == code && now - *issued_at <= self.options.code_ttl),
            None => Ok(false),
        }
    }

    fn recipient(&self, user: &User, method: TwoFactorMethod) -> Result<String> {
        match method {
            TwoFactorMethod::Sms => user
                .phone_number()
                .clone()
                .ok_or_else(|| ApplicationError::BadRequest(t!("two_factor.phone_required"))),
            _ => Ok(user.email().clone()),
        }
    }

    /// Delivers the message, restoring the previous second factor state if that fails.
    async fn deliver(
        &self,
        user: &User,
        method: TwoFactorMethod,
        recipient: &str,
        message: Message,
    ) -> Result<()> {
        let result = match method {
            TwoFactorMethod::Sms => self.delivery.send_sms(recipient, &message.body).await,
            _ => {
                self.delivery
                    .send_mail(recipient, &message.subject, &message.body)
                    .await
            }
        };

        if let Err(error) = result {
            error!("Unable to deliver code: {}", error);
            self.store
                .save_two_factor(user.id(), user.two_factor())
                .await?;

            return Err(ApplicationError::Upstream(t!("delivery.failed")));
        }

        Ok(())
    }
}

struct Message {
    subject: String,
    body: String,
}

impl Message {
    fn enrollment(method: TwoFactorMethod, code: &str) -> Self {
        match method {
            TwoFactorMethod::Sms => Self {
                subject: String::new(),
                body: t!("two_factor.sms_body", code = code),
            },
            _ => Self {
                subject: t!("two_factor.mail_subject"),
                body: t!("two_factor.mail_body", code = code),
            },
        }
    }

    fn login(method: TwoFactorMethod, code: &str) -> Self {
        match method {
            TwoFactorMethod::Sms => Self {
                subject: String::new(),
                body: t!("two_factor.sms_body", code = code),
            },
            _ => Self {
                subject: t!("two_factor.login_subject"),
                body: t!("two_factor.login_body", code = code),
            },
        }
    }
}
