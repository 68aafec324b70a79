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
use crate::auth::two_factor::TwoFactorOptions;
use crate::database::DatabaseOptions;
use crate::delivery::mail::MailOptions;
use crate::delivery::sms::SmsOptions;
use crate::delivery::Courier;
use crate::import::ocr::OcrClient;
use crate::import::ImportOptions;
use crate::prelude::*;
use chrono::Duration;
use lazy_static::lazy_static;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub mod state;

#[derive(Deserialize, Debug, Clone, Getters)]
#[get = "pub"]
pub struct Config {
    #[serde(default = "default_bind_address")]
    bind_address: String,
    #[serde(default = "default_surrealdb_endpoint")]
    surrealdb_endpoint: String,
    surrealdb_username: Option<String>,
    surrealdb_password: Option<String>,
    #[serde(default = "default_surrealdb_namespace")]
    surrealdb_namespace: String,
    #[serde(default = "default_surrealdb_database")]
    surrealdb_database: String,
    smtp_host: Option<String>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    smtp_from: Option<String>,
    twilio_account_sid: Option<String>,
    twilio_auth_token: Option<String>,
    twilio_phone_number: Option<String>,
    #[serde(default = "default_ocr_api_url")]
    ocr_api_url: String,
    #[serde(default = "default_collaborator_timeout_secs")]
    collaborator_timeout_secs: u64,
    #[serde(default = "default_totp_issuer")]
    totp_issuer: String,
    #[serde(default = "default_two_factor_code_ttl_secs")]
    two_factor_code_ttl_secs: i64,
    two_factor_proof_secret: Option<String>,
    #[serde(default = "default_two_factor_proof_ttl_secs")]
    two_factor_proof_ttl_secs: i64,
    #[serde(default = "default_max_upload_bytes")]
    max_upload_bytes: usize,
    #[serde(default = "default_locale")]
    locale: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_owned()
}

fn default_surrealdb_endpoint() -> String {
    "mem://".to_owned()
}

fn default_surrealdb_namespace() -> String {
    "production".to_owned()
}

fn default_surrealdb_database() -> String {
    "taskboard".to_owned()
}

fn default_ocr_api_url() -> String {
    "http://localhost:8001".to_owned()
}

fn default_collaborator_timeout_secs() -> u64 {
    30
}

fn default_totp_issuer() -> String {
    "Taskboard".to_owned()
}

// 10m
fn default_two_factor_code_ttl_secs() -> i64 {
    600
}

// 5m
fn default_two_factor_proof_ttl_secs() -> i64 {
    300
}

// 10 MiB
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_locale() -> String {
    "fr".to_owned()
}

lazy_static! {
    pub static ref CONFIGURATION: Config = envy::from_env::<Config>().unwrap();
}

impl Config {
    pub fn collaborator_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.collaborator_timeout_secs)
    }

    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            endpoint: self.surrealdb_endpoint.clone(),
            username: self.surrealdb_username.clone(),
            password: self.surrealdb_password.clone(),
            namespace: self.surrealdb_namespace.clone(),
            database: self.surrealdb_database.clone(),
        }
    }

    pub fn mail_options(&self) -> Option<MailOptions> {
        match (&self.smtp_host, &self.smtp_username, &self.smtp_password) {
            (Some(host), Some(username), Some(password)) => Some(MailOptions {
                host: host.clone(),
                username: username.clone(),
                password: password.clone(),
                from: self.smtp_from.clone().unwrap_or_else(|| username.clone()),
                timeout: self.collaborator_timeout(),
            }),
            _ => None,
        }
    }

    pub fn sms_options(&self) -> Option<SmsOptions> {
        match (
            &self.twilio_account_sid,
            &self.twilio_auth_token,
            &self.twilio_phone_number,
        ) {
            (Some(account_sid), Some(auth_token), Some(from)) => Some(SmsOptions {
                account_sid: account_sid.clone(),
                auth_token: auth_token.clone(),
                from: from.clone(),
                timeout: self.collaborator_timeout(),
            }),
            _ => None,
        }
    }

    pub fn two_factor_options(&self) -> TwoFactorOptions {
        TwoFactorOptions {
            issuer: self.totp_issuer.clone(),
            code_ttl: Duration::seconds(self.two_factor_code_ttl_secs),
        }
    }

    pub fn proof_issuer(&self) -> ProofIssuer {
        let ttl = Duration::seconds(self.two_factor_proof_ttl_secs);

        match &self.two_factor_proof_secret {
            Some(secret) => ProofIssuer::new(secret.as_bytes(), ttl),
            None => {
                warn!("TWO_FACTOR_PROOF_SECRET is not set, second factor proofs will not survive a restart");
                ProofIssuer::random(ttl)
            }
        }
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

pub fn init() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    lazy_static::initialize(&CONFIGURATION);
    rust_i18n::set_locale(CONFIGURATION.locale());

    tokio::runtime::Runtime::new()?.block_on(async move {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer())
            .init();

        let (axum_sender, axum_receiver) = kanal::unbounded_async::<()>();

        let store = crate::database::connect(&CONFIGURATION.database_options()).await?;
        let delivery = Courier::new(
            CONFIGURATION.mail_options(),
            CONFIGURATION.sms_options(),
        )?;
        let extractor = OcrClient::new(
            CONFIGURATION.ocr_api_url(),
            CONFIGURATION.collaborator_timeout(),
        )?;
        let state = ApplicationState::new(
            Arc::new(store),
            Arc::new(delivery),
            Arc::new(extractor),
            CONFIGURATION.proof_issuer(),
            CONFIGURATION.two_factor_options(),
            CONFIGURATION.import_options(),
        );
        let addr: SocketAddr = CONFIGURATION.bind_address().parse()?;

        let server = tokio::spawn(async move {
            let router = crate::routes::router(state);
            info!("Listening on {}", addr);

            if let Err(error) = axum::Server::bind(&addr)
                .serve(router.into_make_service())
                .with_graceful_shutdown(async {
                    axum_receiver.recv().await.ok();
                })
                .await
            {
                error!("Server terminated: {}", error);
            }
        });

        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(error) => {
                error!("Unable to listen for shutdown signal: {}", error);
            }
        }

        info!("Received shutdown signal... Shutting down...");
        // shutdown
        axum_sender.send(()).await?;
        server.await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
