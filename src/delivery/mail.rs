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
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MailOptions {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
    pub timeout: Duration,
}

pub struct MailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl MailTransport {
    pub fn new(options: MailOptions) -> Result<Self> {
        let from = options.from.parse::<Mailbox>().map_err(|error| {
            error!("Invalid SMTP sender address: {}", error);
            ApplicationError::InternalServerError
        })?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(options.host.as_str())?
            .credentials(Credentials::new(options.username, options.password))
            .timeout(Some(options.timeout))
            .build();

        Ok(Self { transport, from })
    }

    #[instrument(skip(self, body))]
    pub async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient
                .parse()
                .map_err(|_| ApplicationError::BadRequest(t!("delivery.invalid_recipient")))?)
            .subject(subject)
            .body(body.to_owned())
            .map_err(|error| {
                error!("Unable to build mail: {}", error);
                ApplicationError::InternalServerError
            })?;

        // send the mail
        self.transport.send(message).await?;
        info!("Delivered mail");

        Ok(())
    }
}
