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

use crate::delivery::mail::{MailOptions, MailTransport};
use crate::delivery::sms::{SmsGateway, SmsOptions};
use crate::prelude::*;

pub mod mail;
pub mod sms;

/// Outbound channels used to hand one-time codes to a user.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send_mail(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;

    async fn send_sms(&self, phone_number: &str, message: &str) -> Result<()>;
}

/// Delivers over smtp and twilio. A channel without configuration logs and drops the message.
pub struct Courier {
    mail: Option<MailTransport>,
    sms: Option<SmsGateway>,
}

impl Courier {
    pub fn new(mail: Option<MailOptions>, sms: Option<SmsOptions>) -> Result<Self> {
        if mail.is_none() {
            warn!("SMTP is not configured, mails will not be delivered");
        }
        if sms.is_none() {
            warn!("Twilio is not configured, text messages will not be delivered");
        }

        Ok(Self {
            mail: mail.map(MailTransport::new).transpose()?,
            sms: sms.map(SmsGateway::new).transpose()?,
        })
    }
}

#[async_trait]
impl DeliveryChannel for Courier {
    #[instrument(skip(self, body))]
    async fn send_mail(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        match &self.mail {
            Some(transport) => transport.send(recipient, subject, body).await,
            None => {
                warn!("Dropping mail, SMTP is not configured");
                Ok(())
            }
        }
    }

    #[instrument(skip_all)]
    async fn send_sms(&self, phone_number: &str, message: &str) -> Result<()> {
        match &self.sms {
            Some(gateway) => gateway.send(phone_number, message).await,
            None => {
                warn!("Dropping text message, Twilio is not configured");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_channels_are_noops() {
        let courier = Courier::new(None, None).unwrap();

        assert!(courier
            .send_mail("test@example.com", "subject", "body")
            .await
            .is_ok());
        assert!(courier.send_sms("+33600000000", "message").await.is_ok());
    }
}
