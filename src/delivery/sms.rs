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
use std::time::Duration;

const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Clone)]
pub struct SmsOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub timeout: Duration,
}

/// Sends text messages through the Twilio messages api.
pub struct SmsGateway {
    client: reqwest::Client,
    options: SmsOptions,
}

impl SmsGateway {
    pub fn new(options: SmsOptions) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(options.timeout).build()?,
            options,
        })
    }

    #[instrument(skip_all)]
    pub async fn send(&self, phone_number: &str, message: &str) -> Result<()> {
        self.client
            .post(format!(
                "{}/Accounts/{}/Messages.json",
                TWILIO_API, self.options.account_sid
            ))
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .form(&[
                ("To", phone_number),
                ("From", self.options.from.as_str()),
                ("Body", message),
            ])
            .send()
            .await?
            .error_for_status()?;
        info!("Delivered text message");

        Ok(())
    }
}
