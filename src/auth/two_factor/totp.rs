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
use totp_rs::{Algorithm, Secret, TOTP};

const DIGITS: usize = 6;
// tolerated clock drift, in steps before and after the current one
const SKEW: u8 = 2;
const STEP: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSetup {
    /// png data url of the provisioning uri
    pub qr_code: String,
    /// base32 encoded shared secret, for manual entry
    pub secret: String,
    pub provisioning_uri: String,
}

pub struct TotpService {
    issuer: String,
}

impl TotpService {
    pub fn new(issuer: &str) -> Self {
        Self {
            issuer: issuer.to_owned(),
        }
    }

    pub fn generate_secret(&self) -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    fn build(&self, secret: &str, account: &str) -> Result<TOTP> {
        let secret = Secret::Encoded(secret.to_owned()).to_bytes().map_err(|error| {
            error!("Invalid totp secret: {:?}", error);
            ApplicationError::InternalServerError
        })?;

        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP,
            secret,
            Some(self.issuer.clone()),
            account.to_owned(),
        )
        .map_err(|error| {
            error!("Unable to build totp: {}", error);
            ApplicationError::InternalServerError
        })
    }

    pub fn provision(&self, secret: &str, account: &str) -> Result<AuthenticatorSetup> {
        let totp = self.build(secret, account)?;
        let qr_code = totp.get_qr_base64().map_err(|error| {
            error!("Unable to render qr code: {}", error);
            ApplicationError::InternalServerError
        })?;

        Ok(AuthenticatorSetup {
            qr_code: format!("data:image/png;base64,{}", qr_code),
            secret: secret.to_owned(),
            provisioning_uri: totp.get_url(),
        })
    }

    /// Checks the code against the steps around the given unix timestamp.
    pub fn check(&self, secret: &str, code: &str, timestamp: u64) -> Result<bool> {
        Ok(self.build(secret, "")?.check(code, timestamp))
    }

    #[cfg(test)]
    pub fn generate(&self, secret: &str, timestamp: u64) -> Result<String> {
        Ok(self.build(secret, "")?.generate(timestamp))
    }
}
