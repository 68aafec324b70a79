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
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A signed statement that the user passed the second factor, presented on the next primary
/// login. Format: `<user id>.<expiry unix seconds>.<base64url hmac-sha256>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecondFactorProof {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct ProofIssuer {
    key: Vec<u8>,
    ttl: Duration,
}

impl ProofIssuer {
    pub fn new(key: &[u8], ttl: Duration) -> Self {
        Self {
            key: key.to_vec(),
            ttl,
        }
    }

    pub fn random(ttl: Duration) -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);

        Self::new(&key, ttl)
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.key.as_slice())
            .map_err(|_| ApplicationError::InternalServerError)?;
        mac.update(payload.as_bytes());

        Ok(mac)
    }

    #[instrument(skip(self, now))]
    pub fn issue(&self, user: &str, now: DateTime<Utc>) -> Result<SecondFactorProof> {
        let expires_at = now + self.ttl;
        let payload = format!("{}.{}", user, expires_at.timestamp());
        let signature = URL_SAFE_NO_PAD.encode(self.mac(payload.as_str())?.finalize().into_bytes());

        Ok(SecondFactorProof {
            token: format!("{payload}.{signature}"),
            expires_at: Utc
                .timestamp_opt(expires_at.timestamp(), 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Accepts the token only for the given user and before its expiry.
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str, user: &str, now: DateTime<Utc>) -> Result<()> {
        let mut parts = token.rsplitn(3, '.');
        let (Some(signature), Some(expiry), Some(subject)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ApplicationError::Unauthorized);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| ApplicationError::Unauthorized)?;
        self.mac(format!("{subject}.{expiry}").as_str())?
            .verify_slice(signature.as_slice())
            .map_err(|_| ApplicationError::Unauthorized)?;

        let expiry = expiry
            .parse::<i64>()
            .map_err(|_| ApplicationError::Unauthorized)?;
        if subject != user || now.timestamp() >= expiry {
            return Err(ApplicationError::Unauthorized);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> ProofIssuer {
        ProofIssuer::new(b"secret", Duration::seconds(300))
    }

    #[test]
    fn test_issue_and_verify() {
        let now = Utc::now();
        let proof = issuer().issue("user", now).unwrap();

        assert!(issuer().verify(&proof.token, "user", now).is_ok());
        assert!(issuer()
            .verify(&proof.token, "user", now + Duration::seconds(299))
            .is_ok());
    }

    #[test]
    fn test_rejects_other_user() {
        let now = Utc::now();
        let proof = issuer().issue("user", now).unwrap();

        assert!(issuer().verify(&proof.token, "other", now).is_err());
    }

    #[test]
    fn test_rejects_expired() {
        let now = Utc::now();
        let proof = issuer().issue("user", now).unwrap();

        assert!(issuer()
            .verify(&proof.token, "user", now + Duration::seconds(301))
            .is_err());
    }

    #[test]
    fn test_rejects_tampering() {
        let now = Utc::now();
        let proof = issuer().issue("user", now).unwrap();
        let forged = proof.token.replacen("user", "evil", 1);

        assert!(issuer().verify(&forged, "evil", now).is_err());
        assert!(ProofIssuer::new(b"other", Duration::seconds(300))
            .verify(&proof.token, "user", now)
            .is_err());
        assert!(issuer().verify("garbage", "user", now).is_err());
    }
}
