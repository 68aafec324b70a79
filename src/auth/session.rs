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
use chrono::{DateTime, Duration, Utc};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

const ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

// 15m
const SESSION_LENGTH: i64 = 900;

#[derive(Clone, Debug, Getters, Deserialize, Serialize, PartialEq)]
#[get = "pub"]
pub struct Session {
    id: String,
    target: String,
    iat: DateTime<Utc>,
    exp: DateTime<Utc>,
}

impl Session {
    // Check whether a session is valid or not
    #[instrument(skip_all)]
    pub async fn validate_session(id: &str, store: &dyn Store) -> Result<Session> {
        match store.find_session(id).await? {
            Some(session) => {
                session.is_valid(store).await?;
                Ok(session)
            }
            None => Err(ApplicationError::Unauthorized),
        }
    }

    #[instrument(skip_all)]
    pub async fn is_valid(&self, store: &dyn Store) -> Result<()> {
        if Utc::now() >= self.exp {
            // the session is not anymore valid, so we end it.
            self.end(store).await?;

            Err(ApplicationError::Unauthorized)
        } else {
            Ok(())
        }
    }

    /// Ends the given session
    #[instrument(skip_all)]
    pub async fn end(&self, store: &dyn Store) -> Result<()> {
        store.end_session(self.id.as_str()).await
    }
}

#[derive(Clone)]
pub struct EndSession<'a> {
    target: &'a str,
    store: &'a dyn Store,
}

impl<'a> EndSession<'a> {
    pub fn new(target: &'a str, store: &'a dyn Store) -> Self {
        Self { target, store }
    }
}

impl<'a> IntoFuture for EndSession<'a> {
    type Output = Result<()>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.store.end_sessions(self.target).await })
    }
}

#[derive(Clone)]
pub struct WriteSession<'a> {
    target: &'a str,
    store: &'a dyn Store,
}

impl<'a> WriteSession<'a> {
    pub fn new(target: &'a str, store: &'a dyn Store) -> Self {
        Self { target, store }
    }
}

impl<'a> IntoFuture for WriteSession<'a> {
    type Output = Result<Session>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let iat = Utc::now();
            let exp = iat + Duration::seconds(SESSION_LENGTH);

            // end currently active sessions for the target
            EndSession::new(self.target, self.store).await?;

            let session = Session {
                id: nanoid::nanoid!(64, &ALPHABET),
                target: self.target.to_owned(),
                iat,
                exp,
            };
            self.store.save_session(&session).await?;

            Ok(session)
        })
    }
}
