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

use crate::auth::session::Session;
use crate::database::definitions::account::{TwoFactor, User};
use crate::database::definitions::task::history::TaskHistoryEntry;
use crate::database::definitions::task::Task;
use crate::database::surreal::SurrealStore;
use crate::prelude::*;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub mod definitions;
#[cfg(test)]
pub mod memory;
pub mod page;
pub mod surreal;

pub type DatabaseConnection = Surreal<Any>;

#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub namespace: String,
    pub database: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persists a new user, failing with [`ApplicationError::Conflict`] if the email is taken.
    async fn create_user(&self, user: &User) -> Result<User>;

    async fn save_two_factor(&self, id: &str, two_factor: &TwoFactor) -> Result<()>;

    async fn save_phone_number(&self, id: &str, phone_number: &str) -> Result<()>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_task(&self, owner: &str, id: &str) -> Result<Option<Task>>;

    async fn list_tasks(&self, owner: &str, options: PagingOptions) -> Result<Page<Task>>;

    /// Persists a single task. A task with the same owner, title and due date is a conflict.
    async fn create_task(&self, task: &Task) -> Result<Task>;

    async fn update_task(&self, task: &Task) -> Result<Task>;

    async fn delete_task(&self, owner: &str, id: &str) -> Result<()>;

    /// Inserts every task that does not collide with an existing one and returns the inserted
    /// subset in input order. Collisions are skipped, not reported as errors.
    async fn insert_tasks(&self, tasks: Vec<Task>) -> Result<Vec<Task>>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_history(&self, entry: &TaskHistoryEntry) -> Result<()>;

    /// Newest first.
    async fn list_history(&self, task: &str) -> Result<Vec<TaskHistoryEntry>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_session(&self, session: &Session) -> Result<()>;

    async fn find_session(&self, id: &str) -> Result<Option<Session>>;

    async fn end_session(&self, id: &str) -> Result<()>;

    async fn end_sessions(&self, target: &str) -> Result<()>;
}

pub trait Store: UserStore + TaskStore + HistoryStore + SessionStore {}

impl<T> Store for T where T: UserStore + TaskStore + HistoryStore + SessionStore {}

pub async fn connect(options: &DatabaseOptions) -> Result<SurrealStore> {
    // establish the connection
    let client = surrealdb::engine::any::connect(options.endpoint.as_str()).await?;
    info!("Established connection to surrealdb");

    // authenticate
    if let (Some(username), Some(password)) = (&options.username, &options.password) {
        client
            .signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        info!("Authenticated with surrealdb");
    }

    // use namespace and database
    client
        .use_ns(options.namespace.as_str())
        .use_db(options.database.as_str())
        .await?;

    // execute the up queries
    client.query(include_str!("./up.surrealql")).await?.check()?;
    info!("Initiated tables");

    Ok(SurrealStore::from(client))
}

#[macro_export]
macro_rules! sql_span {
    ($request: expr) => {
        tracing::Instrument::instrument(
            std::future::IntoFuture::into_future($request),
            tracing::info_span!("Surrealdb Request"),
        )
    };
    ($request: expr, $title: expr) => {
        tracing::Instrument::instrument(
            std::future::IntoFuture::into_future($request),
            tracing::info_span!(concat!("Surrealdb Request: ", $title)),
        )
    };
}
