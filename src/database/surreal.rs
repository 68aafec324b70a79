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
use crate::database::{HistoryStore, SessionStore, TaskStore, UserStore};
use crate::prelude::*;
use chrono::Utc;
use serde::Serialize;

const UNIQUE_VIOLATION: &str = "already contains";

/// Store backed by surrealdb. Records are keyed by the domain ids, which are exposed to the
/// domain through `meta::id`.
#[derive(Clone)]
pub struct SurrealStore {
    connection: DatabaseConnection,
}

impl From<DatabaseConnection> for SurrealStore {
    fn from(connection: DatabaseConnection) -> Self {
        Self { connection }
    }
}

/// Serializes the record without its id, which is carried by the record link instead.
fn content<T: Serialize>(record: &T) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(record)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("id");
    }

    Ok(value)
}

fn is_unique_violation(error: &surrealdb::Error) -> bool {
    error.to_string().contains(UNIQUE_VIOLATION)
}

impl SurrealStore {
    async fn create<T: Serialize>(&self, table: &str, id: &str, record: &T) -> Result<()> {
        sql_span!(self
            .connection
            .query("CREATE type::thing($table, $id) CONTENT $data")
            .bind(("table", table))
            .bind(("id", id))
            .bind(("data", content(record)?)))
        .await?
        .check()?;

        Ok(())
    }

    async fn replace<T: Serialize>(&self, table: &str, id: &str, record: &T) -> Result<()> {
        sql_span!(self
            .connection
            .query("UPDATE type::thing($table, $id) CONTENT $data")
            .bind(("table", table))
            .bind(("id", id))
            .bind(("data", content(record)?)))
        .await?
        .check()?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for SurrealStore {
    #[instrument(skip(self))]
    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(sql_span!(self
            .connection
            .query("SELECT *, meta::id(id) AS id FROM type::thing('user', $id)")
            .bind(("id", id)))
        .await?
        .take(0)?)
    }

    #[instrument(skip(self))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(sql_span!(self
            .connection
            .query("SELECT *, meta::id(id) AS id FROM user WHERE email = $email LIMIT 1")
            .bind(("email", email.trim().to_lowercase())))
        .await?
        .take(0)?)
    }

    #[instrument(skip_all)]
    async fn create_user(&self, user: &User) -> Result<User> {
        match self.create("user", user.id(), user).await {
            Ok(()) => Ok(user.clone()),
            Err(ApplicationError::SurrealdbError(error)) if is_unique_violation(&error) => {
                Err(ApplicationError::Conflict(t!("auth.email_in_use")))
            }
            Err(error) => Err(error),
        }
    }

    #[instrument(skip(self, two_factor))]
    async fn save_two_factor(&self, id: &str, two_factor: &TwoFactor) -> Result<()> {
        sql_span!(self
            .connection
            .query("UPDATE type::thing('user', $id) SET two_factor = $two_factor, updated_at = $now")
            .bind(("id", id))
            .bind(("two_factor", two_factor))
            .bind(("now", Utc::now())))
        .await?
        .check()?;

        Ok(())
    }

    #[instrument(skip(self, phone_number))]
    async fn save_phone_number(&self, id: &str, phone_number: &str) -> Result<()> {
        sql_span!(self
            .connection
            .query("UPDATE type::thing('user', $id) SET phone_number = $phone_number, updated_at = $now")
            .bind(("id", id))
            .bind(("phone_number", phone_number))
            .bind(("now", Utc::now())))
        .await?
        .check()?;

        Ok(())
    }
}

#[async_trait]
impl TaskStore for SurrealStore {
    #[instrument(skip(self))]
    async fn find_task(&self, owner: &str, id: &str) -> Result<Option<Task>> {
        Ok(sql_span!(self
            .connection
            .query("SELECT *, meta::id(id) AS id FROM type::thing('task', $id) WHERE owner = $owner")
            .bind(("id", id))
            .bind(("owner", owner)))
        .await?
        .take(0)?)
    }

    #[instrument(skip(self))]
    async fn list_tasks(&self, owner: &str, options: PagingOptions) -> Result<Page<Task>> {
        options
            .execute(
                "SELECT *, meta::id(id) AS id FROM task WHERE owner = $owner ORDER BY due_date ASC %%%",
                &[("owner", owner)],
                &self.connection,
            )
            .await
    }

    #[instrument(skip_all)]
    async fn create_task(&self, task: &Task) -> Result<Task> {
        match self.create("task", task.id(), task).await {
            Ok(()) => Ok(task.clone()),
            Err(ApplicationError::SurrealdbError(error)) if is_unique_violation(&error) => {
                Err(ApplicationError::Conflict(t!("task.duplicate")))
            }
            Err(error) => Err(error),
        }
    }

    #[instrument(skip_all)]
    async fn update_task(&self, task: &Task) -> Result<Task> {
        match self.replace("task", task.id(), task).await {
            Ok(()) => Ok(task.clone()),
            Err(ApplicationError::SurrealdbError(error)) if is_unique_violation(&error) => {
                Err(ApplicationError::Conflict(t!("task.duplicate")))
            }
            Err(error) => Err(error),
        }
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, owner: &str, id: &str) -> Result<()> {
        sql_span!(self
            .connection
            .query("DELETE type::thing('task', $id) WHERE owner = $owner")
            .bind(("id", id))
            .bind(("owner", owner)))
        .await?
        .check()?;

        Ok(())
    }

    #[instrument(skip_all, fields(count = tasks.len()))]
    async fn insert_tasks(&self, tasks: Vec<Task>) -> Result<Vec<Task>> {
        if tasks.is_empty() {
            return Ok(tasks);
        }

        // one statement per task, so a colliding row only fails its own statement
        let statements = (0..tasks.len())
            .map(|index| format!("CREATE type::thing('task', $id_{index}) CONTENT $task_{index};"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut request = self.connection.query(statements);
        for (index, task) in tasks.iter().enumerate() {
            request = request
                .bind((format!("id_{index}"), task.id()))
                .bind((format!("task_{index}"), content(task)?));
        }

        let mut response = sql_span!(request, "bulk insert").await?;
        let errors = response.take_errors();

        let mut inserted = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.into_iter().enumerate() {
            match errors.get(&index) {
                None => inserted.push(task),
                Some(error) if is_unique_violation(error) => {
                    debug!("Skipping duplicate task {}", task.title());
                }
                Some(error) => {
                    error!("Bulk insert failed: {}", error);
                    return Err(ApplicationError::InternalServerError);
                }
            }
        }

        Ok(inserted)
    }
}

#[async_trait]
impl HistoryStore for SurrealStore {
    #[instrument(skip_all)]
    async fn append_history(&self, entry: &TaskHistoryEntry) -> Result<()> {
        self.create("history", entry.id(), entry).await
    }

    #[instrument(skip(self))]
    async fn list_history(&self, task: &str) -> Result<Vec<TaskHistoryEntry>> {
        Ok(sql_span!(self
            .connection
            .query("SELECT *, meta::id(id) AS id FROM history WHERE task = $task ORDER BY created_at DESC")
            .bind(("task", task)))
        .await?
        .take(0)?)
    }
}

#[async_trait]
impl SessionStore for SurrealStore {
    #[instrument(skip_all)]
    async fn save_session(&self, session: &Session) -> Result<()> {
        self.create("session", session.id(), session).await
    }

    #[instrument(skip_all)]
    async fn find_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(sql_span!(self
            .connection
            .query("SELECT *, meta::id(id) AS id FROM type::thing('session', $id)")
            .bind(("id", id)))
        .await?
        .take(0)?)
    }

    #[instrument(skip_all)]
    async fn end_session(&self, id: &str) -> Result<()> {
        sql_span!(self
            .connection
            .query("DELETE type::thing('session', $id)")
            .bind(("id", id)))
        .await?
        .check()?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn end_sessions(&self, target: &str) -> Result<()> {
        sql_span!(self
            .connection
            .query("DELETE session WHERE target = $target")
            .bind(("target", target)))
        .await?
        .check()?;

        Ok(())
    }
}
