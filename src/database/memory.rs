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
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process store for tests, applying the same uniqueness rules as the surrealdb indexes.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    tasks: RwLock<Vec<Task>>,
    history: RwLock<Vec<TaskHistoryEntry>>,
    sessions: RwLock<HashMap<String, Session>>,
}

fn collides(existing: &Task, task: &Task) -> bool {
    existing.id() != task.id()
        && existing.owner() == task.owner()
        && existing.title() == task.title()
        && existing.due_date() == task.due_date()
}

impl MemoryStore {
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn history(&self) -> Vec<TaskHistoryEntry> {
        self.history.read().await.clone()
    }

    pub async fn user(&self, id: &str) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();

        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email() == &email)
            .cloned())
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email() == user.email()) {
            return Err(ApplicationError::Conflict(t!("auth.email_in_use")));
        }

        users.insert(user.id().clone(), user.clone());
        Ok(user.clone())
    }

    async fn save_two_factor(&self, id: &str, two_factor: &TwoFactor) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(id)
            .ok_or_else(|| ApplicationError::NotFound(id.to_owned()))?;

        *user = user.clone().with_two_factor(two_factor.clone());

        Ok(())
    }

    async fn save_phone_number(&self, id: &str, phone_number: &str) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(id)
            .ok_or_else(|| ApplicationError::NotFound(id.to_owned()))?;

        *user = user.clone().with_phone_number(phone_number);

        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn find_task(&self, owner: &str, id: &str) -> Result<Option<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .find(|task| task.id() == id && task.owner() == owner)
            .cloned())
    }

    async fn list_tasks(&self, owner: &str, options: PagingOptions) -> Result<Page<Task>> {
        let mut tasks = self
            .tasks
            .read()
            .await
            .iter()
            .filter(|task| task.owner() == owner)
            .cloned()
            .collect::<Vec<_>>();
        tasks.sort_by_key(|task| *task.due_date());

        Ok(options.slice(tasks))
    }

    async fn create_task(&self, task: &Task) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        if tasks.iter().any(|existing| collides(existing, task)) {
            return Err(ApplicationError::Conflict(t!("task.duplicate")));
        }

        tasks.push(task.clone());
        Ok(task.clone())
    }

    async fn update_task(&self, task: &Task) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        if tasks.iter().any(|existing| collides(existing, task)) {
            return Err(ApplicationError::Conflict(t!("task.duplicate")));
        }

        match tasks.iter_mut().find(|existing| existing.id() == task.id()) {
            Some(existing) => *existing = task.clone(),
            None => tasks.push(task.clone()),
        }

        Ok(task.clone())
    }

    async fn delete_task(&self, owner: &str, id: &str) -> Result<()> {
        self.tasks
            .write()
            .await
            .retain(|task| !(task.id() == id && task.owner() == owner));

        Ok(())
    }

    async fn insert_tasks(&self, tasks: Vec<Task>) -> Result<Vec<Task>> {
        let mut stored = self.tasks.write().await;
        let mut inserted = Vec::with_capacity(tasks.len());

        for task in tasks {
            if stored.iter().any(|existing| collides(existing, &task)) {
                continue;
            }

            stored.push(task.clone());
            inserted.push(task);
        }

        Ok(inserted)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append_history(&self, entry: &TaskHistoryEntry) -> Result<()> {
        self.history.write().await.push(entry.clone());

        Ok(())
    }

    async fn list_history(&self, task: &str) -> Result<Vec<TaskHistoryEntry>> {
        let mut entries = self
            .history
            .read()
            .await
            .iter()
            .filter(|entry| entry.task() == task)
            .cloned()
            .collect::<Vec<_>>();
        // stable, so entries created in the same instant keep their insertion order reversed
        entries.reverse();
        entries.sort_by(|a, b| b.created_at().cmp(a.created_at()));

        Ok(entries)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save_session(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id().clone(), session.clone());

        Ok(())
    }

    async fn find_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn end_session(&self, id: &str) -> Result<()> {
        self.sessions.write().await.remove(id);

        Ok(())
    }

    async fn end_sessions(&self, target: &str) -> Result<()> {
        self.sessions
            .write()
            .await
            .retain(|_, session| session.target() != target);

        Ok(())
    }
}
