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

use crate::database::definitions::account::User;
use crate::database::definitions::task::{FieldChange, Task, TaskField, TaskPriority, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use std::str::FromStr;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Getters)]
#[get = "pub"]
pub struct TaskHistoryEntry {
    id: String,
    task: String,
    actor: String,
    change_type: ChangeType,
    field_name: Option<TaskField>,
    old_value: Option<String>,
    new_value: Option<String>,
    message: String,
    created_at: DateTime<Utc>,
}

type MessageFormatter = fn(&FieldChange, &str) -> String;

const MESSAGES: [(TaskField, MessageFormatter); 5] = [
    (TaskField::Title, title_message),
    (TaskField::Description, description_message),
    (TaskField::Status, status_message),
    (TaskField::Priority, priority_message),
    (TaskField::DueDate, due_date_message),
];

fn title_message(_: &FieldChange, actor: &str) -> String {
    t!("history.title", name = actor)
}

fn description_message(_: &FieldChange, actor: &str) -> String {
    t!("history.description", name = actor)
}

fn status_message(change: &FieldChange, actor: &str) -> String {
    let label = |value: &Option<String>| {
        value
            .as_deref()
            .and_then(|value| TaskStatus::from_str(value).ok())
            .map(|status| status.label())
            .unwrap_or_default()
    };

    t!(
        "history.status",
        old = label(&change.old),
        new = label(&change.new),
        name = actor
    )
}

fn priority_message(change: &FieldChange, actor: &str) -> String {
    let label = |value: &Option<String>| {
        value
            .as_deref()
            .and_then(|value| TaskPriority::from_str(value).ok())
            .map(|priority| priority.label())
            .unwrap_or_default()
    };

    t!(
        "history.priority",
        old = label(&change.old),
        new = label(&change.new),
        name = actor
    )
}

fn due_date_message(change: &FieldChange, actor: &str) -> String {
    let date = |value: &Option<String>| {
        value
            .as_deref()
            .and_then(|value| NaiveDate::from_str(value).ok())
            .map(|date| date.format("%d/%m/%Y").to_string())
            .unwrap_or_default()
    };

    t!(
        "history.due_date",
        old = date(&change.old),
        new = date(&change.new),
        name = actor
    )
}

/// Renders the audit message of a single field change.
pub fn describe(change: &FieldChange, actor: &str) -> String {
    MESSAGES
        .iter()
        .find(|(field, _)| *field == change.field)
        .map(|(_, formatter)| formatter(change, actor))
        .unwrap_or_else(|| t!("history.updated", name = actor))
}

impl TaskHistoryEntry {
    fn new(
        task: &Task,
        actor: &User,
        change_type: ChangeType,
        change: Option<&FieldChange>,
        message: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: nanoid::nanoid!(),
            task: task.id().clone(),
            actor: actor.id().clone(),
            change_type,
            field_name: change.map(|change| change.field),
            old_value: change.and_then(|change| change.old.clone()),
            new_value: change.and_then(|change| change.new.clone()),
            message,
            created_at: now,
        }
    }

    pub fn created(task: &Task, actor: &User, now: DateTime<Utc>) -> Self {
        let message = t!("history.created", name = actor.name());
        Self::new(task, actor, ChangeType::Created, None, message, now)
    }

    pub fn imported(task: &Task, actor: &User, now: DateTime<Utc>) -> Self {
        let message = t!("history.imported", name = actor.name());
        Self::new(task, actor, ChangeType::Created, None, message, now)
    }

    pub fn updated(task: &Task, actor: &User, change: &FieldChange, now: DateTime<Utc>) -> Self {
        let message = describe(change, actor.name());
        Self::new(task, actor, ChangeType::Updated, Some(change), message, now)
    }

    pub fn deleted(task: &Task, actor: &User, now: DateTime<Utc>) -> Self {
        let message = t!("history.deleted", name = actor.name());
        Self::new(task, actor, ChangeType::Deleted, None, message, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_field_has_a_message() {
        for field in [
            TaskField::Title,
            TaskField::Description,
            TaskField::Status,
            TaskField::Priority,
            TaskField::DueDate,
        ] {
            assert!(MESSAGES.iter().any(|(candidate, _)| *candidate == field));
        }
    }

    #[test]
    fn test_status_message_uses_labels() {
        let change = FieldChange {
            field: TaskField::Status,
            old: Some("pending".to_owned()),
            new: Some("completed".to_owned()),
        };
        let message = describe(&change, "Alice");

        assert!(message.contains(&TaskStatus::Pending.label()));
        assert!(message.contains(&TaskStatus::Completed.label()));
        assert!(message.contains("Alice"));
        assert!(!message.contains("completed'"));
    }

    #[test]
    fn test_due_date_message_is_day_first() {
        let change = FieldChange {
            field: TaskField::DueDate,
            old: Some("2024-01-15".to_owned()),
            new: Some("2024-02-01".to_owned()),
        };
        let message = describe(&change, "Alice");

        assert!(message.contains("15/01/2024"));
        assert!(message.contains("01/02/2024"));
    }
}
