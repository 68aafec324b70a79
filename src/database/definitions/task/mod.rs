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
use chrono::{DateTime, NaiveDate, Utc};
use strum::{AsRefStr, EnumString};

pub mod history;

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Progress,
    Completed,
}

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskStatus {
    pub fn label(&self) -> String {
        t!(format!("task.status.{}", self.as_ref()).as_str())
    }
}

impl TaskPriority {
    pub fn label(&self) -> String {
        t!(format!("task.priority.{}", self.as_ref()).as_str())
    }
}

/// The user facing fields of a task. Shared by the import column mapping and the audit trail.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Title,
    Description,
    Status,
    Priority,
    DueDate,
}

impl std::fmt::Display for TaskField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Getters)]
#[get = "pub"]
pub struct Task {
    id: String,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: TaskPriority,
    due_date: NaiveDate,
    owner: String,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    status_changed_at: Option<DateTime<Utc>>,
}

/// Validated input for a task that does not exist yet.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    pub due_date: NaiveDate,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
}

/// A single field modification, values rendered in their stored form.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: TaskField,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl FieldChange {
    fn new(field: TaskField, old: Option<String>, new: Option<String>) -> Self {
        Self { field, old, new }
    }
}

fn clean_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApplicationError::BadRequest(t!("task.title_required")));
    }

    Ok(title.to_owned())
}

fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|description| !description.is_empty())
        .map(str::to_owned)
}

impl Task {
    pub fn new(owner: &str, task: NewTask, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id: nanoid::nanoid!(),
            title: clean_title(task.title.as_str())?,
            description: clean_description(task.description.as_deref()),
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            owner: owner.to_owned(),
            updated_at: now,
            created_at: now,
            status_changed_at: None,
        })
    }

    /// Applies the patch and returns the changed fields in field order. Nothing is modified if
    /// the patch is invalid.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> Result<Vec<FieldChange>> {
        let mut changes = Vec::new();

        let title = patch
            .title
            .as_deref()
            .map(clean_title)
            .transpose()?;

        if let Some(title) = title {
            if title != self.title {
                changes.push(FieldChange::new(
                    TaskField::Title,
                    Some(self.title.clone()),
                    Some(title.clone()),
                ));
                self.title = title;
            }
        }

        if patch.description.is_some() {
            let description = clean_description(patch.description.as_deref());
            if description != self.description {
                changes.push(FieldChange::new(
                    TaskField::Description,
                    self.description.clone(),
                    description.clone(),
                ));
                self.description = description;
            }
        }

        if let Some(status) = patch.status {
            if status != self.status {
                changes.push(FieldChange::new(
                    TaskField::Status,
                    Some(self.status.as_ref().to_owned()),
                    Some(status.as_ref().to_owned()),
                ));
                self.status = status;
                self.status_changed_at = Some(now);
            }
        }

        if let Some(priority) = patch.priority {
            if priority != self.priority {
                changes.push(FieldChange::new(
                    TaskField::Priority,
                    Some(self.priority.as_ref().to_owned()),
                    Some(priority.as_ref().to_owned()),
                ));
                self.priority = priority;
            }
        }

        if let Some(due_date) = patch.due_date {
            if due_date != self.due_date {
                changes.push(FieldChange::new(
                    TaskField::DueDate,
                    Some(self.due_date.to_string()),
                    Some(due_date.to_string()),
                ));
                self.due_date = due_date;
            }
        }

        if !changes.is_empty() {
            self.updated_at = now;
        }

        Ok(changes)
    }
}
