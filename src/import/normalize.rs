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

use crate::database::definitions::task::{NewTask, TaskField, TaskPriority, TaskStatus};
use crate::import::columns::ImportMapping;
use crate::import::dataset::{CellValue, Row};
use crate::import::date::parse_due_date;

const STATUS_SYNONYMS: [(&str, TaskStatus); 13] = [
    ("en attente", TaskStatus::Pending),
    ("attente", TaskStatus::Pending),
    ("todo", TaskStatus::Pending),
    ("à faire", TaskStatus::Pending),
    ("en cours", TaskStatus::Progress),
    ("cours", TaskStatus::Progress),
    ("in progress", TaskStatus::Progress),
    ("doing", TaskStatus::Progress),
    ("terminé", TaskStatus::Completed),
    ("terminée", TaskStatus::Completed),
    ("done", TaskStatus::Completed),
    ("fini", TaskStatus::Completed),
    ("complete", TaskStatus::Completed),
];

const PRIORITY_SYNONYMS: [(&str, TaskPriority); 12] = [
    ("haute", TaskPriority::High),
    ("élevée", TaskPriority::High),
    ("elevee", TaskPriority::High),
    ("urgent", TaskPriority::High),
    ("importante", TaskPriority::High),
    ("moyenne", TaskPriority::Medium),
    ("normal", TaskPriority::Medium),
    ("normale", TaskPriority::Medium),
    ("moyen", TaskPriority::Medium),
    ("basse", TaskPriority::Low),
    ("faible", TaskPriority::Low),
    ("bas", TaskPriority::Low),
];

/// Canonical names first, then the synonym table.
pub fn normalize_status(value: &str) -> Option<TaskStatus> {
    let value = value.trim().to_lowercase();

    match value.as_str() {
        "pending" => Some(TaskStatus::Pending),
        "progress" => Some(TaskStatus::Progress),
        "completed" => Some(TaskStatus::Completed),
        other => STATUS_SYNONYMS
            .iter()
            .find(|(synonym, _)| *synonym == other)
            .map(|(_, status)| *status),
    }
}

pub fn normalize_priority(value: &str) -> Option<TaskPriority> {
    let value = value.trim().to_lowercase();

    match value.as_str() {
        "low" => Some(TaskPriority::Low),
        "medium" => Some(TaskPriority::Medium),
        "high" => Some(TaskPriority::High),
        other => PRIORITY_SYNONYMS
            .iter()
            .find(|(synonym, _)| *synonym == other)
            .map(|(_, priority)| *priority),
    }
}

/// A rejected row. `row` is the line in the source file, the header being line 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRowError {
    pub row: usize,
    pub field: TaskField,
    pub message: String,
}

impl ImportRowError {
    fn new(row: usize, field: TaskField, key: &str) -> Self {
        Self {
            row,
            field,
            message: t!(key),
        }
    }
}

impl std::fmt::Display for ImportRowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(
            t!(
                "import.row_error",
                row = self.row,
                field = self.field,
                message = self.message
            )
            .as_str(),
        )
    }
}

fn cell<'a>(row: &'a Row, mapping: &ImportMapping, field: TaskField) -> Option<&'a CellValue> {
    mapping.get(field).and_then(|column| row.get(column))
}

fn text(row: &Row, mapping: &ImportMapping, field: TaskField) -> String {
    cell(row, mapping, field)
        .map(|value| value.as_text().trim().to_owned())
        .unwrap_or_default()
}

/// Turns a raw row into task input. Checks title, status, priority and due date in that order
/// and reports the first failure.
pub fn normalize_row(
    row: &Row,
    mapping: &ImportMapping,
    row_number: usize,
) -> Result<NewTask, ImportRowError> {
    let title = text(row, mapping, TaskField::Title);
    if title.is_empty() {
        return Err(ImportRowError::new(
            row_number,
            TaskField::Title,
            "import.title_required",
        ));
    }

    let status = normalize_status(text(row, mapping, TaskField::Status).as_str()).ok_or_else(
        || ImportRowError::new(row_number, TaskField::Status, "import.status_invalid"),
    )?;
    let priority = normalize_priority(text(row, mapping, TaskField::Priority).as_str())
        .ok_or_else(|| {
            ImportRowError::new(row_number, TaskField::Priority, "import.priority_invalid")
        })?;
    let due_date = cell(row, mapping, TaskField::DueDate)
        .and_then(parse_due_date)
        .ok_or_else(|| ImportRowError::new(row_number, TaskField::DueDate, "import.date_invalid"))?;

    let description = text(row, mapping, TaskField::Description);

    Ok(NewTask {
        title,
        description: (!description.is_empty()).then_some(description),
        status,
        priority,
        due_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn mapping() -> ImportMapping {
        ImportMapping {
            title: Some("Titre".to_owned()),
            description: Some("Notes".to_owned()),
            status: Some("Statut".to_owned()),
            priority: Some("Priorité".to_owned()),
            due_date: Some("Échéance".to_owned()),
        }
    }

    fn row(cells: &[(&str, CellValue)]) -> Row {
        cells
            .iter()
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect()
    }

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_owned())
    }

    #[test]
    fn test_status_closure() {
        for (synonym, status) in STATUS_SYNONYMS {
            assert_eq!(normalize_status(synonym), Some(status));
            assert_eq!(normalize_status(&synonym.to_uppercase()), Some(status));
        }
        assert_eq!(normalize_status(" Pending "), Some(TaskStatus::Pending));
        assert_eq!(normalize_status("En Cours"), Some(TaskStatus::Progress));
        assert_eq!(normalize_status("blocked"), None);
        assert_eq!(normalize_status(""), None);
    }

    #[test]
    fn test_priority_closure() {
        for (synonym, priority) in PRIORITY_SYNONYMS {
            assert_eq!(normalize_priority(synonym), Some(priority));
        }
        assert_eq!(normalize_priority("HIGH"), Some(TaskPriority::High));
        assert_eq!(normalize_priority("critical"), None);
    }

    #[test]
    fn test_normalize_row() {
        let task = normalize_row(
            &row(&[
                ("Titre", text("  Rapport  ")),
                ("Notes", text("   ")),
                ("Statut", text("Terminé")),
                ("Priorité", text("haute")),
                ("Échéance", CellValue::Number(45306.0)),
            ]),
            &mapping(),
            2,
        )
        .unwrap();

        assert_eq!(task.title, "Rapport");
        assert_eq!(task.description, None);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_first_failure_wins() {
        // title, status and date are all broken, the title is reported
        let error = normalize_row(
            &row(&[
                ("Statut", text("unknown")),
                ("Priorité", text("basse")),
                ("Échéance", text("soon")),
            ]),
            &mapping(),
            7,
        )
        .unwrap_err();
        assert_eq!(error.row, 7);
        assert_eq!(error.field, TaskField::Title);

        let error = normalize_row(
            &row(&[
                ("Titre", text("Rapport")),
                ("Statut", text("todo")),
                ("Priorité", text("whenever")),
                ("Échéance", text("soon")),
            ]),
            &mapping(),
            3,
        )
        .unwrap_err();
        assert_eq!(error.field, TaskField::Priority);

        let error = normalize_row(
            &row(&[
                ("Titre", text("Rapport")),
                ("Statut", text("todo")),
                ("Priorité", text("bas")),
            ]),
            &mapping(),
            3,
        )
        .unwrap_err();
        assert_eq!(error.field, TaskField::DueDate);
    }

    #[test]
    fn test_missing_status_is_rejected() {
        let error = normalize_row(
            &row(&[
                ("Titre", text("Rapport")),
                ("Priorité", text("bas")),
                ("Échéance", text("15/01/2024")),
            ]),
            &mapping(),
            2,
        )
        .unwrap_err();

        assert_eq!(error.field, TaskField::Status);
        assert!(error.to_string().contains('2'));
    }
}
