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

use crate::database::definitions::task::TaskField;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // evaluation order decides which field claims a header first
    static ref PATTERNS: [(TaskField, Regex); 5] = [
        (
            TaskField::Title,
            Regex::new(r"(?i)^(titre|title|nom|name|tache|tâche|task|sujet|subject|intitulé|objet)$")
                .unwrap()
        ),
        (
            TaskField::Description,
            Regex::new(r"(?i)^(description|desc|détails|details|commentaire|comment|notes?)$")
                .unwrap()
        ),
        (
            TaskField::Status,
            Regex::new(r"(?i)^(statut|status|état|state|etat)$").unwrap()
        ),
        (
            TaskField::Priority,
            Regex::new(r"(?i)^(priorité|priority|priorite|importance|urgent)$").unwrap()
        ),
        (
            TaskField::DueDate,
            Regex::new(
                r"(?i)^(date|échéance|echeance|deadline|due[_\s]?date|date[_\s]?limite|date[_\s]?fin)$"
            )
            .unwrap()
        ),
    ];
}

/// Maps task fields to source column headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportMapping {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, alias = "due_date")]
    pub due_date: Option<String>,
}

impl ImportMapping {
    const REQUIRED: [TaskField; 4] = [
        TaskField::Title,
        TaskField::Status,
        TaskField::Priority,
        TaskField::DueDate,
    ];

    /// The mapped header, blank values count as unmapped.
    pub fn get(&self, field: TaskField) -> Option<&str> {
        let column = match field {
            TaskField::Title => &self.title,
            TaskField::Description => &self.description,
            TaskField::Status => &self.status,
            TaskField::Priority => &self.priority,
            TaskField::DueDate => &self.due_date,
        };

        column.as_deref().filter(|column| !column.trim().is_empty())
    }

    fn set(&mut self, field: TaskField, column: String) {
        let target = match field {
            TaskField::Title => &mut self.title,
            TaskField::Description => &mut self.description,
            TaskField::Status => &mut self.status,
            TaskField::Priority => &mut self.priority,
            TaskField::DueDate => &mut self.due_date,
        };
        *target = Some(column);
    }

    pub fn missing_required(&self) -> Vec<TaskField> {
        Self::REQUIRED
            .into_iter()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }
}

/// Suggests a column for each field. Never fails, unmatched fields stay unmapped.
pub fn suggest_mapping(columns: &[String]) -> ImportMapping {
    let mut mapping = ImportMapping::default();
    let mut claimed = vec![false; columns.len()];

    for (field, pattern) in PATTERNS.iter() {
        let candidate = columns
            .iter()
            .enumerate()
            .find(|(index, column)| {
                !claimed[*index] && pattern.is_match(column.trim().to_lowercase().as_str())
            });

        if let Some((index, column)) = candidate {
            claimed[index] = true;
            mapping.set(*field, column.clone());
        }
    }

    mapping
}
