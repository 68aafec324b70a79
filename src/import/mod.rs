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

//! Bulk task import: read an uploaded spreadsheet or scan into a [`Dataset`], suggest a column
//! mapping, normalize every row and commit the accepted ones.

use crate::database::definitions::account::User;
use crate::database::definitions::task::history::TaskHistoryEntry;
use crate::database::definitions::task::{Task, TaskField};
use crate::import::columns::{suggest_mapping, ImportMapping};
use crate::import::dataset::{Dataset, Row, SourceKind, UploadedFile};
use crate::import::normalize::{normalize_row, ImportRowError};
use crate::import::ocr::TableExtractor;
use crate::prelude::*;
use chrono::Utc;
use std::sync::Arc;

pub mod columns;
pub mod dataset;
pub mod date;
pub mod normalize;
pub mod ocr;
pub mod spreadsheet;

/// Number of rows returned by a preview.
const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Validate only, nothing is persisted.
    DryRun,
    Commit,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported_count: usize,
    /// Rejected and duplicate rows together.
    pub skipped_count: usize,
    pub rejected_count: usize,
    pub duplicate_count: usize,
    pub valid_count: usize,
    pub total_rows: usize,
    pub errors: Vec<ImportRowError>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRows {
    pub rows: Vec<Row>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub is_valid: bool,
    pub valid_rows_count: usize,
    pub errors: Vec<ImportRowError>,
}

impl From<ImportReport> for Validation {
    fn from(report: ImportReport) -> Self {
        Self {
            is_valid: report.errors.is_empty(),
            valid_rows_count: report.valid_count,
            errors: report.errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub columns: Vec<String>,
    pub suggested_mapping: ImportMapping,
    pub preview: PreviewRows,
    pub validation: Option<Validation>,
}

pub struct ImportPipeline {
    store: Arc<dyn Store>,
    extractor: Arc<dyn TableExtractor>,
    options: ImportOptions,
}

impl ImportPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        extractor: Arc<dyn TableExtractor>,
        options: ImportOptions,
    ) -> Self {
        Self {
            store,
            extractor,
            options,
        }
    }

    /// Reads the file into a dataset. Any failure here aborts the whole request.
    #[instrument(skip_all, fields(file = %file.name, size = file.bytes.len()))]
    pub async fn load(&self, file: &UploadedFile) -> Result<Dataset> {
        if file.bytes.len() > self.options.max_upload_bytes {
            return Err(ApplicationError::BadRequest(t!("import.too_large")));
        }

        let dataset = match file.kind() {
            Some(SourceKind::Spreadsheet) => spreadsheet::read_workbook(&file.bytes)?,
            Some(SourceKind::Csv) => spreadsheet::read_csv(&file.bytes)?,
            Some(SourceKind::Scan) => self.extractor.extract(file).await?,
            None => return Err(ApplicationError::BadRequest(t!("import.unsupported"))),
        };

        if dataset.rows.is_empty() {
            return Err(ApplicationError::Extraction(t!("import.empty")));
        }
        debug!(
            "Loaded {} rows with {} columns",
            dataset.rows.len(),
            dataset.columns.len()
        );

        Ok(dataset)
    }

    /// Detected columns, a suggested mapping and the first rows. With a mapping the rows are
    /// validated as well, without committing anything.
    pub async fn preview(
        &self,
        file: &UploadedFile,
        mapping: Option<&ImportMapping>,
        owner: &User,
    ) -> Result<ImportPreview> {
        let dataset = self.load(file).await?;

        let validation: Option<Validation> = match mapping {
            Some(mapping) => Some(
                self.run(&dataset, mapping, owner, ImportMode::DryRun)
                    .await?
                    .into(),
            ),
            None => None,
        };

        Ok(ImportPreview {
            suggested_mapping: suggest_mapping(&dataset.columns),
            preview: PreviewRows {
                rows: dataset.rows.iter().take(PREVIEW_ROWS).cloned().collect(),
                total_rows: dataset.rows.len(),
            },
            columns: dataset.columns,
            validation,
        })
    }

    pub async fn commit(
        &self,
        file: &UploadedFile,
        mapping: &ImportMapping,
        owner: &User,
    ) -> Result<ImportReport> {
        let dataset = self.load(file).await?;

        self.run(&dataset, mapping, owner, ImportMode::Commit).await
    }

    /// Normalizes every row and, in commit mode, inserts the accepted ones in one batch. A bad
    /// row never aborts the batch.
    #[instrument(skip_all, fields(owner = %owner.id(), mode = ?mode))]
    pub async fn run(
        &self,
        dataset: &Dataset,
        mapping: &ImportMapping,
        owner: &User,
        mode: ImportMode,
    ) -> Result<ImportReport> {
        let missing = mapping.missing_required();
        if !missing.is_empty() {
            let fields = missing
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ApplicationError::BadRequest(t!(
                "import.missing_mapping",
                fields = fields
            )));
        }

        let now = Utc::now();
        let mut accepted = Vec::new();
        let mut errors = Vec::new();

        // the header is line 1 of the source file
        for (index, row) in dataset.rows.iter().enumerate() {
            let outcome = normalize_row(row, mapping, index + 2)
                .and_then(|task| {
                    Task::new(owner.id(), task, now).map_err(|error| ImportRowError {
                        row: index + 2,
                        field: TaskField::Title,
                        message: error.to_string(),
                    })
                });

            match outcome {
                Ok(task) => accepted.push(task),
                Err(error) => errors.push(error),
            }
        }

        let valid_count = accepted.len();
        let (imported_count, duplicate_count) = match mode {
            ImportMode::DryRun => (0, 0),
            ImportMode::Commit => {
                let inserted = self.store.insert_tasks(accepted).await?;
                for task in &inserted {
                    let entry = TaskHistoryEntry::imported(task, owner, now);
                    if let Err(error) = self.store.append_history(&entry).await {
                        warn!("Unable to record import of {}: {}", task.id(), error);
                    }
                }

                (inserted.len(), valid_count - inserted.len())
            }
        };
        info!(
            "Processed {} rows, {} valid, {} imported",
            dataset.rows.len(),
            valid_count,
            imported_count
        );

        Ok(ImportReport {
            imported_count,
            skipped_count: errors.len() + duplicate_count,
            rejected_count: errors.len(),
            duplicate_count,
            valid_count,
            total_rows: dataset.rows.len(),
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::result::Result;
    use crate::database::definitions::account::WriteUser;
    use crate::database::memory::MemoryStore;
    use crate::import::dataset::CellValue;
    use crate::tests::ScriptedExtractor;
    use axum::BoxError;
    use chrono::NaiveDate;

    struct Fixture {
        store: Arc<MemoryStore>,
        pipeline: ImportPipeline,
        owner: User,
    }

    impl Fixture {
        async fn new(extractor: ScriptedExtractor) -> Result<Self, BoxError> {
            let store = Arc::new(MemoryStore::default());
            let owner = WriteUser::from(store.clone() as Arc<dyn Store>)
                .set_name(Some("Alice"))
                .set_email(Some("alice@example.com"))
                .set_password(Some("password"))
                .to_owned()
                .await?;

            Ok(Self {
                pipeline: ImportPipeline::new(
                    store.clone(),
                    Arc::new(extractor),
                    ImportOptions {
                        max_upload_bytes: 1024,
                    },
                ),
                store,
                owner,
            })
        }
    }

    fn csv(name: &str, content: &str) -> UploadedFile {
        UploadedFile {
            name: name.to_owned(),
            content_type: Some("text/csv".to_owned()),
            bytes: content.as_bytes().to_vec(),
        }
    }

    fn mapping() -> ImportMapping {
        ImportMapping {
            title: Some("Titre".to_owned()),
            description: None,
            status: Some("Statut".to_owned()),
            priority: Some("Priorité".to_owned()),
            due_date: Some("Échéance".to_owned()),
        }
    }

    const FIVE_ROWS: &str = "Titre;Statut;Priorité;Échéance\n\
        Un;todo;haute;15/01/2024\n\
        Deux;en cours;basse;16/01/2024\n\
        ;done;moyenne;17/01/2024\n\
        Quatre;done;moyenne;18/01/2024\n\
        Cinq;pending;low;45306\n";

    #[tokio::test]
    async fn test_partial_failure_isolation() -> Result<(), BoxError> {
        let fixture = Fixture::new(ScriptedExtractor::default()).await?;

        let report = fixture
            .pipeline
            .commit(&csv("tasks.csv", FIVE_ROWS), &mapping(), &fixture.owner)
            .await?;

        assert_eq!(report.imported_count, 4);
        assert_eq!(report.skipped_count, 1);
        assert_eq!(report.rejected_count, 1);
        assert_eq!(report.total_rows, 5);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 4);
        assert_eq!(report.errors[0].field, TaskField::Title);

        assert_eq!(fixture.store.tasks().await.len(), 4);
        // every imported task is documented
        assert_eq!(fixture.store.history().await.len(), 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicates_are_skipped() -> Result<(), BoxError> {
        let fixture = Fixture::new(ScriptedExtractor::default()).await?;
        let file = csv("tasks.csv", FIVE_ROWS);

        fixture
            .pipeline
            .commit(&file, &mapping(), &fixture.owner)
            .await?;
        let report = fixture
            .pipeline
            .commit(&file, &mapping(), &fixture.owner)
            .await?;

        assert_eq!(report.imported_count, 0);
        assert_eq!(report.duplicate_count, 4);
        assert_eq!(report.skipped_count, 5);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(fixture.store.tasks().await.len(), 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_preview_does_not_persist() -> Result<(), BoxError> {
        let fixture = Fixture::new(ScriptedExtractor::default()).await?;
        let file = csv("tasks.csv", FIVE_ROWS);

        let preview = fixture
            .pipeline
            .preview(&file, None, &fixture.owner)
            .await?;
        assert_eq!(preview.columns.len(), 4);
        assert_eq!(preview.suggested_mapping, mapping());
        assert_eq!(preview.preview.rows.len(), 5);
        assert_eq!(preview.preview.total_rows, 5);
        assert_eq!(preview.validation, None);

        let preview = fixture
            .pipeline
            .preview(&file, Some(&mapping()), &fixture.owner)
            .await?;
        let validation = preview.validation.unwrap();
        assert!(!validation.is_valid);
        assert_eq!(validation.valid_rows_count, 4);
        assert_eq!(validation.errors[0].row, 4);

        assert!(fixture.store.tasks().await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_numeric_looking_text_is_imported_unchanged() -> Result<(), BoxError> {
        let fixture = Fixture::new(ScriptedExtractor::default()).await?;
        let file = csv(
            "tasks.csv",
            "Titre;Description;Statut;Priorité;Échéance\n\
             007;0042;todo;haute;15/01/2024\n\
             1e3;;todo;haute;45306\n\
             Sans année;;todo;haute;15.01\n\
             Année seule;;todo;haute;2024\n",
        );
        let mapping = ImportMapping {
            description: Some("Description".to_owned()),
            ..mapping()
        };

        let report = fixture
            .pipeline
            .commit(&file, &mapping, &fixture.owner)
            .await?;
        assert_eq!(report.imported_count, 2);
        assert_eq!(
            report
                .errors
                .iter()
                .map(|error| (error.row, error.field))
                .collect::<Vec<_>>(),
            vec![(4, TaskField::DueDate), (5, TaskField::DueDate)]
        );

        let tasks = fixture.store.tasks().await;
        let bond = tasks.iter().find(|task| task.title() == "007").unwrap();
        assert_eq!(bond.description().as_deref(), Some("0042"));
        assert_eq!(
            bond.due_date(),
            &NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        let thousand = tasks.iter().find(|task| task.title() == "1e3").unwrap();
        assert_eq!(
            thousand.due_date(),
            &NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_preview_rows_keep_column_order() -> Result<(), BoxError> {
        let fixture = Fixture::new(ScriptedExtractor::default()).await?;

        let preview = fixture
            .pipeline
            .preview(&csv("tasks.csv", FIVE_ROWS), None, &fixture.owner)
            .await?;
        assert_eq!(
            preview.preview.rows[0].keys().cloned().collect::<Vec<_>>(),
            preview.columns
        );

        let encoded = serde_json::to_string(&preview.preview.rows[0])?;
        let positions = preview
            .columns
            .iter()
            .map(|column| encoded.find(format!("\"{}\"", column).as_str()))
            .collect::<Option<Vec<_>>>()
            .unwrap();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));

        Ok(())
    }

    #[tokio::test]
    async fn test_error_rows_stay_in_range() -> Result<(), BoxError> {
        let fixture = Fixture::new(ScriptedExtractor::default()).await?;
        let rows = (0..40)
            .map(|index| {
                let mut row = Row::new();
                if index % 3 != 0 {
                    row.insert("Titre".to_owned(), CellValue::Text(format!("Task {}", index)));
                }
                row.insert("Statut".to_owned(), CellValue::Text("todo".to_owned()));
                row.insert("Priorité".to_owned(), CellValue::Text("haute".to_owned()));
                if index % 4 != 0 {
                    row.insert("Échéance".to_owned(), CellValue::Number(45306.0));
                }
                row
            })
            .collect::<Vec<_>>();
        let dataset = Dataset {
            columns: vec![],
            rows,
        };

        let report = fixture
            .pipeline
            .run(&dataset, &mapping(), &fixture.owner, ImportMode::DryRun)
            .await?;

        assert!(!report.errors.is_empty());
        assert!(report
            .errors
            .iter()
            .all(|error| (2..=41).contains(&error.row)));
        assert!(report
            .errors
            .windows(2)
            .all(|pair| pair[0].row <= pair[1].row));
        assert_eq!(report.valid_count + report.rejected_count, 40);
        assert!(fixture.store.tasks().await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_mapping() -> Result<(), BoxError> {
        let fixture = Fixture::new(ScriptedExtractor::default()).await?;
        let mapping = ImportMapping {
            due_date: None,
            ..mapping()
        };

        let result = fixture
            .pipeline
            .commit(&csv("tasks.csv", FIVE_ROWS), &mapping, &fixture.owner)
            .await;

        assert!(matches!(result, Err(ApplicationError::BadRequest(_))));
        assert!(fixture.store.tasks().await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_files() -> Result<(), BoxError> {
        let fixture = Fixture::new(ScriptedExtractor::default()).await?;

        let unsupported = fixture.pipeline.load(&csv("tasks.txt", FIVE_ROWS)).await;
        assert!(matches!(unsupported, Err(ApplicationError::BadRequest(_))));

        let oversize = fixture
            .pipeline
            .load(&csv("tasks.csv", &"a;b\n".repeat(512)))
            .await;
        assert!(matches!(oversize, Err(ApplicationError::BadRequest(_))));

        let empty = fixture
            .pipeline
            .load(&csv("tasks.csv", "Titre;Statut\n"))
            .await;
        assert!(matches!(empty, Err(ApplicationError::Extraction(_))));

        Ok(())
    }

    #[tokio::test]
    async fn test_scans_go_through_the_extractor() -> Result<(), BoxError> {
        let mut row = Row::new();
        row.insert("Titre".to_owned(), CellValue::Text("Scan".to_owned()));
        row.insert("Statut".to_owned(), CellValue::Text("fini".to_owned()));
        row.insert("Priorité".to_owned(), CellValue::Text("urgent".to_owned()));
        row.insert(
            "Échéance".to_owned(),
            CellValue::Text("15.01.2024".to_owned()),
        );
        let fixture = Fixture::new(ScriptedExtractor::returning(Dataset {
            columns: mapping_columns(),
            rows: vec![row],
        }))
        .await?;
        let scan = UploadedFile {
            name: "scan.pdf".to_owned(),
            content_type: Some("application/pdf".to_owned()),
            bytes: vec![1, 2, 3],
        };

        let report = fixture
            .pipeline
            .commit(&scan, &mapping(), &fixture.owner)
            .await?;
        assert_eq!(report.imported_count, 1);

        let failing = Fixture::new(ScriptedExtractor::failing()).await?;
        let result = failing
            .pipeline
            .commit(&scan, &mapping(), &failing.owner)
            .await;
        assert!(matches!(result, Err(ApplicationError::Upstream(_))));

        Ok(())
    }

    fn mapping_columns() -> Vec<String> {
        ["Titre", "Statut", "Priorité", "Échéance"]
            .iter()
            .map(|column| column.to_string())
            .collect()
    }
}
