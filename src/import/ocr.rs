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

use crate::import::dataset::{CellValue, Dataset, UploadedFile};
use crate::prelude::*;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Turns a scanned document into a table.
#[async_trait]
pub trait TableExtractor: Send + Sync {
    async fn extract(&self, file: &UploadedFile) -> Result<Dataset>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrTable {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrData {
    #[serde(default)]
    pub tables: Vec<OcrTable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    pub success: bool,
    pub data: Option<OcrData>,
    pub message: Option<String>,
}

fn cell(value: Option<&Value>) -> CellValue {
    match value {
        Some(Value::String(text)) => CellValue::Text(text.clone()),
        Some(Value::Number(number)) => number
            .as_f64()
            .map(CellValue::Number)
            .unwrap_or_else(|| CellValue::Text(number.to_string())),
        Some(Value::Null) | None => CellValue::Text(String::new()),
        Some(other) => CellValue::Text(other.to_string()),
    }
}

impl OcrResponse {
    /// Only the first detected table is used.
    pub fn into_dataset(self) -> Result<Dataset> {
        if !self.success {
            warn!(
                "OCR service reported a failure: {}",
                self.message.as_deref().unwrap_or_default()
            );
            return Err(ApplicationError::Extraction(t!("import.no_table")));
        }

        let table = self
            .data
            .and_then(|data| data.tables.into_iter().next())
            .ok_or_else(|| ApplicationError::Extraction(t!("import.no_table")))?;

        let rows = table
            .rows
            .iter()
            .map(|row| {
                table
                    .headers
                    .iter()
                    .map(|header| (header.clone(), cell(row.get(header))))
                    .collect()
            })
            .collect();

        Ok(Dataset {
            columns: table.headers,
            rows,
        })
    }
}

/// Client of the table recognition service.
pub struct OcrClient {
    client: reqwest::Client,
    endpoint: String,
}

impl OcrClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: format!("{}/extract", endpoint.trim_end_matches('/')),
        })
    }
}

fn unreachable(error: reqwest::Error) -> ApplicationError {
    error!("OCR service request failed: {}", error);
    ApplicationError::Upstream(t!("import.ocr_failed"))
}

#[async_trait]
impl TableExtractor for OcrClient {
    #[instrument(skip_all, fields(file = %file.name))]
    async fn extract(&self, file: &UploadedFile) -> Result<Dataset> {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type).map_err(unreachable)?;
        }

        let response = self
            .client
            .post(self.endpoint.as_str())
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unreachable)?
            .json::<OcrResponse>()
            .await
            .map_err(unreachable)?;
        info!("Received OCR response");

        response.into_dataset()
    }
}
