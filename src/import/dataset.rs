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

use indexmap::IndexMap;
use std::path::Path;

/// A single cell as read from a source file. Spreadsheet date cells stay numeric so the date
/// parser sees the serial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                format!("{}", *number as i64)
            }
            CellValue::Number(number) => number.to_string(),
            CellValue::Text(text) => text.clone(),
        }
    }
}

/// A data row keyed by column header, in column order. Empty cells are absent.
pub type Row = IndexMap<String, CellValue>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Spreadsheet,
    Csv,
    Scan,
}

impl SourceKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "xlsx" | "xlsm" | "xls" | "ods" => Some(Self::Spreadsheet),
            "csv" => Some(Self::Csv),
            "pdf" | "png" | "jpg" | "jpeg" | "bmp" | "tiff" => Some(Self::Scan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn extension(&self) -> Option<String> {
        Path::new(self.name.as_str())
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_lowercase)
    }

    pub fn kind(&self) -> Option<SourceKind> {
        self.extension()
            .as_deref()
            .and_then(SourceKind::from_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_text() {
        assert_eq!(CellValue::Number(45306.0).as_text(), "45306");
        assert_eq!(CellValue::Number(1.5).as_text(), "1.5");
        assert_eq!(CellValue::Text(" a ".to_owned()).as_text(), " a ");
    }

    #[test]
    fn test_kind() {
        let file = |name: &str| UploadedFile {
            name: name.to_owned(),
            content_type: None,
            bytes: vec![],
        };

        assert_eq!(file("tasks.XLSX").kind(), Some(SourceKind::Spreadsheet));
        assert_eq!(file("tasks.csv").kind(), Some(SourceKind::Csv));
        assert_eq!(file("scan.jpeg").kind(), Some(SourceKind::Scan));
        assert_eq!(file("notes.txt").kind(), None);
        assert_eq!(file("tasks").kind(), None);
    }
}
