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

use crate::import::dataset::{CellValue, Dataset, Row};
use crate::prelude::*;
use calamine::{Data, Reader};
use std::collections::HashMap;
use std::io::Cursor;

const BOM: &[u8] = b"\xEF\xBB\xBF";

fn unreadable<E: std::fmt::Display>(error: E) -> ApplicationError {
    warn!("Unable to read uploaded file: {}", error);
    ApplicationError::Extraction(t!("import.unreadable"))
}

fn cell(data: &Data) -> Option<CellValue> {
    match data {
        Data::Int(number) => Some(CellValue::Number(*number as f64)),
        Data::Float(number) => Some(CellValue::Number(*number)),
        Data::DateTime(date_time) => Some(CellValue::Number(date_time.as_f64())),
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            (!text.trim().is_empty()).then(|| CellValue::Text(text.clone()))
        }
        Data::Bool(value) => Some(CellValue::Text(value.to_string())),
        Data::Error(_) | Data::Empty => None,
    }
}

/// Reads the first sheet of an xlsx, xlsm, xls or ods workbook.
#[instrument(skip_all)]
pub fn read_workbook(bytes: &[u8]) -> Result<Dataset> {
    let mut workbook =
        calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(unreadable)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ApplicationError::Extraction(t!("import.empty")))?
        .map_err(unreadable)?;

    Ok(tabulate(
        range
            .rows()
            .map(|cells| cells.iter().map(cell).collect::<Vec<_>>()),
    ))
}

/// Reads a comma or semicolon separated file. Every cell stays text, as written.
#[instrument(skip_all)]
pub fn read_csv(bytes: &[u8]) -> Result<Dataset> {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(bytes))
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let records = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(unreadable)?;

    Ok(tabulate(records.iter().map(|record| {
        record
            .iter()
            .map(|value| (!value.trim().is_empty()).then(|| CellValue::Text(value.to_owned())))
            .collect::<Vec<_>>()
    })))
}

fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|byte| *byte == b'\n').next().unwrap_or_default();
    let count = |delimiter: u8| header.iter().filter(|byte| **byte == delimiter).count();

    if count(b';') > count(b',') {
        b';'
    } else {
        b','
    }
}

/// Keys every data row by the header row. Blank headers drop their column, repeated headers get
/// a `_1`, `_2`, ... suffix and rows without any value are skipped.
pub fn tabulate<I>(mut rows: I) -> Dataset
where
    I: Iterator<Item = Vec<Option<CellValue>>>,
{
    let Some(header) = rows.next() else {
        return Dataset::default();
    };

    let mut seen = HashMap::<String, usize>::new();
    let columns = header
        .into_iter()
        .map(|cell| {
            let name = cell
                .map(|cell| cell.as_text().trim().to_owned())
                .filter(|name| !name.is_empty())?;
            let count = seen.entry(name.clone()).or_insert(0);
            let column = match *count {
                0 => name,
                count => format!("{}_{}", name, count),
            };
            *count += 1;

            Some(column)
        })
        .collect::<Vec<_>>();

    let rows = rows
        .filter_map(|cells| {
            let row = cells
                .into_iter()
                .zip(columns.iter())
                .filter_map(|(cell, column)| Some((column.clone()?, cell?)))
                .collect::<Row>();

            (!row.is_empty()).then_some(row)
        })
        .collect();

    Dataset {
        columns: columns.into_iter().flatten().collect(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv() {
        let dataset = read_csv(
            "\u{feff}Titre;Statut;Priorité;Échéance\n\
             Rapport;en cours;haute;15/01/2024\n\
             ;;;\n\
             Budget;todo;basse;45306\n"
                .as_bytes(),
        )
        .unwrap();

        assert_eq!(
            dataset.columns,
            vec!["Titre", "Statut", "Priorité", "Échéance"]
        );
        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(
            dataset.rows[0].get("Échéance"),
            Some(&CellValue::Text("15/01/2024".to_owned()))
        );
        assert_eq!(
            dataset.rows[1].get("Échéance"),
            Some(&CellValue::Text("45306".to_owned()))
        );
    }

    #[test]
    fn test_csv_keeps_numeric_looking_text() {
        let dataset = read_csv(b"title;description
007;0042
1e3;15.01
").unwrap();

        assert_eq!(
            dataset.rows[0].get("title"),
            Some(&CellValue::Text("007".to_owned()))
        );
        assert_eq!(
            dataset.rows[0].get("description"),
            Some(&CellValue::Text("0042".to_owned()))
        );
        assert_eq!(
            dataset.rows[1].get("title"),
            Some(&CellValue::Text("1e3".to_owned()))
        );
        assert_eq!(
            dataset.rows[1].get("description"),
            Some(&CellValue::Text("15.01".to_owned()))
        );
    }

    #[test]
    fn test_comma_csv_with_short_rows() {
        let dataset = read_csv(b"title,status\nfirst\nsecond,done\n").unwrap();

        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.rows[0].get("status"), None);
        assert_eq!(
            dataset.rows[1].get("status"),
            Some(&CellValue::Text("done".to_owned()))
        );
    }

    #[test]
    fn test_headers() {
        let text = |value: &str| Some(CellValue::Text(value.to_owned()));
        let dataset = tabulate(
            vec![
                vec![text("date"), None, text("date"), text("  "), text("date")],
                vec![text("a"), text("lost"), text("b"), text("lost"), text("c")],
            ]
            .into_iter(),
        );

        assert_eq!(dataset.columns, vec!["date", "date_1", "date_2"]);
        assert_eq!(dataset.rows[0].len(), 3);
        assert_eq!(dataset.rows[0].get("date_2"), text("c").as_ref());
    }

    #[test]
    fn test_corrupt_workbook() {
        let result = read_workbook(b"definitely not a workbook");

        assert!(matches!(result, Err(ApplicationError::Extraction(_))));
    }
}
