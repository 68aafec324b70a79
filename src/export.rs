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

//! Task export as a semicolon separated file. The headers and value formats are the ones the
//! import recognizes, so an exported file can be imported again unchanged.

use crate::database::definitions::task::Task;
use crate::prelude::*;

const HEADERS: [&str; 5] = ["Titre", "Description", "Statut", "Priorité", "Échéance"];
// tasks fetched per store request
const BATCH: u64 = 100;

fn unwritable<E: std::fmt::Display>(error: E) -> ApplicationError {
    error!("Unable to write task export: {}", error);
    ApplicationError::InternalServerError
}

pub fn write_csv(tasks: &[Task]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(Vec::new());

    writer.write_record(HEADERS).map_err(unwritable)?;
    for task in tasks {
        writer
            .write_record([
                task.title().as_str(),
                task.description().as_deref().unwrap_or_default(),
                task.status().as_ref(),
                task.priority().as_ref(),
                task.due_date().format("%d/%m/%Y").to_string().as_str(),
            ])
            .map_err(unwritable)?;
    }

    writer.into_inner().map_err(unwritable)
}

/// Every task of the owner, in listing order.
#[instrument(skip(store))]
pub async fn export_tasks(store: &dyn Store, owner: &str) -> Result<Vec<u8>> {
    let mut tasks = Vec::new();
    let mut page = 1;

    loop {
        let result = store
            .list_tasks(
                owner,
                PagingOptions {
                    page,
                    page_size: BATCH,
                },
            )
            .await?;
        tasks.extend(result.data);

        if page >= result.pages {
            break;
        }
        page += 1;
    }
    info!("Exporting {} tasks", tasks.len());

    write_csv(&tasks)
}
