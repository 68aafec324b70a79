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
use crate::import::columns::ImportMapping;
use crate::import::dataset::UploadedFile;
use crate::import::{ImportPreview, ImportReport};
use crate::prelude::*;
use crate::require_session;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Extension, Router};

pub fn router(state: ApplicationState) -> Router {
    // room for the multipart framing around the file
    let body_limit = state.max_upload_bytes().saturating_mul(2);

    Router::new()
        .route(
            "/import-preview",
            post(import_preview).layer(require_session!(state)),
        )
        .route(
            "/import",
            post(import_tasks).layer(require_session!(state)),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Debug, Default)]
struct ImportForm {
    file: Option<UploadedFile>,
    mapping: Option<ImportMapping>,
}

fn malformed<E: std::fmt::Display>(error: E) -> ApplicationError {
    ApplicationError::BadRequest(error.to_string())
}

impl ImportForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().map(str::to_owned);

            match name.as_deref() {
                Some("file") => {
                    let file_name = field.file_name().unwrap_or_default().to_owned();
                    let content_type = field.content_type().map(str::to_owned);
                    let bytes = field.bytes().await.map_err(malformed)?;

                    form.file = Some(UploadedFile {
                        name: file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                Some("mapping") => {
                    let text = field.text().await.map_err(malformed)?;
                    if !text.trim().is_empty() {
                        form.mapping = Some(serde_json::from_str(text.as_str()).map_err(
                            |_| ApplicationError::BadRequest(t!("import.mapping_invalid")),
                        )?);
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    fn file(&self) -> Result<&UploadedFile> {
        self.file
            .as_ref()
            .ok_or_else(|| ApplicationError::BadRequest(t!("import.file_required")))
    }
}

async fn import_preview(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> Result<Json<ImportPreview>> {
    let form = ImportForm::read(multipart).await?;

    Ok(Json(
        state
            .import()
            .preview(form.file()?, form.mapping.as_ref(), &user)
            .await?,
    ))
}

async fn import_tasks(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> Result<Json<ImportReport>> {
    let form = ImportForm::read(multipart).await?;
    let mapping = form
        .mapping
        .as_ref()
        .ok_or_else(|| ApplicationError::BadRequest(t!("import.mapping_invalid")))?;

    Ok(Json(
        state
            .import()
            .commit(form.file()?, mapping, &user)
            .await?,
    ))
}
