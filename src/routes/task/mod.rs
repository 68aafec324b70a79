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
use crate::database::definitions::task::history::{ChangeType, TaskHistoryEntry};
use crate::database::definitions::task::{NewTask, Task, TaskPatch};
use crate::prelude::*;
use crate::require_session;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use chrono::Utc;

pub mod import;

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route(
            "/",
            get(get_task_page)
                .post(create_task)
                .layer(require_session!(state)),
        )
        .route(
            "/export",
            get(export_tasks).layer(require_session!(state)),
        )
        .route(
            "/:id",
            get(get_task)
                .patch(update_task)
                .delete(delete_task)
                .layer(require_session!(state)),
        )
        .route(
            "/:id/history",
            get(get_task_history).layer(require_session!(state)),
        )
        .with_state(state.clone())
        .merge(import::router(state))
}

async fn find_task(state: &ApplicationState, owner: &User, id: &str) -> Result<Task> {
    state
        .store()
        .find_task(owner.id(), id)
        .await?
        .ok_or_else(|| ApplicationError::NotFound(t!("task.not_found")))
}

/// History is best effort, a failing append never undoes the task write.
async fn record(state: &ApplicationState, entry: TaskHistoryEntry) {
    if let Err(error) = state.store().append_history(&entry).await {
        warn!("Unable to record history of {}: {}", entry.task(), error);
    }
}

async fn create_task(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Json(data): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>)> {
    let now = Utc::now();
    let task = state
        .store()
        .create_task(&Task::new(user.id(), data, now)?)
        .await?;
    record(&state, TaskHistoryEntry::created(&task, &user, now)).await;

    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task_page(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Query(options): Query<PagingOptions>,
) -> Result<Json<Page<Task>>> {
    Ok(Json(state.store().list_tasks(user.id(), options).await?))
}

async fn export_tasks(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse> {
    let body = crate::export::export_tasks(state.store().as_ref(), user.id()).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"tasks.csv\""),
        ],
        body,
    ))
}

async fn get_task(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Task>> {
    Ok(Json(find_task(&state, &user, id.as_str()).await?))
}

async fn update_task(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(data): Json<TaskPatch>,
) -> Result<Json<Task>> {
    let now = Utc::now();
    let mut task = find_task(&state, &user, id.as_str()).await?;

    let changes = task.apply(data, now)?;
    if changes.is_empty() {
        return Ok(Json(task));
    }

    let task = state.store().update_task(&task).await?;
    for change in changes.iter() {
        record(&state, TaskHistoryEntry::updated(&task, &user, change, now)).await;
    }

    Ok(Json(task))
}

async fn delete_task(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let task = find_task(&state, &user, id.as_str()).await?;

    state.store().delete_task(user.id(), task.id()).await?;
    record(&state, TaskHistoryEntry::deleted(&task, &user, Utc::now())).await;

    Ok(StatusCode::NO_CONTENT)
}

/// The trail of a deleted task stays readable for the user who wrote it. Tasks only ever change
/// at the hands of their owner, so the actors identify the owner once the task is gone.
async fn get_task_history(
    State(state): State<ApplicationState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TaskHistoryEntry>>> {
    if let Some(task) = state.store().find_task(user.id(), id.as_str()).await? {
        return Ok(Json(state.store().list_history(task.id()).await?));
    }

    let history = state.store().list_history(id.as_str()).await?;
    let owned = history
        .first()
        .is_some_and(|entry| *entry.change_type() == ChangeType::Deleted)
        && history.iter().all(|entry| entry.actor() == user.id());
    if !owned {
        return Err(ApplicationError::NotFound(t!("task.not_found")));
    }

    Ok(Json(history))
}
