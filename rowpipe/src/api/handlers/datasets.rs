//! `/datasets` handlers (§6): list, delete, and paginated row listing.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        datasets::{ClickRowResponse, DatasetResponse, DatasetRowsResponse, PaginationQuery, TransactionRowResponse},
        users::CurrentUser,
    },
    db::{
        handlers::{ClickRowFilter, ClickRows, DatasetFilter, Datasets, Repository, TransactionRowFilter, TransactionRows},
        tenancy::with_tenant_session,
    },
    errors::{Error, Result},
    types::{DatasetId, DatasetType},
};

/// `GET /datasets` (§6): lists the caller's datasets, most recent first.
pub async fn list_datasets(State(state): State<AppState>, user: CurrentUser, Query(pagination): Query<PaginationQuery>) -> Result<Json<Vec<DatasetResponse>>> {
    let filter = DatasetFilter {
        owner: user.id,
        skip: pagination.offset,
        limit: pagination.limit,
    };

    let rows = with_tenant_session(&state.db, user.id, |session| async move { Datasets::new(session.connection()).list(&filter).await }).await?;

    Ok(Json(rows.into_iter().map(DatasetResponse::from).collect()))
}

/// `DELETE /datasets/{id}` (§3, §6): rows cascade via the foreign key.
pub async fn delete_dataset(State(state): State<AppState>, user: CurrentUser, Path(dataset_id): Path<DatasetId>) -> Result<Json<serde_json::Value>> {
    let deleted = with_tenant_session(&state.db, user.id, |session| async move { Datasets::new(session.connection()).delete(dataset_id).await }).await?;

    if !deleted {
        return Err(Error::NotFound {
            resource: "dataset".to_string(),
            id: dataset_id.to_string(),
        });
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// `GET /datasets/{id}/rows` (§6): paginated rows, shaped by the dataset's type.
pub async fn list_dataset_rows(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(dataset_id): Path<DatasetId>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<DatasetRowsResponse>> {
    let dataset = with_tenant_session(&state.db, user.id, |session| async move { Datasets::new(session.connection()).get_by_id(dataset_id).await })
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "dataset".to_string(),
            id: dataset_id.to_string(),
        })?;

    let response = match dataset.dataset_type {
        DatasetType::Transaction => {
            let filter = TransactionRowFilter {
                owner: user.id,
                dataset_id: Some(dataset_id),
                skip: pagination.offset,
                limit: pagination.limit,
            };
            let rows = with_tenant_session(&state.db, user.id, |session| async move { TransactionRows::new(session.connection()).list(&filter).await }).await?;
            DatasetRowsResponse::Transaction(rows.into_iter().map(TransactionRowResponse::from).collect())
        }
        DatasetType::Click => {
            let filter = ClickRowFilter {
                owner: user.id,
                dataset_id: Some(dataset_id),
                skip: pagination.offset,
                limit: pagination.limit,
            };
            let rows = with_tenant_session(&state.db, user.id, |session| async move { ClickRows::new(session.connection()).list(&filter).await }).await?;
            DatasetRowsResponse::Click(rows.into_iter().map(ClickRowResponse::from).collect())
        }
    };

    Ok(Json(response))
}
