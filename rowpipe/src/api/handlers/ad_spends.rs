//! `/ad_spends` handlers (§4.6, §6): CRUD plus the allocate action.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    allocator,
    api::models::{
        ad_spends::{
            AdSpendResponse, AllocateAdSpendRequest, AllocateAdSpendResponse, BulkCreateAdSpendRequest, CreateAdSpendRequest, UpdateAdSpendRequest,
        },
        datasets::PaginationQuery,
        users::CurrentUser,
    },
    db::{
        handlers::{AdSpendFilter, AdSpends, Repository},
        models::ad_spends::{AdSpendCreateDBRequest, AdSpendUpdateDBRequest},
        tenancy::with_tenant_session,
    },
    errors::{Error, Result},
    types::AdSpendId,
};

pub async fn list_ad_spends(State(state): State<AppState>, user: CurrentUser, Query(pagination): Query<PaginationQuery>) -> Result<Json<Vec<AdSpendResponse>>> {
    let filter = AdSpendFilter {
        owner: user.id,
        from: None,
        to: None,
        skip: pagination.offset,
        limit: pagination.limit,
    };

    let rows = with_tenant_session(&state.db, user.id, |session| async move { AdSpends::new(session.connection()).list(&filter).await }).await?;

    Ok(Json(rows.into_iter().map(AdSpendResponse::from).collect()))
}

pub async fn create_ad_spend(State(state): State<AppState>, user: CurrentUser, Json(request): Json<CreateAdSpendRequest>) -> Result<Json<AdSpendResponse>> {
    let created = with_tenant_session(&state.db, user.id, |session| async move {
        AdSpends::new(session.connection())
            .create(&AdSpendCreateDBRequest {
                owner: user.id,
                date: request.date,
                sub_id: request.sub_id,
                amount: request.amount,
                clicks: request.clicks,
            })
            .await
    })
    .await?;

    Ok(Json(AdSpendResponse::from(created)))
}

/// `POST /ad_spends/bulk` (§6): creates many ad-spend rows in one call.
pub async fn bulk_create_ad_spends(State(state): State<AppState>, user: CurrentUser, Json(request): Json<BulkCreateAdSpendRequest>) -> Result<Json<Vec<AdSpendResponse>>> {
    let created = with_tenant_session(&state.db, user.id, |session| async move {
        let mut repo = AdSpends::new(session.connection());
        let mut created = Vec::with_capacity(request.items.len());
        for item in request.items {
            let row = repo
                .create(&AdSpendCreateDBRequest {
                    owner: user.id,
                    date: item.date,
                    sub_id: item.sub_id,
                    amount: item.amount,
                    clicks: item.clicks,
                })
                .await?;
            created.push(row);
        }
        Ok(created)
    })
    .await?;

    Ok(Json(created.into_iter().map(AdSpendResponse::from).collect()))
}

pub async fn update_ad_spend(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(ad_spend_id): Path<AdSpendId>,
    Json(request): Json<UpdateAdSpendRequest>,
) -> Result<Json<AdSpendResponse>> {
    let updated = with_tenant_session(&state.db, user.id, |session| async move {
        AdSpends::new(session.connection())
            .update(
                ad_spend_id,
                &AdSpendUpdateDBRequest {
                    amount: request.amount,
                    clicks: request.clicks,
                },
            )
            .await
    })
    .await?;

    Ok(Json(AdSpendResponse::from(updated)))
}

pub async fn delete_ad_spend(State(state): State<AppState>, user: CurrentUser, Path(ad_spend_id): Path<AdSpendId>) -> Result<Json<serde_json::Value>> {
    let deleted = with_tenant_session(&state.db, user.id, |session| async move { AdSpends::new(session.connection()).delete(ad_spend_id).await }).await?;

    if !deleted {
        return Err(Error::NotFound {
            resource: "ad_spend".to_string(),
            id: ad_spend_id.to_string(),
        });
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// `POST /ad_spends/{id}/allocate` (§4.6, §6).
pub async fn allocate_ad_spend(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(ad_spend_id): Path<AdSpendId>,
    Json(request): Json<AllocateAdSpendRequest>,
) -> Result<Json<AllocateAdSpendResponse>> {
    let outcome = with_tenant_session(&state.db, user.id, |session| async move {
        allocator::allocate(session.connection(), user.id, request.dataset_id, ad_spend_id).await
    })
    .await?;

    Ok(Json(AllocateAdSpendResponse {
        ad_spend_id,
        dataset_id: request.dataset_id,
        rows_updated: outcome.rows_updated,
        already_allocated: outcome.already_allocated,
    }))
}
