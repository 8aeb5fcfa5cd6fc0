//! REST resource groups over the document store.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::http::body::RawPayload;
use crate::http::params::QueryParams;
use crate::http::request::RequestTime;
use crate::http::server::AppState;
use crate::routing::not_found;
use crate::store::{Collection, DocumentQuery};

const NO_DOCUMENT: &str = "No document found with that ID";

/// Routes for one collection, to be nested under `/api/v1/<name>`.
pub fn resource_routes(collection: Collection) -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create).fallback(not_found))
        .route(
            "/{id}",
            get(fetch).patch(update).delete(remove).fallback(not_found),
        )
        .layer(Extension(collection))
}

/// All collections mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Collection::ALL
        .into_iter()
        .fold(Router::new(), |router, collection| {
            router.nest(&format!("/api/v1/{}", collection.name()), resource_routes(collection))
        })
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidId(raw.to_string()))
}

fn object(body: Value) -> Result<Map<String, Value>, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::MalformedBody("expected an object".to_string())),
    }
}

fn single(time: RequestTime, doc: Value) -> Json<Value> {
    Json(json!({
        "status": "success",
        "requestedAt": time.to_iso(),
        "data": { "data": doc },
    }))
}

async fn list(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    params: QueryParams,
    time: RequestTime,
) -> Result<Json<Value>, AppError> {
    let query = DocumentQuery::from_params(&params);
    let docs = state.store.find(collection, query.clone()).await?;
    let data: Vec<Value> = docs.iter().map(|doc| query.project(doc)).collect();

    Ok(Json(json!({
        "status": "success",
        "results": data.len(),
        "requestedAt": time.to_iso(),
        "data": { "data": data },
    })))
}

async fn create(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    time: RequestTime,
    RawPayload(body): RawPayload,
) -> Result<Response, AppError> {
    let mut fields = object(body)?;
    collection.prepare(&mut fields);

    let missing = collection.validate(&fields);
    if !missing.is_empty() {
        return Err(AppError::Validation(missing));
    }

    let doc = state.store.insert(collection, fields).await?;
    tracing::debug!(collection = %collection, id = %doc.id, "Document created");
    Ok((StatusCode::CREATED, single(time, doc.to_json())).into_response())
}

async fn fetch(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    Path(id): Path<String>,
    time: RequestTime,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    let doc = state
        .store
        .get(collection, id)
        .await?
        .ok_or_else(|| AppError::not_found(NO_DOCUMENT))?;
    Ok(single(time, doc.to_json()))
}

async fn update(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    Path(id): Path<String>,
    time: RequestTime,
    RawPayload(body): RawPayload,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    let mut fields = object(body)?;
    collection.prepare(&mut fields);

    let cleared = collection.validate_patch(&fields);
    if !cleared.is_empty() {
        return Err(AppError::Validation(cleared));
    }

    let doc = state
        .store
        .update(collection, id, fields)
        .await?
        .ok_or_else(|| AppError::not_found(NO_DOCUMENT))?;
    Ok(single(time, doc.to_json()))
}

async fn remove(
    State(state): State<AppState>,
    Extension(collection): Extension<Collection>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    if state.store.delete(collection, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(NO_DOCUMENT))
    }
}
