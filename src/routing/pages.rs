//! Server-rendered pages.

use axum::{
    extract::{Path, State},
    response::Html,
    routing::get,
    Router,
};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::http::server::AppState;
use crate::routing::not_found;
use crate::store::{Collection, DocumentQuery};
use crate::views;

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(overview).fallback(not_found))
        .route("/tour/{slug}", get(tour).fallback(not_found))
}

async fn overview(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let tours = state
        .store
        .find(Collection::Tours, DocumentQuery::default())
        .await?;
    let tours: Vec<Value> = tours.iter().map(|doc| doc.to_json()).collect();

    let html = state
        .views
        .render(views::OVERVIEW, &json!({ "title": "All Tours", "tours": tours }))?;
    Ok(Html(html))
}

async fn tour(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let doc = state
        .store
        .find(Collection::Tours, DocumentQuery::field_equals("slug", slug))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("There is no tour with that name."))?;

    let tour = doc.to_json();
    let title = format!("{} Tour", tour["name"].as_str().unwrap_or_default());
    let html = state
        .views
        .render(views::TOUR, &json!({ "title": title, "tour": tour }))?;
    Ok(Html(html))
}
