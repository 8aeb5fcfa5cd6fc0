//! Resource groups and server-rendered pages.

use reqwest::StatusCode;
use serde_json::{json, Value};

use tour_server::config::Environment;

mod common;

use common::spawn_default;

fn forest_hiker() -> Value {
    json!({
        "name": "The Forest Hiker",
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": "easy",
        "price": 397
    })
}

#[tokio::test]
async fn test_tour_crud_cycle() {
    let app = spawn_default(Environment::Production).await;

    let res = app
        .client
        .post(app.url("/api/v1/tours"))
        .json(&forest_hiker())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert!(body["requestedAt"].as_str().unwrap().ends_with('Z'));
    let tour = &body["data"]["data"];
    assert_eq!(tour["slug"], "the-forest-hiker");
    let id = tour["id"].as_str().unwrap().to_string();

    let fetched: Value = app
        .client
        .get(app.url(&format!("/api/v1/tours/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["data"]["data"]["name"], "The Forest Hiker");

    let res = app
        .client
        .patch(app.url(&format!("/api/v1/tours/{id}")))
        .json(&json!({ "price": 497, "name": "The Forest Walker" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let patched: Value = res.json().await.unwrap();
    assert_eq!(patched["data"]["data"]["price"], 497);
    assert_eq!(patched["data"]["data"]["slug"], "the-forest-walker");
    assert_eq!(patched["data"]["data"]["duration"], 5);

    let res = app
        .client
        .delete(app.url(&format!("/api/v1/tours/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app
        .client
        .get(app.url(&format!("/api/v1/tours/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "fail", "message": "No document found with that ID" }));
}

#[tokio::test]
async fn test_list_envelope() {
    let app = spawn_default(Environment::Production).await;

    let body: Value = app
        .client
        .get(app.url("/api/v1/bookings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["results"], 0);
    assert_eq!(body["data"]["data"], json!([]));
    assert!(body["requestedAt"].is_string());
}

#[tokio::test]
async fn test_malformed_id() {
    let app = spawn_default(Environment::Production).await;

    let res = app.client.get(app.url("/api/v1/users/abc")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "fail", "message": "Invalid id: abc." }));
}

#[tokio::test]
async fn test_create_validates_required_fields() {
    let app = spawn_default(Environment::Production).await;

    let res = app
        .client
        .post(app.url("/api/v1/reviews"))
        .json(&json!({ "review": "Loved it", "rating": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Invalid input data. A review must have a tour. A review must have a user"
    );
}

#[tokio::test]
async fn test_listing_filters_sort_fields_and_pages() {
    let app = spawn_default(Environment::Production).await;

    for (name, price, difficulty) in [
        ("The Forest Hiker", 397, "easy"),
        ("The Sea Explorer", 497, "medium"),
        ("The Snow Adventurer", 997, "difficult"),
        ("The City Wanderer", 1197, "easy"),
    ] {
        let res = app
            .client
            .post(app.url("/api/v1/tours"))
            .json(&json!({ "name": name, "duration": 7, "maxGroupSize": 15, "difficulty": difficulty, "price": price }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let body: Value = app
        .client
        .get(app.url("/api/v1/tours?price[gte]=497&sort=-price&fields=name,price"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["results"], 3);
    let first = &body["data"]["data"][0];
    assert_eq!(first["name"], "The City Wanderer");
    assert!(first.get("difficulty").is_none());
    assert!(first.get("id").is_some());

    let body: Value = app
        .client
        .get(app.url("/api/v1/tours?difficulty=easy&sort=price&page=2&limit=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["data"][0]["name"], "The City Wanderer");
}

#[tokio::test]
async fn test_overview_and_tour_pages() {
    let app = spawn_default(Environment::Production).await;

    let res = app
        .client
        .post(app.url("/api/v1/tours"))
        .json(&forest_hiker())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = res.text().await.unwrap();
    assert!(html.contains("href=\"/tour/the-forest-hiker\""));

    let res = app
        .client
        .get(app.url("/tour/the-forest-hiker"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = res.text().await.unwrap();
    assert!(html.contains("The Forest Hiker Tour"));
    assert!(html.contains("price: 397"));

    let res = app.client.get(app.url("/tour/atlantis")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let html = res.text().await.unwrap();
    assert!(html.contains("There is no tour with that name."));
}
