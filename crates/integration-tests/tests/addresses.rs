//! Integration tests for the customer address book.

#![allow(clippy::unwrap_used)]

use reqwest::Client;
use serde_json::{Value, json};

use pasta_haus_integration_tests::{TestApp, customer, first_event, json};

fn address(street: &str) -> Value {
    json!({
        "street": street,
        "barangay": "Poblacion",
        "city": "Lipa",
        "province": "Batangas",
        "country": "Philippines",
    })
}

async fn create(app: &TestApp, client: &Client, body: &Value) -> Value {
    let resp = client
        .post(app.url("/api/addresses"))
        .json(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    json(resp).await
}

async fn default_id(app: &TestApp, client: &Client) -> Value {
    let default = json(
        client
            .get(app.url("/api/addresses/default"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    default["id"].clone()
}

#[tokio::test]
async fn test_address_book_requires_sign_in() {
    let app = TestApp::spawn().await;
    let resp = app
        .guest()
        .post(app.url("/api/addresses"))
        .json(&address("1 Rizal Ave"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_single_default_is_maintained() {
    let app = TestApp::spawn().await;
    let client = app.signed_in(&customer("alice", "Alice")).await;

    let none = json(
        client
            .get(app.url("/api/addresses/default"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert!(none.is_null());

    let home = create(&app, &client, &address("1 Rizal Ave")).await;
    assert_eq!(home["isDefault"], true);
    assert_eq!(home["userId"], "alice");

    let mut work = address("2 Luna St");
    work["isDefault"] = json!(true);
    work["label"] = json!("Work");
    let work = create(&app, &client, &work).await;
    assert_eq!(default_id(&app, &client).await, work["id"]);

    let id = home["id"].as_str().unwrap();
    let promoted = json(
        client
            .post(app.url(&format!("/api/addresses/{id}/default")))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(promoted["isDefault"], true);

    let all = json(client.get(app.url("/api/addresses")).send().await.unwrap()).await;
    let defaults: Vec<&Value> = all
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["isDefault"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"], home["id"]);
}

#[tokio::test]
async fn test_update_validates_required_fields() {
    let app = TestApp::spawn().await;
    let client = app.signed_in(&customer("alice", "Alice")).await;
    let home = create(&app, &client, &address("1 Rizal Ave")).await;
    let url = app.url(&format!("/api/addresses/{}", home["id"].as_str().unwrap()));

    let updated = json(
        client
            .put(&url)
            .json(&address("9 Bonifacio Dr"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(updated["street"], "9 Bonifacio Dr");
    assert_eq!(updated["isDefault"], true);

    let resp = client
        .put(&url)
        .json(&address("   "))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_other_customers_cannot_touch_an_address() {
    let app = TestApp::spawn().await;
    let alice = app.signed_in(&customer("alice", "Alice")).await;
    let bob = app.signed_in(&customer("bob", "Bob")).await;
    let home = create(&app, &alice, &address("1 Rizal Ave")).await;
    let id = home["id"].as_str().unwrap();

    let resp = bob
        .delete(app.url(&format!("/api/addresses/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let resp = bob
        .post(app.url(&format!("/api/addresses/{id}/default")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let listed = json(bob.get(app.url("/api/addresses")).send().await.unwrap()).await;
    assert!(listed.as_array().unwrap().is_empty());

    let resp = alice
        .delete(app.url(&format!("/api/addresses/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
}

#[tokio::test]
async fn test_live_addresses_start_with_snapshot() {
    let app = TestApp::spawn().await;
    let client = app.signed_in(&customer("alice", "Alice")).await;
    create(&app, &client, &address("1 Rizal Ave")).await;

    let resp = client
        .get(app.url("/api/addresses/live"))
        .send()
        .await
        .unwrap();
    let (event, data) = first_event(resp).await;
    assert_eq!(event, "snapshot");
    assert_eq!(data[0]["street"], "1 Rizal Ave");
}
