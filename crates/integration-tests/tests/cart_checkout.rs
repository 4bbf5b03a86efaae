//! Integration tests for the session cart and checkout.

#![allow(clippy::unwrap_used)]

use serde_json::json;

use pasta_haus_core::{ProductId, ProductStatus, UserId};
use pasta_haus_storefront::db::{OrderRepository, ProductRepository};

use pasta_haus_integration_tests::{TestApp, customer, json};

#[tokio::test]
async fn test_guest_cart_lines_merge_and_total() {
    let app = TestApp::spawn().await;
    let client = app.guest();
    let add = |body: serde_json::Value| {
        let client = client.clone();
        let url = app.url("/api/cart/items");
        async move { client.post(url).json(&body).send().await.unwrap() }
    };

    add(json!({ "productId": "1", "variantId": "medium" })).await;
    add(json!({ "productId": "1", "variantId": "medium" })).await;
    let cart = json(add(json!({ "productId": "4", "specialInstructions": "No walnuts" })).await).await;

    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["selectedVariant"]["id"], "medium");
    assert_eq!(items[1]["specialInstructions"], "No walnuts");
    assert_eq!(cart["count"], 3);
    assert_eq!(cart["total"], "1058");

    let count = json(client.get(app.url("/api/cart/count")).send().await.unwrap()).await;
    assert_eq!(count["count"], 3);
}

#[tokio::test]
async fn test_update_remove_and_clear() {
    let app = TestApp::spawn().await;
    let client = app.guest();
    for product in ["2", "3"] {
        client
            .post(app.url("/api/cart/items"))
            .json(&json!({ "productId": product }))
            .send()
            .await
            .unwrap();
    }

    let cart = json(
        client
            .patch(app.url("/api/cart/items/0"))
            .json(&json!({ "quantity": 4 }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(cart["items"][0]["quantity"], 4);

    // Zero is ignored rather than removing the line.
    let cart = json(
        client
            .patch(app.url("/api/cart/items/0"))
            .json(&json!({ "quantity": 0 }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(cart["count"], 5);

    let cart = json(
        client
            .delete(app.url("/api/cart/items/0"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["product"]["id"], "3");

    let cart = json(client.delete(app.url("/api/cart")).send().await.unwrap()).await;
    assert_eq!(cart["count"], 0);
}

#[tokio::test]
async fn test_unorderable_items_are_refused() {
    let app = TestApp::spawn().await;
    app.backend
        .set_product_status(&ProductId::new("2"), ProductStatus::SoldOut)
        .await
        .unwrap();
    let client = app.guest();

    let sold_out = client
        .post(app.url("/api/cart/items"))
        .json(&json!({ "productId": "2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(sold_out.status(), 400);

    let no_such_size = client
        .post(app.url("/api/cart/items"))
        .json(&json!({ "productId": "1", "variantId": "jumbo" }))
        .send()
        .await
        .unwrap();
    assert_eq!(no_such_size.status(), 400);

    let zero = client
        .post(app.url("/api/cart/items"))
        .json(&json!({ "productId": "1", "quantity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(zero.status(), 400);

    let cart = json(client.get(app.url("/api/cart")).send().await.unwrap()).await;
    assert_eq!(cart["count"], 0);
}

#[tokio::test]
async fn test_sold_out_after_menu_was_cached_is_refused() {
    let app = TestApp::spawn().await;
    let client = app.guest();
    let add_carrot_muffins = || {
        client
            .post(app.url("/api/cart/items"))
            .json(&json!({ "productId": "4" }))
            .send()
    };
    assert_eq!(add_carrot_muffins().await.unwrap().status(), 200);

    // Written to the store directly, bypassing the admin routes.
    app.backend
        .set_product_status(&ProductId::new("4"), ProductStatus::SoldOut)
        .await
        .unwrap();

    let refreshed = async {
        loop {
            let product = json(client.get(app.url("/api/products/4")).send().await.unwrap()).await;
            if product["status"] == "sold-out" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(2), refreshed)
        .await
        .unwrap();

    assert_eq!(add_carrot_muffins().await.unwrap().status(), 400);
}

#[tokio::test]
async fn test_checkout_needs_items_then_sign_in() {
    let app = TestApp::spawn().await;
    let client = app.guest();
    let checkout = json!({ "orderType": "pickup" });

    let empty = client
        .post(app.url("/api/checkout"))
        .json(&checkout)
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);

    client
        .post(app.url("/api/cart/items"))
        .json(&json!({ "productId": "2" }))
        .send()
        .await
        .unwrap();
    let guest = client
        .post(app.url("/api/checkout"))
        .json(&checkout)
        .send()
        .await
        .unwrap();
    assert_eq!(guest.status(), 401);

    let cart = json(client.get(app.url("/api/cart")).send().await.unwrap()).await;
    assert_eq!(cart["count"], 1);
}

#[tokio::test]
async fn test_signed_in_checkout_places_order_and_empties_cart() {
    let app = TestApp::spawn().await;
    let alice = customer("google-sub-alice", "Alice");
    let client = app.signed_in(&alice).await;

    client
        .post(app.url("/api/cart/items"))
        .json(&json!({ "productId": "1", "variantId": "large", "quantity": 2 }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(app.url("/api/checkout"))
        .json(&json!({
            "orderType": "delivery",
            "phone": "0917 555 0101",
            "deliveryAddress": "1 Rizal Ave, Lipa, Batangas",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let order = json(resp).await;
    let id = order["id"].as_str().unwrap().to_owned();
    assert!(id.starts_with("ORDER-"));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["totalAmount"], "1598");
    assert_eq!(order["customerName"], "Alice");
    assert_eq!(order["customerEmail"], "alice@example.com");
    assert_eq!(order["userId"], "google-sub-alice");

    let cart = json(client.get(app.url("/api/cart")).send().await.unwrap()).await;
    assert_eq!(cart["count"], 0);

    let orders = json(client.get(app.url("/api/orders")).send().await.unwrap()).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    let shown = json(
        client
            .get(app.url(&format!("/api/orders/{id}")))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(shown["id"], id.as_str());

    let stored = app
        .backend
        .orders_for_user(&UserId::new("google-sub-alice"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_orders_are_private_to_their_customer() {
    let app = TestApp::spawn().await;
    let alice = app.signed_in(&customer("alice", "Alice")).await;
    let bob = app.signed_in(&customer("bob", "Bob")).await;

    alice
        .post(app.url("/api/cart/items"))
        .json(&json!({ "productId": "2" }))
        .send()
        .await
        .unwrap();
    let order = json(
        alice
            .post(app.url("/api/checkout"))
            .json(&json!({ "orderType": "pickup" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let id = order["id"].as_str().unwrap();

    let resp = bob
        .get(app.url(&format!("/api/orders/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let listed = json(bob.get(app.url("/api/orders")).send().await.unwrap()).await;
    assert!(listed.as_array().unwrap().is_empty());

    let anonymous = app.guest().get(app.url("/api/orders")).send().await.unwrap();
    assert_eq!(anonymous.status(), 401);
}
