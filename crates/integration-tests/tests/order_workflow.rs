//! Menu, order placement, and order listing through the router.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use pizza_integration_tests::{FactoryMode, REPORT_URL, TestApp, TestResponse};

#[tokio::test]
async fn test_menu_is_public_and_admin_only_to_extend() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let (_, diner) = app.register("Pat", "pat@jwt.com", "a").await;

    let empty = app.get("/order/menu", None).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body, json!([]));

    let forbidden = app
        .put(
            "/order/menu",
            Some(&diner),
            json!({ "title": "Veggie", "price": 0.0038 }),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["message"], "unable to add menu item");

    app.add_menu_item(&admin, "Veggie", 0.0038).await;
    app.add_menu_item(&admin, "Pepperoni", 0.0042).await;

    // The cached menu reflects both writes
    let menu = app.get("/order/menu", None).await;
    let titles: Vec<&str> = menu
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Veggie", "Pepperoni"]);
    assert_eq!(menu.body[0]["price"], 0.0038);
}

#[tokio::test]
async fn test_negative_menu_price_is_bad_request() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;

    let response = app
        .put(
            "/order/menu",
            Some(&admin),
            json!({ "title": "Free money", "price": -1 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_place_order_success() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let pepperoni = app.add_menu_item(&admin, "Pepperoni", 0.0042).await;
    let (franchise, store) = app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let (diner, token) = app.register("Pat", "pat@jwt.com", "a").await;

    let response = app
        .post(
            "/order",
            Some(&token),
            json!({
                "franchiseId": franchise,
                "storeId": store,
                "items": [
                    { "menuId": veggie, "description": "Veggie", "price": 0.05 },
                    { "menuId": pepperoni, "description": "Pepperoni", "price": 0.0042 },
                ],
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);

    let order = &response.body["order"];
    assert_eq!(order["dinerId"], diner["id"]);
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    // Submitted prices are snapshotted, not looked up from the menu
    assert_eq!(order["items"][0]["price"], 0.05);
    assert_eq!(response.body["jwt"], "factory-jwt-1");
    assert_eq!(response.body["reportUrl"], REPORT_URL);

    // The factory saw a signed request carrying the diner and the order
    assert_eq!(app.factory.rejected_signatures(), 0);
    let received = app.factory.orders();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body["diner"]["email"], "pat@jwt.com");
    assert_eq!(received[0].body["order"]["id"], order["id"]);

    let snapshot = app.telemetry.metrics().snapshot();
    assert_eq!(snapshot.pizzas_sold, 2);
    assert_eq!(snapshot.fulfillment_failures, 0);
    assert_eq!(snapshot.revenue.to_string(), "0.0542");
}

#[tokio::test]
async fn test_factory_failure_keeps_the_order() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (franchise, store) = app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let (_, token) = app.register("Pat", "pat@jwt.com", "a").await;

    app.factory.set_mode(FactoryMode::Fail);
    let response = app
        .post(
            "/order",
            Some(&token),
            json!({
                "franchiseId": franchise,
                "storeId": store,
                "items": [{ "menuId": veggie, "description": "Veggie", "price": 0.0038 }],
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["message"], "Failed to fulfill order at factory");
    assert_eq!(
        response.body["reportPizzaCreationErrorToPizzaFactoryUrl"],
        REPORT_URL
    );
    assert!(response.body.get("stack").is_none());

    let orders = app.get("/order", Some(&token)).await;
    assert_eq!(orders.status, StatusCode::OK);
    assert_eq!(orders.body["orders"].as_array().unwrap().len(), 1);

    let snapshot = app.telemetry.metrics().snapshot();
    assert_eq!(snapshot.fulfillment_failures, 1);
    assert_eq!(snapshot.pizzas_sold, 0);
}

#[tokio::test]
async fn test_factory_failure_exposes_stack_when_enabled() {
    let app = TestApp::spawn_with(|config| config.expose_error_detail = true).await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (franchise, store) = app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let (_, token) = app.register("Pat", "pat@jwt.com", "a").await;

    app.factory.set_mode(FactoryMode::Fail);
    let response = app
        .post(
            "/order",
            Some(&token),
            json!({
                "franchiseId": franchise,
                "storeId": store,
                "items": [{ "menuId": veggie, "description": "Veggie", "price": 0.0038 }],
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["message"], "Failed to fulfill order at factory");
    assert!(response.body["stack"].as_str().unwrap().contains("Factory"));
}

#[tokio::test]
async fn test_unknown_franchise_writes_nothing() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (_, token) = app.register("Pat", "pat@jwt.com", "a").await;

    let response = app
        .post(
            "/order",
            Some(&token),
            json!({
                "franchiseId": 999,
                "storeId": 998,
                "items": [{ "menuId": veggie, "description": "Veggie", "price": 0.0038 }],
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let orders = app.get("/order", Some(&token)).await;
    assert_eq!(orders.body["orders"], json!([]));
    assert!(app.factory.orders().is_empty());
}

#[tokio::test]
async fn test_store_of_another_franchise_is_not_found() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (first, _) = app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let (_, other_store) = app.franchise_with_store(&admin, "Slice Inc", &[]).await;
    let (_, token) = app.register("Pat", "pat@jwt.com", "a").await;

    let response = app
        .post(
            "/order",
            Some(&token),
            json!({
                "franchiseId": first,
                "storeId": other_store,
                "items": [{ "menuId": veggie, "description": "Veggie", "price": 0.0038 }],
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "unknown store");
}

#[tokio::test]
async fn test_order_validation_errors() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let (franchise, store) = app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let (_, token) = app.register("Pat", "pat@jwt.com", "a").await;

    let empty = app
        .post(
            "/order",
            Some(&token),
            json!({ "franchiseId": franchise, "storeId": store, "items": [] }),
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let negative = app
        .post(
            "/order",
            Some(&token),
            json!({
                "franchiseId": franchise,
                "storeId": store,
                "items": [{ "menuId": 1, "description": "x", "price": -0.5 }],
            }),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);

    let unknown_item = app
        .post(
            "/order",
            Some(&token),
            json!({
                "franchiseId": franchise,
                "storeId": store,
                "items": [{ "menuId": 4242, "description": "x", "price": 1 }],
            }),
        )
        .await;
    assert_eq!(unknown_item.status, StatusCode::NOT_FOUND);
    assert!(app.factory.orders().is_empty());
}

#[tokio::test]
async fn test_orders_are_private_and_paged() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (franchise, store) = app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let (pat, pat_token) = app.register("Pat", "pat@jwt.com", "a").await;
    let (_, sam_token) = app.register("Sam", "sam@jwt.com", "b").await;

    let order = json!({
        "franchiseId": franchise,
        "storeId": store,
        "items": [{ "menuId": veggie, "description": "Veggie", "price": 0.0038 }],
    });
    for _ in 0..3 {
        let placed = app.post("/order", Some(&pat_token), order.clone()).await;
        assert_eq!(placed.status, StatusCode::OK);
    }
    app.post("/order", Some(&sam_token), order).await;

    // Page size is 2 in the test configuration
    let first = app.get("/order", Some(&pat_token)).await;
    assert_eq!(first.body["dinerId"], pat["id"]);
    assert_eq!(first.body["page"], 0);
    assert_eq!(first.body["more"], true);
    let first_ids: Vec<i64> = first.body["orders"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_i64().unwrap())
        .collect();
    assert_eq!(first_ids.len(), 2);
    assert!(first_ids[0] < first_ids[1]);

    let second = app.get("/order?page=1", Some(&pat_token)).await;
    assert_eq!(second.body["more"], false);
    let second_orders = second.body["orders"].as_array().unwrap();
    assert_eq!(second_orders.len(), 1);
    assert!(second_orders[0]["id"].as_i64().unwrap() > first_ids[1]);

    let sam_orders = app.get("/order", Some(&sam_token)).await;
    let sam_orders = sam_orders.body["orders"].as_array().unwrap();
    assert_eq!(sam_orders.len(), 1);
    assert!(sam_orders.iter().all(|o| o["dinerId"] != pat["id"]));
}

/// Place one Veggie order for a fresh diner, returning the response and the
/// diner's token.
async fn place_single_order(app: &TestApp) -> (TestResponse, String) {
    let (_, admin) = app.admin("admin@jwt.com").await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (franchise, store) = app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let (_, token) = app.register("Pat", "pat@jwt.com", "a").await;

    let response = app
        .post(
            "/order",
            Some(&token),
            json!({
                "franchiseId": franchise,
                "storeId": store,
                "items": [{ "menuId": veggie, "description": "Veggie", "price": 0.0038 }],
            }),
        )
        .await;
    (response, token)
}

/// A failed fulfillment answers 500 without a report URL and keeps the order.
async fn assert_unfulfilled_without_report(
    app: &TestApp,
    response: &TestResponse,
    token: &str,
) {
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["message"], "Failed to fulfill order at factory");
    assert!(response.body["reportPizzaCreationErrorToPizzaFactoryUrl"].is_null());

    let orders = app.get("/order", Some(token)).await;
    assert_eq!(orders.body["orders"].as_array().unwrap().len(), 1);

    let snapshot = app.telemetry.metrics().snapshot();
    assert_eq!(snapshot.fulfillment_failures, 1);
    assert_eq!(snapshot.pizzas_sold, 0);
}

#[tokio::test]
async fn test_factory_timeout_is_a_fulfillment_failure() {
    let app = TestApp::spawn_with(|config| config.factory.timeout_secs = 1).await;
    app.factory.set_mode(FactoryMode::Stall);

    let (response, token) = place_single_order(&app).await;
    assert_unfulfilled_without_report(&app, &response, &token).await;
}

#[tokio::test]
async fn test_unreachable_factory_is_a_fulfillment_failure() {
    // Bind and release a port so nothing is listening on it
    let closed = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let app = TestApp::spawn_with(|config| {
        config.factory.url = url::Url::parse(&format!("http://{closed}")).unwrap();
    })
    .await;

    let (response, token) = place_single_order(&app).await;
    assert_unfulfilled_without_report(&app, &response, &token).await;
    assert!(app.factory.orders().is_empty());
}

#[tokio::test]
async fn test_success_without_ticket_is_a_fulfillment_failure() {
    let app = TestApp::spawn().await;
    app.factory.set_mode(FactoryMode::NoTicket);

    let (response, token) = place_single_order(&app).await;
    assert_unfulfilled_without_report(&app, &response, &token).await;
    assert_eq!(app.factory.orders().len(), 1);
}

#[tokio::test]
async fn test_out_of_range_prices_are_bad_requests() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (franchise, store) = app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let (_, token) = app.register("Pat", "pat@jwt.com", "a").await;

    let huge_menu_item = app
        .put(
            "/order/menu",
            Some(&admin),
            json!({ "title": "Gold leaf", "price": 5e28 }),
        )
        .await;
    assert_eq!(huge_menu_item.status, StatusCode::BAD_REQUEST);

    for price in [json!(5e28), json!("100000000"), json!(0.00385)] {
        let response = app
            .post(
                "/order",
                Some(&token),
                json!({
                    "franchiseId": franchise,
                    "storeId": store,
                    "items": [
                        { "menuId": veggie, "description": "Veggie", "price": price },
                        { "menuId": veggie, "description": "Veggie", "price": price },
                    ],
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "price {price}");
    }

    let orders = app.get("/order", Some(&token)).await;
    assert!(orders.body["orders"].as_array().unwrap().is_empty());
    assert!(app.factory.orders().is_empty());
}

#[tokio::test]
async fn test_largest_prices_sum_past_the_unit_limit() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (franchise, store) = app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let (_, token) = app.register("Pat", "pat@jwt.com", "a").await;

    let response = app
        .post(
            "/order",
            Some(&token),
            json!({
                "franchiseId": franchise,
                "storeId": store,
                "items": [
                    { "menuId": veggie, "description": "Veggie", "price": "99999999.9999" },
                    { "menuId": veggie, "description": "Veggie", "price": "99999999.9999" },
                ],
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let snapshot = app.telemetry.metrics().snapshot();
    assert_eq!(snapshot.revenue.to_string(), "199999999.9998");

    let franchises = app.get("/franchise?name=Pizza*", Some(&admin)).await;
    let revenue = franchises.body["franchises"][0]["stores"][0]["totalRevenue"]
        .as_f64()
        .unwrap();
    assert!((revenue - 199_999_999.9998).abs() < 1e-6);
}
