//! Franchise and store management through the router.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use pizza_integration_tests::TestApp;

#[tokio::test]
async fn test_non_admin_cannot_create_franchise() {
    let app = TestApp::spawn().await;
    let (_, diner) = app.register("Pat", "pat@jwt.com", "a").await;

    let response = app
        .post(
            "/franchise",
            Some(&diner),
            json!({ "name": "Pizza Co", "admins": [] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["message"], "unable to create a franchise");

    let unauthenticated = app
        .post("/franchise", None, json!({ "name": "Pizza Co", "admins": [] }))
        .await;
    assert_eq!(unauthenticated.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_franchise_grants_franchisee_role() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let (owner, _) = app.register("Fran", "fran@jwt.com", "a").await;

    let response = app
        .post(
            "/franchise",
            Some(&admin),
            json!({ "name": "Pizza Co", "admins": [{ "email": "fran@jwt.com" }] }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Pizza Co");
    assert_eq!(
        response.body["admins"],
        json!([{ "id": owner["id"], "name": "Fran", "email": "fran@jwt.com" }])
    );
    let franchise_id = response.body["id"].clone();

    // Existing sessions see the new role on the next request
    let (_, owner_token) = app.login("fran@jwt.com", "a").await;
    let me = app.get("/user/me", Some(&owner_token)).await;
    let roles = me.body["roles"].as_array().unwrap();
    assert!(roles.contains(&json!({ "role": "diner" })));
    assert!(roles.contains(&json!({ "role": "franchisee", "objectId": franchise_id })));
}

#[tokio::test]
async fn test_create_franchise_validation() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;

    let unknown_admin = app
        .post(
            "/franchise",
            Some(&admin),
            json!({ "name": "Pizza Co", "admins": [{ "email": "ghost@jwt.com" }] }),
        )
        .await;
    assert_eq!(unknown_admin.status, StatusCode::NOT_FOUND);
    assert_eq!(
        unknown_admin.body["message"],
        "unknown user for franchise admin ghost@jwt.com provided"
    );

    let blank = app
        .post("/franchise", Some(&admin), json!({ "name": "  ", "admins": [] }))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    app.franchise_with_store(&admin, "Pizza Co", &[]).await;
    let duplicate = app
        .post("/franchise", Some(&admin), json!({ "name": "pizza co", "admins": [] }))
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_franchisee_manages_only_own_franchise() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    app.register("Fran", "fran@jwt.com", "a").await;
    app.register("Otto", "otto@jwt.com", "b").await;

    let (pizza_co, _downtown) = app
        .franchise_with_store(&admin, "Pizza Co", &["fran@jwt.com"])
        .await;
    app.franchise_with_store(&admin, "Slice Inc", &["otto@jwt.com"])
        .await;

    let (_, fran) = app.login("fran@jwt.com", "a").await;
    let (_, otto) = app.login("otto@jwt.com", "b").await;

    let uptown = app
        .post(
            &format!("/franchise/{pizza_co}/store"),
            Some(&fran),
            json!({ "name": "Uptown" }),
        )
        .await;
    assert_eq!(uptown.status, StatusCode::OK);
    assert_eq!(uptown.body["name"], "Uptown");
    assert_eq!(uptown.body["franchiseId"], pizza_co);

    let intruder = app
        .post(
            &format!("/franchise/{pizza_co}/store"),
            Some(&otto),
            json!({ "name": "Hijack" }),
        )
        .await;
    assert_eq!(intruder.status, StatusCode::FORBIDDEN);
    assert_eq!(intruder.body["message"], "unable to create a store");

    let uptown_id = uptown.body["id"].as_i64().unwrap();
    let delete_by_intruder = app
        .delete(
            &format!("/franchise/{pizza_co}/store/{uptown_id}"),
            Some(&otto),
        )
        .await;
    assert_eq!(delete_by_intruder.status, StatusCode::FORBIDDEN);
    assert_eq!(delete_by_intruder.body["message"], "unable to delete a store");

    let deleted = app
        .delete(&format!("/franchise/{pizza_co}/store/{uptown_id}"), Some(&fran))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body, json!({ "message": "store deleted" }));

    // A franchisee cannot delete the franchise itself
    let franchise_delete = app
        .delete(&format!("/franchise/{pizza_co}"), Some(&fran))
        .await;
    assert_eq!(franchise_delete.status, StatusCode::FORBIDDEN);
    assert_eq!(franchise_delete.body["message"], "unable to delete a franchise");
}

#[tokio::test]
async fn test_store_under_unknown_franchise_is_not_found() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;

    let response = app
        .post("/franchise/777/store", Some(&admin), json!({ "name": "Nowhere" }))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_franchise_cascades() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let (fran, _) = app.register("Fran", "fran@jwt.com", "a").await;
    let (franchise, store) = app
        .franchise_with_store(&admin, "Pizza Co", &["fran@jwt.com"])
        .await;

    let deleted = app
        .delete(&format!("/franchise/{franchise}"), Some(&admin))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body, json!({ "message": "franchise deleted" }));

    // Store and franchisee role are gone with it
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (_, diner) = app.register("Pat", "pat@jwt.com", "a").await;
    let order = app
        .post(
            "/order",
            Some(&diner),
            json!({
                "franchiseId": franchise,
                "storeId": store,
                "items": [{ "menuId": veggie, "description": "Veggie", "price": 0.0038 }],
            }),
        )
        .await;
    assert_eq!(order.status, StatusCode::NOT_FOUND);

    let (_, fran_token) = app.login("fran@jwt.com", "a").await;
    let me = app.get("/user/me", Some(&fran_token)).await;
    assert_eq!(me.body["roles"], json!([{ "role": "diner" }]));
    let mine = app
        .get(&format!("/franchise/{}", fran["id"]), Some(&fran_token))
        .await;
    assert_eq!(mine.body, json!([]));

    // Deleting again still succeeds
    let again = app
        .delete(&format!("/franchise/{franchise}"), Some(&admin))
        .await;
    assert_eq!(again.status, StatusCode::OK);
}

#[tokio::test]
async fn test_listing_hides_admins_from_non_admins() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    app.register("Fran", "fran@jwt.com", "a").await;
    app.franchise_with_store(&admin, "Pizza Co", &["fran@jwt.com"])
        .await;

    let public = app.get("/franchise", None).await;
    assert_eq!(public.status, StatusCode::OK);
    let franchise = &public.body["franchises"][0];
    assert_eq!(franchise["name"], "Pizza Co");
    assert!(franchise.get("admins").is_none());
    assert_eq!(franchise["stores"][0]["name"], "Pizza Co Main St");
    assert!(franchise["stores"][0].get("totalRevenue").is_none());

    // An unknown token falls back to the public view rather than 401
    let stale = app.get("/franchise", Some("not-a-token")).await;
    assert_eq!(stale.status, StatusCode::OK);
    assert_eq!(stale.body, public.body);

    let full = app.get("/franchise", Some(&admin)).await;
    let franchise = &full.body["franchises"][0];
    assert_eq!(franchise["admins"][0]["email"], "fran@jwt.com");
    assert!(franchise["stores"][0].get("totalRevenue").is_some());
}

#[tokio::test]
async fn test_listing_filters_and_pages() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    for name in ["Pizza Co", "Pizza Pocket", "Slice Inc"] {
        app.franchise_with_store(&admin, name, &[]).await;
    }

    let pizza = app.get("/franchise?name=pizza*", None).await;
    let names: Vec<&str> = pizza.body["franchises"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Pizza Co", "Pizza Pocket"]);
    assert_eq!(pizza.body["more"], false);

    let first = app.get("/franchise?page=0&limit=2", None).await;
    assert_eq!(first.body["franchises"].as_array().unwrap().len(), 2);
    assert_eq!(first.body["more"], true);

    let last = app.get("/franchise?page=1&limit=2", None).await;
    assert_eq!(last.body["franchises"][0]["name"], "Slice Inc");
    assert_eq!(last.body["more"], false);
}

#[tokio::test]
async fn test_user_franchises_carry_revenue() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.admin("admin@jwt.com").await;
    let (fran, _) = app.register("Fran", "fran@jwt.com", "a").await;
    let (franchise, store) = app
        .franchise_with_store(&admin, "Pizza Co", &["fran@jwt.com"])
        .await;
    let veggie = app.add_menu_item(&admin, "Veggie", 0.0038).await;
    let (_, diner) = app.register("Pat", "pat@jwt.com", "a").await;

    let order = json!({
        "franchiseId": franchise,
        "storeId": store,
        "items": [
            { "menuId": veggie, "description": "Veggie", "price": 0.5 },
            { "menuId": veggie, "description": "Veggie", "price": 0.25 },
        ],
    });
    assert_eq!(
        app.post("/order", Some(&diner), order).await.status,
        StatusCode::OK
    );

    let (_, fran_token) = app.login("fran@jwt.com", "a").await;
    let mine = app
        .get(&format!("/franchise/{}", fran["id"]), Some(&fran_token))
        .await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.body[0]["id"], franchise);
    assert_eq!(mine.body[0]["stores"][0]["totalRevenue"], 0.75);

    // Someone else asking gets nothing rather than an error
    let snooping = app
        .get(&format!("/franchise/{}", fran["id"]), Some(&diner))
        .await;
    assert_eq!(snooping.status, StatusCode::OK);
    assert_eq!(snooping.body, json!([]));

    let as_admin = app
        .get(&format!("/franchise/{}", fran["id"]), Some(&admin))
        .await;
    assert_eq!(as_admin.body.as_array().unwrap().len(), 1);
}
