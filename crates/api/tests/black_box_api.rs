use chrono::Duration as ChronoDuration;
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, wired to the in-memory store, bound to an
        // ephemeral port.
        let config = cashnote_api::config::Config {
            port: 0,
            database_url: None,
            max_db_connections: 1,
            jwt_secret: "test-secret".to_string(),
            access_token_ttl: ChronoDuration::minutes(10),
            refresh_token_ttl: ChronoDuration::days(1),
        };
        let app = cashnote_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn register(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    phone: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/api/v1/authentications/register", base_url))
        .json(&json!({
            "full_name": "Budi Santoso",
            "email": email,
            "phone_number": phone,
            "password": "correct-horse",
        }))
        .send()
        .await
        .unwrap()
}

async fn register_and_login(client: &reqwest::Client, base_url: &str) -> String {
    let res = register(client, base_url, "budi@example.com", "+628111111111").await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/api/v1/authentications/login", base_url))
        .json(&json!({ "email": "budi@example.com", "password": "correct-horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"]["token_type"], "Bearer");
    body["data"]["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_open() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_login_and_money_flow_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    // Create
    let res = client
        .post(format!("{}/api/v1/money-flows", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "amount": 25000.0, "category": "food", "tags": ["lunch"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["version"], 0);
    assert_eq!(created["data"]["currency"], "IDR");

    // List
    let res = client
        .get(format!("{}/api/v1/money-flows", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listed: serde_json::Value = res.json().await.unwrap();
    assert_eq!(listed["data"]["items"].as_array().unwrap().len(), 1);

    // Update (version-gated)
    let res = client
        .patch(format!("{}/api/v1/money-flows/{}", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({ "amount": 30000.0, "version": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: serde_json::Value = res.json().await.unwrap();
    assert_eq!(updated["data"]["version"], 1);
    assert_eq!(updated["data"]["amount"], 30000.0);

    // Summary
    let res = client
        .get(format!("{}/api/v1/money-flows/summary?category=food", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: serde_json::Value = res.json().await.unwrap();
    assert_eq!(summary["data"]["total"], 30000.0);

    // Delete, then the record is gone
    let res = client
        .delete(format!("{}/api/v1/money-flows/{}", srv.base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/api/v1/money-flows/{}", srv.base_url, id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stale_version_update_conflicts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    let res = client
        .post(format!("{}/api/v1/money-flows", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "amount": 10000.0 }))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();

    // First writer wins.
    let res = client
        .patch(format!("{}/api/v1/money-flows/{}", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({ "amount": 11000.0, "version": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Second writer still holds version 0.
    let res = client
        .patch(format!("{}/api/v1/money-flows/{}", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({ "amount": 12000.0, "version": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["errors"]["code"], "conflict");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = register(&client, &srv.base_url, "siti@example.com", "+628222222222").await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = register(&client, &srv.base_url, "siti@example.com", "+628333333333").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["errors"]["code"], "duplicate");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_identical() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = register(&client, &srv.base_url, "ani@example.com", "+628444444444").await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let wrong_password = client
        .post(format!("{}/api/v1/authentications/login", srv.base_url))
        .json(&json!({ "email": "ani@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    let unknown_email = client
        .post(format!("{}/api/v1/authentications/login", srv.base_url))
        .json(&json!({ "email": "nobody@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

    let a: serde_json::Value = wrong_password.json().await.unwrap();
    let b: serde_json::Value = unknown_email.json().await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn money_flow_routes_require_a_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/v1/money-flows", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/api/v1/money-flows", srv.base_url))
        .bearer_auth("not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn users_cannot_see_each_others_flows() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let token_a = register_and_login(&client, &srv.base_url).await;

    let res = register(&client, &srv.base_url, "lain@example.com", "+628555555555").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let token_b = body["data"]["access_token"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/api/v1/money-flows", srv.base_url))
        .bearer_auth(&token_a)
        .json(&json!({ "amount": 5000.0 }))
        .send()
        .await
        .unwrap();
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let res = client
        .get(format!("{}/api/v1/money-flows/{}", srv.base_url, id))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .delete(format!("{}/api/v1/money-flows/{}", srv.base_url, id))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &srv.base_url).await;

    // Non-positive amount
    let res = client
        .post(format!("{}/api/v1/money-flows", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "amount": -1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Malformed id
    let res = client
        .get(format!("{}/api/v1/money-flows/not-a-uuid", srv.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Short password
    let res = client
        .post(format!("{}/api/v1/authentications/register", srv.base_url))
        .json(&json!({
            "full_name": "X",
            "email": "x@example.com",
            "phone_number": "+628666666666",
            "password": "short",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
