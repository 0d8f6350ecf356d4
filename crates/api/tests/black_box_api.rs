use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use supplydesk_api::app::{build_app, AppServices};
use supplydesk_auth::{JwtClaims, Role};
use supplydesk_core::UserId;
use supplydesk_infra::config::AppConfig;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    _media: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        let media = tempfile::tempdir().expect("failed to create media dir");
        let mut config = AppConfig::default();
        config.media.root = media.path().to_string_lossy().into_owned();

        // Same router as prod, in-memory store, ephemeral port.
        let app = build_app(AppServices::in_memory(&config), SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            _media: media,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: UserId, role: Role) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        roles: vec![role],
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// An admin token; admins are provisioned as approved on first use.
fn admin_token() -> String {
    mint_jwt(UserId::new(), Role::Admin)
}

async fn create_user(
    client: &reqwest::Client,
    srv: &TestServer,
    admin: &str,
    username: &str,
    role: &str,
) -> (UserId, String) {
    let id = UserId::new();
    let res = client
        .post(srv.url("/users"))
        .bearer_auth(admin)
        .json(&json!({
            "id": id,
            "username": username,
            "full_name": format!("{username} tester"),
            "role": role,
            "department": "IT",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let parsed_role: Role = serde_json::from_value(json!(role)).unwrap();
    (id, mint_jwt(id, parsed_role))
}

async fn create_supply(client: &reqwest::Client, srv: &TestServer, token: &str, name: &str, qty: u32) -> String {
    let res = client
        .post(srv.url("/supplies"))
        .bearer_auth(token)
        .json(&json!({ "name": name, "initial_quantity": qty, "min_stock_level": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

async fn supply_quantity(client: &reqwest::Client, srv: &TestServer, token: &str, id: &str) -> u64 {
    let body: Value = client
        .get(srv.url(&format!("/supplies/{id}")))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["supply"]["quantity"].as_u64().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn whoami_reports_directory_role_and_permissions() {
    let srv = TestServer::spawn().await;
    let sub = UserId::new();
    let token = mint_jwt(sub, Role::Admin);

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_str().unwrap(), sub.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
    assert!(body["permissions"].as_array().unwrap().iter().any(|p| p == "*"));
    assert_eq!(body["store"], "in_memory");
}

#[tokio::test]
async fn self_provisioned_department_user_waits_for_approval() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let sub = UserId::new();
    let token = mint_jwt(sub, Role::DepartmentUser);

    let res = client.get(srv.url("/whoami")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "account_disabled");

    let admin = admin_token();
    let res = client
        .post(srv.url(&format!("/users/{sub}/approve")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/whoami")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn deactivated_users_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token();
    let (id, token) = create_user(&client, &srv, &admin, "gso1", "gso_staff").await;

    let res = client
        .post(srv.url(&format!("/users/{id}/toggle-active")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/supplies")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn department_users_cannot_reach_staff_routes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token();
    let (_, dept) = create_user(&client, &srv, &admin, "dept1", "department_user").await;

    let res = client
        .post(srv.url("/supplies"))
        .bearer_auth(&dept)
        .json(&json!({ "name": "Stapler" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    for path in ["/reports/supplies.csv", "/analytics/users", "/scan/recent", "/users"] {
        let res = client.get(srv.url(path)).bearer_auth(&dept).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
    }

    // Reading the catalogue is allowed.
    let res = client.get(srv.url("/supplies")).bearer_auth(&dept).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn supply_request_lifecycle_moves_stock() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token();
    let (_, dept) = create_user(&client, &srv, &admin, "dept1", "department_user").await;
    let supply = create_supply(&client, &srv, &admin, "Bond Paper", 10).await;

    let res = client
        .post(srv.url("/requests"))
        .bearer_auth(&dept)
        .json(&json!({ "supply_id": supply, "quantity": 3, "purpose": "Exams" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let request: Value = res.json().await.unwrap();
    let request_id = request["id"].as_str().unwrap().to_string();
    assert_eq!(request["status"], "pending");
    assert!(request["code"].as_str().unwrap().starts_with("REQ-"));

    // Releasing before approval is refused.
    let res = client
        .post(srv.url(&format!("/requests/{request_id}/release")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = client
        .post(srv.url(&format!("/requests/{request_id}/approve")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url(&format!("/requests/{request_id}/release")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let released: Value = res.json().await.unwrap();
    assert_eq!(released["request"]["status"], "released");

    assert_eq!(supply_quantity(&client, &srv, &admin, &supply).await, 7);

    // The requester sees their own request; the ledger has the issue.
    let mine: Value = client
        .get(srv.url("/requests"))
        .bearer_auth(&dept)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let ledger: Value = client
        .get(srv.url(&format!("/supplies/{supply}/transactions")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(ledger.as_array().unwrap().len() >= 2);
}

#[tokio::test]
async fn invalid_ids_and_unknown_records() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token();

    let res = client
        .get(srv.url("/supplies/not-a-uuid"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(srv.url(&format!("/supplies/{}", uuid::Uuid::now_v7())))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url("/reports/inventory.csv"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn borrow_return_and_overdue_block() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token();
    let (_, dept) = create_user(&client, &srv, &admin, "dept1", "department_user").await;
    let projector = create_supply(&client, &srv, &admin, "Projector", 2).await;

    let res = client
        .post(srv.url("/borrow/requests"))
        .bearer_auth(&dept)
        .json(&json!({ "supply_id": projector, "quantity": 1, "purpose": "Seminar", "duration_days": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let request: Value = res.json().await.unwrap();
    let request_id = request["id"].as_str().unwrap().to_string();

    // Borrowed ten days ago for one day: already overdue.
    let borrowed = (Utc::now() - ChronoDuration::days(10)).date_naive();
    let res = client
        .post(srv.url(&format!("/borrow/requests/{request_id}/approve")))
        .bearer_auth(&admin)
        .json(&json!({ "action": "create", "borrowed_date": borrowed, "borrow_duration_days": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let released: Value = res.json().await.unwrap();
    let loan_id = released["loan"]["id"].as_str().unwrap().to_string();
    assert_eq!(supply_quantity(&client, &srv, &admin, &projector).await, 1);

    let eligibility: Value = client
        .get(srv.url("/borrow/eligibility"))
        .bearer_auth(&dept)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(eligibility["can_borrow"], false);

    let res = client
        .post(srv.url("/borrow/requests"))
        .bearer_auth(&dept)
        .json(&json!({ "supply_id": projector, "quantity": 1, "purpose": "Again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "borrowing_blocked");

    // The sweep notifies the borrower once.
    let sweep: Value = client
        .post(srv.url("/admin/sweeps/overdue"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sweep["alerts"], 1);
    assert_eq!(sweep["delivered"], 1);

    let notes: Value = client
        .get(srv.url("/notifications?unread_only=true"))
        .bearer_auth(&dept)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notes.as_array().unwrap().len(), 1);

    let loans: Value = client
        .get(srv.url("/loans?status=borrowed"))
        .bearer_auth(&dept)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(loans[0]["due_status"], "overdue");

    let res = client
        .post(srv.url(&format!("/loans/{loan_id}/return")))
        .bearer_auth(&admin)
        .json(&json!({ "location": "Room 101" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let returned: Value = res.json().await.unwrap();
    assert_eq!(returned["outcome"]["returned"]["quantity"], 1);

    // Returning again is reported and does not credit stock twice.
    let again: Value = client
        .post(srv.url(&format!("/loans/{loan_id}/return")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["outcome"], "already_returned");
    assert_eq!(supply_quantity(&client, &srv, &admin, &projector).await, 2);

    let res = client
        .post(srv.url("/borrow/requests"))
        .bearer_auth(&dept)
        .json(&json!({ "supply_id": projector, "quantity": 1, "purpose": "Again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn supplies_report_downloads_as_csv() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token();
    create_supply(&client, &srv, &admin, "Whiteboard Marker", 1).await;

    let res = client
        .get(srv.url("/reports/supplies.csv"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/csv"));
    let body = res.text().await.unwrap();
    assert!(body.starts_with("name,category,quantity"));
    assert!(body.contains("Whiteboard Marker,,1,pieces,2,low_stock"));
}
