//! End-to-end tests against a running server on 127.0.0.1:3001 with Postgres
//! and Redis behind it. Ignored by default; run with `cargo test -- --ignored`
//! once the stack is up.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use civicsync::crypto::{kdf, vault};
use civicsync::models::document::UserDataDocument;

// Shared test context
struct TestContext {
    client: reqwest::Client,
    base_url: String,
}

impl TestContext {
    fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .unwrap(),
            base_url: "http://127.0.0.1:3001".to_string(),
        }
    }

    fn get_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/personalization{}", self.base_url, path)
    }
}

#[tokio::test]
#[ignore]
async fn full_register_sync_recover_delete_flow() {
    let context = TestContext::new();
    let username = format!("civicfan_{}", TestContext::get_timestamp());
    let password = "SecurePass123!@#";

    let salt = kdf::generate_salt();
    let recovery_key = kdf::generate_recovery_key();
    let mut document = UserDataDocument::empty();
    document.address.zip = "62704".to_string();
    let (encrypted_data, iv) = vault::seal(&document, password, &salt).unwrap();

    // Step 1: register with the sealed document.
    let reg_response = context
        .client
        .post(context.url("/register"))
        .json(&json!({
            "username": username,
            "encrypted_data": encrypted_data,
            "iv": iv,
            "encryption_salt": salt,
            "recovery_hash": kdf::hash_password(&recovery_key),
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(reg_response.status().as_u16(), 201, "Registration failed");
    let reg_body: Value = reg_response.json().await.unwrap();
    assert_eq!(reg_body["success"], true);
    let last_sync = reg_body["last_sync"].as_str().unwrap().to_string();

    // Step 2: sync an edit; the server should accept it.
    document.address.city = "Springfield".to_string();
    let (encrypted_data, iv) = vault::seal(&document, password, &salt).unwrap();

    let sync_response = context
        .client
        .put(context.url("/sync"))
        .json(&json!({
            "username": username,
            "encrypted_data": encrypted_data,
            "iv": iv,
            "last_sync": last_sync,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(sync_response.status().as_u16(), 200);
    let sync_body: Value = sync_response.json().await.unwrap();
    assert_eq!(sync_body["server_data_newer"], false);

    // Step 3: replaying the stale token must yield the server's blob back.
    let stale_response = context
        .client
        .put(context.url("/sync"))
        .json(&json!({
            "username": username,
            "encrypted_data": encrypted_data,
            "iv": iv,
            "last_sync": last_sync,
        }))
        .send()
        .await
        .unwrap();

    let stale_body: Value = stale_response.json().await.unwrap();
    assert_eq!(stale_body["server_data_newer"], true);
    let server_blob = stale_body["encrypted_data"].as_str().unwrap();
    let server_iv = stale_body["iv"].as_str().unwrap();
    let adopted = vault::open(server_blob, server_iv, password, &salt).unwrap();
    assert_eq!(adopted.address.city, "Springfield");

    // Step 4: session recovery rides on the cookie set at registration.
    let session_response = context
        .client
        .get(context.url("/session"))
        .send()
        .await
        .unwrap();

    assert_eq!(session_response.status().as_u16(), 200);
    let session_body: Value = session_response.json().await.unwrap();
    assert_eq!(session_body["username"], username.as_str());
    let recovered = vault::open(
        session_body["encrypted_data"].as_str().unwrap(),
        session_body["iv"].as_str().unwrap(),
        password,
        session_body["encryption_salt"].as_str().unwrap(),
    )
    .unwrap();
    assert_eq!(recovered.address.city, "Springfield");

    // Step 5: delete the account; login must then fail as 404.
    let delete_response = context
        .client
        .delete(context.url("/account"))
        .json(&json!({ "username": username }))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_response.status().as_u16(), 200);

    let login_response = context
        .client
        .post(context.url("/login"))
        .json(&json!({ "username": username }))
        .send()
        .await
        .unwrap();
    assert_eq!(login_response.status().as_u16(), 404);
}

#[tokio::test]
#[ignore]
async fn rejected_usernames_get_400() {
    let context = TestContext::new();
    let salt = kdf::generate_salt();
    let (encrypted_data, iv) = vault::seal(&UserDataDocument::empty(), "pw-pw-pw-pw", &salt).unwrap();

    for bad in ["admin", "test123", "aaaaaaaaa", "123456"] {
        let response = context
            .client
            .post(context.url("/register"))
            .json(&json!({
                "username": bad,
                "encrypted_data": encrypted_data,
                "iv": iv,
                "encryption_salt": salt,
                "recovery_hash": kdf::hash_password("whatever"),
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 400, "{bad} was not rejected");
    }
}
