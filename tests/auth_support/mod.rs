#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zcrm_auth::auth::{
    AuthError, Credentials, ManagerConfig, TokenManager, TokenPair, TokenStore,
};

pub const CLIENT_ID: &str = "1000.TESTCLIENT";
pub const TOKEN_PATH: &str = "/oauth/v2/token";

#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<String, TokenPair>>,
    saves: AtomicUsize,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, name: &str, token: TokenPair) {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .insert(name.to_string(), token);
    }

    pub fn get(&self, name: &str) -> Option<TokenPair> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self, name: &str) -> Result<Option<TokenPair>, AuthError> {
        Ok(self.get(name))
    }

    fn save(&self, name: &str, token: &TokenPair) -> Result<(), AuthError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.seed(name, token.clone());
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn remove(&self, name: &str) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .remove(name);
        Ok(())
    }
}

pub fn credentials() -> Credentials {
    Credentials::builder()
        .client_id(CLIENT_ID)
        .client_secret("test-secret")
        .redirect_uri("https://www.example.com")
        .auth_code("1000.authcode")
        .build()
}

pub fn manager_config(server: &MockServer, store: Option<Arc<dyn TokenStore>>) -> ManagerConfig {
    ManagerConfig::builder()
        .token_url(format!("{}{TOKEN_PATH}", server.uri()))
        .maybe_store(store)
        .build()
}

pub fn manager(server: &MockServer, lifetime: Option<u64>) -> TokenManager {
    TokenManager::with_config(credentials(), lifetime, manager_config(server, None))
}

pub fn issued_body(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "api_domain": "https://www.zohoapis.com",
        "token_type": "Bearer",
        "expires_in": 3600
    })
}

pub fn refreshed_body(access: &str) -> Value {
    json!({
        "access_token": access,
        "api_domain": "https://www.zohoapis.com",
        "token_type": "Bearer",
        "expires_in": 3600
    })
}

pub async fn mount_exchange(server: &MockServer, body: Value, expected: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(query_param("grant_type", "authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected)
        .mount(server)
        .await;
}

pub async fn mount_refresh(server: &MockServer, body: Value, expected: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected)
        .mount(server)
        .await;
}

pub fn records_body() -> Value {
    json!({
        "data": [{
            "id": "3477061000000419001",
            "Owner": {"name": "Patricia Boyle", "id": "3477061000000173021"},
            "Subject": "PO-100",
            "$approved": true,
            "Product_Details": [{
                "product": {"Product_Code": "SKU-1", "name": "Widget", "id": "3477061000000123001"},
                "quantity": 2.0,
                "list_price": 10.0,
                "net_total": 20.0
            }]
        }],
        "info": {"per_page": 200, "count": 1, "page": 1, "more_records": false}
    })
}
