#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use authgate::auth::BcryptHasher;
use authgate::clock::MockClock;
use authgate::configuration::{
    ApplicationSettings, BucketSettings, DatabaseSettings, JwtSettings, PasswordSettings,
    RateLimitSettings, Settings, StorageBackend,
};
use authgate::startup::{run, AppState};
use authgate::store::InMemoryCredentialStore;
use serde_json::{json, Value};

pub const PASSWORD: &str = "Password123!";

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryCredentialStore>,
    pub clock: Arc<MockClock>,
    pub client: reqwest::Client,
}

pub fn generous_limits() -> RateLimitSettings {
    let wide = BucketSettings { requests: 100, period_secs: 60 };
    RateLimitSettings {
        login: wide,
        register: wide,
        refresh: wide,
    }
}

fn settings(rate_limit: RateLimitSettings) -> Settings {
    Settings {
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            storage: StorageBackend::Memory,
        },
        database: DatabaseSettings::default(),
        jwt: JwtSettings {
            access_secret: "integration-access-secret-at-least-32-chars".to_string(),
            refresh_secret: "integration-refresh-secret-at-least-32-chars".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604800,
            issuer: "authgate-test".to_string(),
            allow_development_secrets: false,
        },
        rate_limit,
        // Minimum bcrypt cost keeps the tests fast
        password: PasswordSettings { bcrypt_cost: 4 },
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with_limits(generous_limits()).await
}

pub async fn spawn_app_with_limits(rate_limit: RateLimitSettings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let configuration = settings(rate_limit);
    let store = Arc::new(InMemoryCredentialStore::new());
    let clock = Arc::new(MockClock::starting_now());
    let hasher = Arc::new(BcryptHasher::new(configuration.password.bcrypt_cost));

    let state = AppState::build(&configuration, store.clone(), hasher, clock.clone())
        .expect("Failed to build application state");
    let server = run(listener, state).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        clock,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn register(&self, username: &str, email: &str) -> reqwest::Response {
        self.post_json(
            "/auth/register",
            &json!({
                "username": username,
                "password": PASSWORD,
                "email": email,
                "phone": "+12345678901"
            }),
        )
        .await
    }

    pub async fn login(&self, principal: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/auth/login",
            &json!({ "principal": principal, "password": password }),
        )
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/refresh", &json!({ "refreshToken": refresh_token }))
            .await
    }

    pub async fn validate(&self, authorization: Option<&str>) -> bool {
        let mut request = self.client.post(&format!("{}/auth/validate", &self.address));
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        let response = request.send().await.expect("Failed to execute request.");
        assert_eq!(200, response.status().as_u16());
        response.json::<bool>().await.expect("Failed to parse response")
    }
}

/// Register and return the parsed token response
pub async fn register_user(app: &TestApp, username: &str, email: &str) -> Value {
    let response = app.register(username, email).await;
    assert_eq!(200, response.status().as_u16());
    response.json().await.expect("Failed to parse response")
}
