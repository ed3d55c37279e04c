//! HTTP surface of the engine.
//!
//! Platform identity arrives as an `x-user-id` header placed by the
//! upstream gateway. Wallet-screen endpoints additionally require a Bearer
//! token from `POST /wallet/login`; sending money authenticates with the
//! PIN itself.

pub mod handlers;

mod error;
pub use error::{ApiError, ApiResult};

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use rand::Rng;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Engine;
use crate::collab::{CredentialVerifier, ProviderDirectory};
use crate::model::UserId;

/// Wallet login sessions, issued on PIN verification.
#[derive(Debug, Default)]
pub struct SessionStore {
    tokens: HashMap<String, UserId>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an opaque token for `user`.
    pub fn issue(&mut self, user: UserId) -> String {
        let bytes: [u8; 32] = rand::thread_rng().r#gen();
        let token = hex::encode(bytes);
        self.tokens.insert(token.clone(), user);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).copied()
    }
}

/// Application state shared across handlers.
///
/// The engine runs every operation to completion under the mutex, which is
/// what serializes concurrent settlements against one payer and concurrent
/// request creation against one booking.
pub struct AppState {
    pub engine: Mutex<Engine>,
    pub sessions: Mutex<SessionStore>,
    pub credentials: Box<dyn CredentialVerifier>,
    pub directory: Box<dyn ProviderDirectory>,
}

impl AppState {
    pub fn new(
        credentials: Box<dyn CredentialVerifier>,
        directory: Box<dyn ProviderDirectory>,
    ) -> Self {
        Self {
            engine: Mutex::new(Engine::new()),
            sessions: Mutex::new(SessionStore::new()),
            credentials,
            directory,
        }
    }
}

/// Build the full route table.
pub fn router(state: Arc<AppState>) -> Router {
    // Marking a money request paid is an internal effect of settlement and
    // deliberately has no route.
    Router::new()
        .route("/health", get(handlers::health))
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/:id", get(handlers::get_booking))
        .route("/bookings/:id/status", put(handlers::update_booking_status))
        .route("/wallet/register", post(handlers::register_wallet))
        .route("/wallet/login", post(handlers::wallet_login))
        .route("/wallet", get(handlers::wallet_summary))
        .route("/wallet/discount", put(handlers::set_discount))
        .route("/wallet/deposit", post(handlers::deposit))
        .route("/wallet/reset-pin", post(handlers::reset_pin))
        .route(
            "/money-requests",
            post(handlers::create_money_request).get(handlers::list_money_requests),
        )
        .route("/transactions/send-money", post(handlers::send_money))
        .route("/transactions/history", get(handlers::history))
        .route("/transactions/statement.csv", get(handlers::statement_csv))
        .route("/transactions/:id/receipt", get(handlers::receipt))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
