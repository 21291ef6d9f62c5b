//! REST API for the course generator
//!
//! Course browsing, AI generation, accounts and lesson media endpoints.

use anyhow::Result;
use tracing::info;

pub mod error;
pub mod handlers;
pub mod models;
pub mod server;

pub use error::ApiError;
pub use server::{build_app, build_router, AppState};

/// API server for handling REST requests
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Run the API server until it fails
    pub async fn run(self) -> Result<()> {
        info!(
            "🚀 Starting API server on {}:{}",
            self.state.config.server.host, self.state.config.server.port
        );

        server::start_http_server(self.state).await
    }
}
