use std::sync::Arc;

use axum::http::HeaderName;
use cisync_application::{ReconciliationService, SignatureVerifier};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub reconciliation_service: ReconciliationService,
    pub signature_verifier: Arc<dyn SignatureVerifier>,
    pub signature_header: HeaderName,
    pub internal_shared_secret: String,
}
