//! Application state shared across handlers.

use std::sync::Arc;

use crate::csrf::CsrfGuard;
use crate::stores::Stores;
use crate::workflow::ConfirmationFlow;

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub csrf: CsrfGuard,
    pub flow: Arc<ConfirmationFlow>,
}
