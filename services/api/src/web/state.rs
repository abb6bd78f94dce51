//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request identity.

use crate::config::Config;
use family_photos_core::domain::User;
use family_photos_core::ports::{DatabaseService, MagicLinkMailer, MediaStore};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub media: Arc<dyn MediaStore>,
    pub mailer: Arc<dyn MagicLinkMailer>,
}

//=========================================================================================
// CurrentUser (Specific to One Authenticated Request)
//=========================================================================================

/// The authenticated user, inserted into request extensions by `require_auth`.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);
