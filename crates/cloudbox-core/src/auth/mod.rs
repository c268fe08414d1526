//! Authentication
//!
//! This module provides:
//! - Browser and headless OAuth login against the allow-listed providers
//! - Code exchange and token refresh through the Cloudbox backend
//! - A token manager that refreshes access tokens shortly before expiry

pub mod callback;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod refresh;
pub mod types;

pub use callback::{CallbackListener, CallbackParams};
pub use error::{FlowFailure, OAuthError};
pub use manager::TokenManager;
pub use oauth::{
    BrowserOpener, DEFAULT_CALLBACK_PORT, DEFAULT_LOGIN_TIMEOUT, HeadlessLogin, LoginState,
    OAuthClient, OAuthConfig, SystemBrowser, generate_state,
};
pub use refresh::{BackendAuthClient, CodeExchanger, OAuthRefresher};
pub use types::{OAuthProvider, REFRESH_SKEW_SECS, TokenBundle, mask_secret};
