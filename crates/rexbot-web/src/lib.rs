//! `rexbot-web` – HTTP transport for RexBot
//!
//! Boots an `axum` server (default port `8000`) that:
//!
//! 1. **Dispatches** registered paths to [`RequestHandler`]s after checking
//!    the caller's [`AccessGroup`][rexbot_types::AccessGroup] against the
//!    path's required group.  Rejected callers get `401` with a digest
//!    challenge for the configured realm.
//!
//! 2. **Records** every authorized request in the
//!    [`ActivityLog`][rexbot_kernel::ActivityLog] before the handler runs, so
//!    the supervision loop can see when the operator was last active.
//!
//! 3. **Serves** static files from an optional document root for every
//!    other path.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rexbot_hal::StaticInfo;
//! use rexbot_kernel::Transport;
//! use rexbot_types::AccessGroup;
//! use rexbot_web::{InfoHandler, WebServer};
//!
//! let mut server = WebServer::new();
//! server.add_handler(
//!     "/version",
//!     Arc::new(InfoHandler::new(Arc::new(StaticInfo::new().with("product", "rexbot")))),
//!     AccessGroup::Anyone,
//! );
//! server.start().expect("web server failed");
//! ```

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::{AnonymousAuthenticator, Authenticator, CredentialsStore};
pub use handlers::{ConfigHandler, InfoHandler, JpegHandler, RequestHandler, WebRequest, WebResponse};
pub use server::{DEFAULT_PORT, DEFAULT_REALM, WebServer};
