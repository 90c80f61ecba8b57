//! [`WebServer`] – HTTP transport for the supervisor.
//!
//! Listens on `0.0.0.0:8000` (configurable via [`WebServer::with_port`]).
//!
//! * Registered paths → access check, activity touch, then the path's
//!   [`RequestHandler`].
//! * Anything else → static files from the document root, if one is set.
//!
//! The server owns its own multi-threaded `tokio` runtime so the supervision
//! loop can stay a plain blocking thread.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Bytes;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use rexbot_kernel::{ANY_ENDPOINT, ActivityLog, Transport};
use rexbot_types::{AccessGroup, BotError};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::auth::{AnonymousAuthenticator, Authenticator};
use crate::handlers::{RequestHandler, WebRequest};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default authentication realm.
pub const DEFAULT_REALM: &str = "rexbot";

/// How long [`Transport::stop`] waits for in-flight requests.
const STOP_GRACE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Routing state
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Route {
    path: String,
    handler: Arc<dyn RequestHandler>,
    group: AccessGroup,
}

struct Gate {
    realm: String,
    authenticator: Arc<dyn Authenticator>,
    activity: Arc<ActivityLog>,
}

impl Gate {
    /// `None` when the caller may proceed, otherwise the rejection.
    fn check(&self, headers: &HeaderMap, required: AccessGroup) -> Option<Response> {
        let caller = self.authenticator.classify(headers);
        if caller.satisfies(required) {
            return None;
        }
        debug!(%caller, %required, "request rejected");
        let challenge = format!("Digest realm=\"{}\"", self.realm);
        let mut response = StatusCode::UNAUTHORIZED.into_response();
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        Some(response)
    }
}

struct Running {
    runtime: Runtime,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

// ---------------------------------------------------------------------------
// WebServer
// ---------------------------------------------------------------------------

/// HTTP transport with per-path access groups and an activity log.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rexbot_hal::StaticInfo;
/// use rexbot_types::AccessGroup;
/// use rexbot_web::{InfoHandler, WebServer};
///
/// let mut server = WebServer::new().with_port(0).with_realm("garage");
/// server.add_handler(
///     "/version",
///     Arc::new(InfoHandler::new(Arc::new(StaticInfo::new().with("version", "1.0.0")))),
///     AccessGroup::Anyone,
/// );
/// assert_eq!(server.realm(), "garage");
/// assert_eq!(server.routes(), vec!["/version"]);
/// ```
pub struct WebServer {
    port: u16,
    realm: String,
    document_root: Option<PathBuf>,
    document_group: AccessGroup,
    authenticator: Arc<dyn Authenticator>,
    activity: Arc<ActivityLog>,
    routes: Vec<Route>,
    running: Option<Running>,
}

impl Default for WebServer {
    fn default() -> Self {
        Self::new()
    }
}

impl WebServer {
    /// Create a server on [`DEFAULT_PORT`] with no routes.
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            realm: DEFAULT_REALM.to_string(),
            document_root: None,
            document_group: AccessGroup::Anyone,
            authenticator: Arc::new(AnonymousAuthenticator),
            activity: Arc::new(ActivityLog::new()),
            routes: Vec::new(),
            running: None,
        }
    }

    /// Override the listening port (builder-style).  `0` picks a free port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Realm announced in `WWW-Authenticate` challenges.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Serve static files from `root` for unregistered paths, to callers in
    /// `group` or above.
    pub fn with_document_root(mut self, root: impl Into<PathBuf>, group: AccessGroup) -> Self {
        self.document_root = Some(root.into());
        self.document_group = group;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Use a shared activity log instead of a private one.
    pub fn with_activity_log(mut self, activity: Arc<ActivityLog>) -> Self {
        for route in &self.routes {
            activity.track(&route.path);
        }
        self.activity = activity;
        self
    }

    /// Register `handler` for `path`, reachable by callers in `group` or
    /// above.  Registering the same path twice replaces the earlier handler.
    pub fn add_handler(
        &mut self,
        path: &str,
        handler: Arc<dyn RequestHandler>,
        group: AccessGroup,
    ) -> &mut Self {
        self.activity.track(path);
        self.routes.retain(|route| route.path != path);
        self.routes.push(Route {
            path: path.to_string(),
            handler,
            group,
        });
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Registered paths in registration order.
    pub fn routes(&self) -> Vec<&str> {
        self.routes.iter().map(|route| route.path.as_str()).collect()
    }

    pub fn activity_log(&self) -> Arc<ActivityLog> {
        Arc::clone(&self.activity)
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Build the request router.  Exposed so the routing rules can be
    /// exercised without binding a socket.
    pub fn router(&self) -> Router {
        let gate = Arc::new(Gate {
            realm: self.realm.clone(),
            authenticator: Arc::clone(&self.authenticator),
            activity: Arc::clone(&self.activity),
        });

        let mut router = Router::new();
        for route in &self.routes {
            let gate = Arc::clone(&gate);
            let route = route.clone();
            let path = route.path.clone();
            router = router.route(
                &path,
                any(move |method: Method, headers: HeaderMap, body: Bytes| {
                    let gate = Arc::clone(&gate);
                    let route = route.clone();
                    async move { dispatch(&gate, &route, method, &headers, body) }
                }),
            );
        }

        let root = self.document_root.clone();
        let group = self.document_group;
        router.fallback(move |request: Request| {
            let gate = Arc::clone(&gate);
            let root = root.clone();
            async move { serve_static(&gate, root, group, request).await }
        })
    }
}

fn dispatch(
    gate: &Gate,
    route: &Route,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(rejection) = gate.check(headers, route.group) {
        return rejection;
    }
    gate.activity.touch(&route.path);
    route
        .handler
        .handle(&WebRequest { method, body })
        .into_response()
}

async fn serve_static(
    gate: &Gate,
    root: Option<PathBuf>,
    group: AccessGroup,
    request: Request,
) -> Response {
    let Some(root) = root else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(rejection) = gate.check(request.headers(), group) {
        return rejection;
    }
    gate.activity.touch(ANY_ENDPOINT);
    match ServeDir::new(root).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

impl Transport for WebServer {
    fn endpoint(&self) -> String {
        match self.local_addr() {
            Some(addr) => format!("http://{addr}"),
            None => format!("http://0.0.0.0:{}", self.port),
        }
    }

    fn start(&mut self) -> Result<(), BotError> {
        if self.running.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("rexbot-web")
            .build()
            .map_err(|e| BotError::Transport(format!("cannot create runtime: {e}")))?;

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = runtime
            .block_on(TcpListener::bind(addr))
            .map_err(|e| BotError::Transport(format!("bind error on {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| BotError::Transport(format!("cannot read bound address: {e}")))?;

        let (shutdown, stop_rx) = oneshot::channel::<()>();
        let app = self.router();
        let task = runtime.spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = stop_rx.await;
            });
            if let Err(e) = server.await {
                error!(error = %e, "web server terminated");
            }
        });

        info!(%local_addr, routes = self.routes.len(), "web server listening");
        self.running = Some(Running {
            runtime,
            shutdown,
            task,
            local_addr,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let Running {
            runtime,
            shutdown,
            task,
            ..
        } = running;
        let _ = shutdown.send(());
        if runtime
            .block_on(tokio::time::timeout(STOP_GRACE, task))
            .is_err()
        {
            warn!(grace = ?STOP_GRACE, "web server did not drain in time");
        }
        runtime.shutdown_timeout(Duration::from_secs(1));
        info!("web server stopped");
    }

    fn last_access(&self, endpoint: Option<&str>) -> Instant {
        self.activity.last_access(endpoint.unwrap_or(ANY_ENDPOINT))
    }
}

impl Drop for WebServer {
    fn drop(&mut self) {
        self.stop();
    }
}
