//! [`RequestHandler`] – the unit of work behind one registered path.
//!
//! Handlers are synchronous: every device call they make is a short,
//! mutex-guarded update, so running them inline on the request task is
//! cheaper than hopping to a blocking pool.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use rexbot_hal::{Configurable, FrameSink, InformationSource};
use rexbot_types::{BotError, PropertyMap};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

/// What a handler sees of an authorized request.
#[derive(Debug, Clone)]
pub struct WebRequest {
    pub method: Method,
    pub body: Bytes,
}

impl WebRequest {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            body: Bytes::new(),
        }
    }

    pub fn post(body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            body: body.into(),
        }
    }
}

/// A fully formed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl WebResponse {
    pub fn json(status: StatusCode, value: &Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: value.to_string().into_bytes(),
        }
    }

    pub fn properties(map: &PropertyMap) -> Self {
        Self::json(StatusCode::OK, &json!(map))
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, &json!({ "status": "error", "message": message }))
    }

    pub fn method_not_allowed() -> Self {
        Self::error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    }
}

impl IntoResponse for WebResponse {
    fn into_response(self) -> Response {
        (self.status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

/// Serves one registered path.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &WebRequest) -> WebResponse;
}

// ────────────────────────────────────────────────────────────────────────────
// Information
// ────────────────────────────────────────────────────────────────────────────

/// Read-only JSON view of an [`InformationSource`].
pub struct InfoHandler {
    source: Arc<dyn InformationSource>,
}

impl InfoHandler {
    pub fn new(source: Arc<dyn InformationSource>) -> Self {
        Self { source }
    }
}

impl RequestHandler for InfoHandler {
    fn handle(&self, request: &WebRequest) -> WebResponse {
        if request.method != Method::GET {
            return WebResponse::method_not_allowed();
        }
        WebResponse::properties(&self.source.information())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Reads (`GET`) and updates (`POST`) a [`Configurable`] object.
///
/// A `POST` body is a JSON object whose values are strings or numbers:
///
/// ```json
/// { "left": 40, "right": "40" }
/// ```
///
/// Properties are applied in key order; the first rejected one ends the
/// request with `400 Bad Request`.
pub struct ConfigHandler {
    target: Arc<dyn Configurable>,
}

impl ConfigHandler {
    pub fn new(target: Arc<dyn Configurable>) -> Self {
        Self { target }
    }

    fn update(&self, body: &[u8]) -> WebResponse {
        let props = match parse_properties(body) {
            Ok(props) => props,
            Err(message) => return WebResponse::error(StatusCode::BAD_REQUEST, &message),
        };
        match self.target.set_properties(&props) {
            Ok(()) => {
                debug!(count = props.len(), "configuration updated");
                WebResponse::json(StatusCode::OK, &json!({ "status": "OK" }))
            }
            Err(e @ (BotError::UnknownProperty(_) | BotError::InvalidProperty { .. })) => {
                WebResponse::error(StatusCode::BAD_REQUEST, &e.to_string())
            }
            Err(e) => {
                warn!(error = %e, "configuration update failed");
                WebResponse::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }
}

impl RequestHandler for ConfigHandler {
    fn handle(&self, request: &WebRequest) -> WebResponse {
        match request.method {
            Method::GET => WebResponse::properties(&self.target.properties()),
            Method::POST => self.update(&request.body),
            _ => WebResponse::method_not_allowed(),
        }
    }
}

fn parse_properties(body: &[u8]) -> Result<PropertyMap, String> {
    let object: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| format!("expected a JSON object: {e}"))?;
    object
        .into_iter()
        .map(|(name, value)| match value {
            Value::String(s) => Ok((name, s)),
            Value::Number(n) => Ok((name, n.to_string())),
            Value::Bool(b) => Ok((name, b.to_string())),
            other => Err(format!("invalid value for '{name}': {other}")),
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Snapshot
// ────────────────────────────────────────────────────────────────────────────

/// Returns the most recent camera frame as-is.
pub struct JpegHandler {
    frames: Arc<FrameSink>,
}

impl JpegHandler {
    pub fn new(frames: Arc<FrameSink>) -> Self {
        Self { frames }
    }
}

impl RequestHandler for JpegHandler {
    fn handle(&self, request: &WebRequest) -> WebResponse {
        if request.method != Method::GET {
            return WebResponse::method_not_allowed();
        }
        match self.frames.latest() {
            Some(frame) => WebResponse {
                status: StatusCode::OK,
                content_type: frame.format.content_type(),
                body: frame.data.clone(),
            },
            None => WebResponse::error(StatusCode::SERVICE_UNAVAILABLE, "no frame captured yet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rexbot_hal::sim::{SimCamera, SimMotorDriver};
    use rexbot_hal::{CaptureFormat, ListenerChain, MotorsController, StaticInfo, VideoSource};
    use std::time::{Duration, Instant};

    fn body_json(response: &WebResponse) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    fn motors() -> Arc<MotorsController> {
        Arc::new(MotorsController::new(Box::new(SimMotorDriver::new())))
    }

    #[test]
    fn info_handler_serves_map() {
        let handler = InfoHandler::new(Arc::new(StaticInfo::new().with("product", "rexbot")));
        let response = handler.handle(&WebRequest::get());
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type, "application/json");
        assert_eq!(body_json(&response)["product"], "rexbot");

        let response = handler.handle(&WebRequest::post("{}"));
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn config_post_accepts_numbers_and_strings() {
        let motors = motors();
        let handler = ConfigHandler::new(motors.clone());
        let response = handler.handle(&WebRequest::post(r#"{"left": 30, "right": "-30"}"#));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(motors.power(), (30, -30));

        let response = handler.handle(&WebRequest::get());
        assert_eq!(body_json(&response)["left"], "30");
    }

    #[test]
    fn config_post_rejects_unknown_and_invalid() {
        let handler = ConfigHandler::new(motors());
        let response = handler.handle(&WebRequest::post(r#"{"turbo": 1}"#));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response)["status"], "error");

        let response = handler.handle(&WebRequest::post(r#"{"left": 250}"#));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let response = handler.handle(&WebRequest::post(r#"{"left": [1]}"#));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let response = handler.handle(&WebRequest::post("not json"));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn jpeg_is_unavailable_until_first_frame() {
        let frames = FrameSink::new();
        let handler = JpegHandler::new(Arc::clone(&frames));
        assert_eq!(
            handler.handle(&WebRequest::get()).status,
            StatusCode::SERVICE_UNAVAILABLE
        );

        let camera = SimCamera::new(CaptureFormat {
            width: 2,
            height: 2,
            frame_rate: 30,
            jpeg_quality: 10,
        });
        camera.set_listener(ListenerChain::new().with_frames(Arc::clone(&frames)));
        camera.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while frames.latest().is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        camera.signal_stop();
        camera.wait_for_stop();

        let response = handler.handle(&WebRequest::get());
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.len(), 4);
    }
}
