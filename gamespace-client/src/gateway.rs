//! The single path every network call takes.
//!
//! [`GatewayClient`] attaches the session credential, unwraps the server's
//! `{success, data}` envelope, and folds every failure into one
//! [`GatewayError`] kind with a message a person can read.

use crate::session::Credential;
use gamespace_core::{
    FieldError, GatewayError, GatewayResult, HttpMethod, HttpRequest, HttpTransport,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of the credential attached to outgoing requests.
pub trait CredentialProvider: Send + Sync {
    fn current_credential(&self) -> Option<Credential>;

    /// The server answered 401 to a request carrying `credential`.
    fn credential_rejected(&self, credential: &Credential);
}

/// Which credential a request carries.
#[derive(Debug, Clone, Copy)]
pub enum Attach<'a> {
    /// Whatever the session holds right now.
    Current,
    None,
    Explicit(&'a Credential),
}

#[derive(Clone)]
pub struct GatewayClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialProvider>,
}

impl GatewayClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    /// Send a request with the current credential and return the unwrapped
    /// body. Empty bodies come back as `Value::Null`.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> GatewayResult<Value> {
        self.request_with(method, path, Vec::new(), body, Attach::Current)
            .await
    }

    pub async fn request_with(
        &self,
        method: HttpMethod,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
        attach: Attach<'_>,
    ) -> GatewayResult<Value> {
        let credential = match attach {
            Attach::Current => self.credentials.current_credential(),
            Attach::None => None,
            Attach::Explicit(credential) => Some(credential.clone()),
        };

        let request = HttpRequest::new(method, path)
            .with_query(query)
            .with_bearer(credential.as_ref().map(|c| c.access.clone()))
            .with_body(body);
        debug!(%method, path, authenticated = credential.is_some(), "sending request");

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%method, path, error = %err, timed_out = err.timed_out, "request failed without a response");
                return Err(GatewayError::network(if err.timed_out {
                    "The request timed out. Check your connection and try again."
                } else {
                    "Could not reach the server. Check your connection and try again."
                }));
            }
        };
        debug!(%method, path, status = response.status, "received response");

        if response.is_success() {
            return parse_success_body(&response.body);
        }

        let error = normalize_failure(response.status, &response.body);
        warn!(%method, path, status = response.status, kind = ?error.kind(), message = error.message(), "request failed");
        if let (GatewayError::Unauthorized { .. }, Some(sent)) = (&error, &credential) {
            self.credentials.credential_rejected(sent);
        }
        Err(error)
    }

    pub async fn get_json<T>(&self, path: &str, query: Vec<(String, String)>) -> GatewayResult<T>
    where
        T: DeserializeOwned,
    {
        let body = self
            .request_with(HttpMethod::Get, path, query, None, Attach::Current)
            .await?;
        decode(body)
    }

    pub async fn get_json_as<T>(&self, path: &str, attach: Attach<'_>) -> GatewayResult<T>
    where
        T: DeserializeOwned,
    {
        let body = self
            .request_with(HttpMethod::Get, path, Vec::new(), None, attach)
            .await?;
        decode(body)
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.post_json_as(path, body, Attach::Current).await
    }

    pub async fn post_json_as<T, B>(&self, path: &str, body: &B, attach: Attach<'_>) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = encode(body)?;
        let response = self
            .request_with(HttpMethod::Post, path, Vec::new(), Some(body), attach)
            .await?;
        decode(response)
    }

    pub async fn patch_json<T, B>(&self, path: &str, body: &B) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = encode(body)?;
        let response = self
            .request_with(HttpMethod::Patch, path, Vec::new(), Some(body), Attach::Current)
            .await?;
        decode(response)
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> GatewayResult<Value> {
    serde_json::to_value(body)
        .map_err(|e| GatewayError::validation(format!("Could not encode request: {}", e)))
}

fn decode<T: DeserializeOwned>(body: Value) -> GatewayResult<T> {
    serde_json::from_value(body).map_err(|e| {
        warn!(error = %e, "response did not match the expected shape");
        GatewayError::server("The server returned an unexpected response.")
    })
}

// ============================================================================
// NORMALIZATION
// ============================================================================

fn parse_success_body(body: &str) -> GatewayResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "success response was not JSON");
        GatewayError::server("The server returned an unreadable response.")
    })?;
    Ok(unwrap_envelope(value))
}

/// `{"success": true, "data": X}` becomes `X`; anything else passes through.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map)
            if map.get("success") == Some(&Value::Bool(true)) && map.contains_key("data") =>
        {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// `{"success": false, "error": X}` becomes `X`; anything else passes through.
fn unwrap_error_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map)
            if map.get("success") == Some(&Value::Bool(false)) && map.contains_key("error") =>
        {
            map.remove("error").unwrap_or(Value::Null)
        }
        other => other,
    }
}

pub(crate) fn normalize_failure(status: u16, body: &str) -> GatewayError {
    let payload = serde_json::from_str::<Value>(body)
        .ok()
        .map(unwrap_error_envelope);
    let (message, fields) = payload
        .as_ref()
        .map(extract_message)
        .unwrap_or((None, Vec::new()));
    let message_or = |fallback: &str| message.clone().unwrap_or_else(|| fallback.to_string());

    match status {
        401 => GatewayError::unauthorized(message_or(
            "Your session has expired. Please log in again.",
        )),
        403 => GatewayError::forbidden(message_or(
            "You do not have permission to perform this action.",
        )),
        404 => GatewayError::not_found(message_or("The requested resource was not found.")),
        400..=499 => GatewayError::Validation {
            message: message_or("The request was invalid."),
            fields,
        },
        500..=599 => {
            GatewayError::server(message_or("The server encountered an error. Please try again later."))
        }
        other => GatewayError::server(format!("Unexpected response status {}.", other)),
    }
}

/// Human-readable message plus per-field errors from an error body.
///
/// `detail` wins; otherwise the first field in body order supplies the
/// message, prefixed with its name unless it is `non_field_errors`.
fn extract_message(value: &Value) -> (Option<String>, Vec<FieldError>) {
    match value {
        Value::Object(map) => {
            let fields: Vec<FieldError> = map
                .iter()
                .filter(|(field, _)| field.as_str() != "detail")
                .filter_map(|(field, value)| {
                    first_message(value).map(|message| FieldError::new(field.clone(), message))
                })
                .collect();

            if let Some(detail) = map.get("detail").and_then(first_message) {
                return (Some(detail), fields);
            }
            let message = fields.first().map(|first| {
                if first.field == "non_field_errors" {
                    first.message.clone()
                } else {
                    format!("{}: {}", first.field, first.message)
                }
            });
            (message, fields)
        }
        other => (first_message(other), Vec::new()),
    }
}

fn first_message(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => items.iter().find_map(first_message),
        Value::Object(map) => map.values().find_map(first_message),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
