//! Request descriptors and buffered responses.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::types::ErrorBody;
use crate::error::BookingClientError;
use crate::Result;

/// Immutable description of a backend call.
///
/// A descriptor can be replayed any number of times; the retry state lives
/// in the pipeline, not on the request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    public: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            public: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Send without a bearer token and never run auth recovery on a 401.
    ///
    /// Used for login, register and the refresh call itself.
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn is_public(&self) -> bool {
        self.public
    }
}

/// A fully read backend response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Deserialize the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Backend `detail` message, if the body carries one.
    pub fn error_detail(&self) -> Option<String> {
        ErrorBody::parse(&self.body).message()
    }

    /// Convert a non-success response into the matching error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(self.into_error())
    }

    /// Error describing this response.
    pub fn into_error(self) -> BookingClientError {
        let detail = self.error_detail();
        if self.is_unauthorized() {
            BookingClientError::Unauthorized { detail }
        } else {
            BookingClientError::Api {
                status: self.status.as_u16(),
                detail,
            }
        }
    }
}
