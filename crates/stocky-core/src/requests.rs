// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Authentication request payloads.
//!
//! Clients send these as loose JSON objects. [`AuthRequest`] holds the raw
//! object and the typed requests are built from it with `TryFrom`, so a
//! missing or mistyped field is an error rather than a panic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field access errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The payload is not valid JSON.
    #[error("malformed request body: {0}")]
    Malformed(String),

    /// The payload was not a JSON object.
    #[error("request body must be a JSON object")]
    NotAnObject,

    /// A required key is absent.
    #[error("couldn't find key {0}")]
    MissingField(String),

    /// A key is present with the wrong JSON type.
    #[error("key {key}'s value is not a {expected}")]
    WrongType {
        /// The key.
        key: String,
        /// Expected JSON type.
        expected: &'static str,
    },
}

/// Untyped request object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthRequest(Map<String, Value>);

impl AuthRequest {
    /// Wrap a JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a request body.
    pub fn from_json(body: &str) -> Result<Self, RequestError> {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(fields)) => Ok(Self(fields)),
            Ok(_) => Err(RequestError::NotAnObject),
            Err(err) => Err(RequestError::Malformed(err.to_string())),
        }
    }

    /// String value of `key`.
    pub fn get_str(&self, key: &str) -> Result<&str, RequestError> {
        match self.0.get(key) {
            None => Err(RequestError::MissingField(key.to_string())),
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(RequestError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    /// String value of `key`, or `None` when absent or null.
    pub fn get_opt_str(&self, key: &str) -> Result<Option<&str>, RequestError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get_str(key).map(Some),
        }
    }
}

/// Credentials for a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
    pub source: String,
}

impl TryFrom<&AuthRequest> for Login {
    type Error = RequestError;

    fn try_from(request: &AuthRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            username: request.get_str("username")?.to_string(),
            password: request.get_str("password")?.to_string(),
            source: request.get_str("source")?.to_string(),
        })
    }
}

/// Password change. `username` may be omitted when implied by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePassword {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(rename = "password")]
    pub old_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

impl TryFrom<&AuthRequest> for ChangePassword {
    type Error = RequestError;

    fn try_from(request: &AuthRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            username: request.get_opt_str("username")?.map(str::to_string),
            old_password: request.get_str("password")?.to_string(),
            new_password: request.get_str("newPassword")?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_from_request() {
        let request = AuthRequest::from_json(
            r#"{"username": "alice", "password": "pw", "source": "web", "extra": 1}"#,
        )
        .unwrap();

        let login = Login::try_from(&request).unwrap();
        assert_eq!(
            login,
            Login {
                username: "alice".to_string(),
                password: "pw".to_string(),
                source: "web".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_field() {
        let request = AuthRequest::from_json(r#"{"username": "alice"}"#).unwrap();

        let err = Login::try_from(&request).unwrap_err();
        assert_eq!(err, RequestError::MissingField("password".to_string()));
        assert_eq!(err.to_string(), "couldn't find key password");
    }

    #[test]
    fn test_wrong_type() {
        let request =
            AuthRequest::from_json(r#"{"username": 42, "password": "pw", "source": "web"}"#)
                .unwrap();

        let err = Login::try_from(&request).unwrap_err();
        assert_eq!(
            err,
            RequestError::WrongType {
                key: "username".to_string(),
                expected: "string",
            }
        );
        assert_eq!(err.to_string(), "key username's value is not a string");
    }

    #[test]
    fn test_change_password_optional_username() {
        let request =
            AuthRequest::from_json(r#"{"password": "old", "newPassword": "new", "username": null}"#)
                .unwrap();

        let change = ChangePassword::try_from(&request).unwrap();
        assert_eq!(change.username, None);
        assert_eq!(change.old_password, "old");
        assert_eq!(change.new_password, "new");

        let serialized = serde_json::to_value(&change).unwrap();
        assert_eq!(
            serialized,
            serde_json::json!({"password": "old", "newPassword": "new"})
        );
    }

    #[test]
    fn test_non_object_body() {
        assert_eq!(
            AuthRequest::from_json("[1, 2]").unwrap_err(),
            RequestError::NotAnObject
        );
        assert_eq!(
            AuthRequest::from_json("\"text\"").unwrap_err(),
            RequestError::NotAnObject
        );
    }

    #[test]
    fn test_malformed_body() {
        let err = AuthRequest::from_json(r#"{"username": "alice""#).unwrap_err();
        assert!(matches!(err, RequestError::Malformed(ref msg) if msg.contains("EOF")), "{err:?}");
        assert!(err.to_string().starts_with("malformed request body: "));

        let err = AuthRequest::from_json("not json").unwrap_err();
        assert!(matches!(err, RequestError::Malformed(_)));
    }
}
