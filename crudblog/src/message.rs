use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{BlogError, Result};

/// GraphQL request body sent to the API endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    /// Operation document
    pub query: String,
    /// Operation variables as JSON
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub variables: serde_json::Value,
    /// Name of the operation inside the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl GraphQLRequest {
    /// Create a request for a named operation
    pub fn new(
        query: impl Into<String>,
        operation_name: impl Into<String>,
        variables: impl Serialize,
    ) -> Result<Self> {
        Ok(Self {
            query: query.into(),
            variables: serde_json::to_value(variables)?,
            operation_name: Some(operation_name.into()),
        })
    }

    /// Operation name, or an empty string for anonymous documents
    pub fn name(&self) -> &str {
        self.operation_name.as_deref().unwrap_or_default()
    }

    /// Serialize request to bytes for transmission
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize variables to a specific type
    pub fn deserialize_variables<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.variables.clone())?)
    }
}

/// A single entry of a GraphQL `errors` array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,
    /// AppSync error classification, e.g. `Unauthorized`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ErrorLocation>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

impl GraphQLError {
    pub fn new(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
            error_type: None,
            path: Vec::new(),
            locations: Vec::new(),
        }
    }

    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn with_path(mut self, segment: impl Into<String>) -> Self {
        self.path.push(serde_json::Value::String(segment.into()));
        self
    }

    pub fn is_unauthorized(&self) -> bool {
        self.error_type.as_deref() == Some("Unauthorized")
            || self.message.starts_with("Not Authorized")
    }
}

/// GraphQL response envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl GraphQLResponse {
    /// Create a successful response
    pub fn success(data: impl Serialize) -> Result<Self> {
        Ok(Self {
            data: Some(serde_json::to_value(data)?),
            errors: Vec::new(),
        })
    }

    /// Create an error response
    pub fn error(error: GraphQLError) -> Self {
        Self {
            data: None,
            errors: vec![error],
        }
    }

    /// Deserialize response from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Check if response carries no errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Extract the value under `data.<field>`.
    ///
    /// Any entry in `errors` fails the call, even when partial data came back.
    pub fn field<T: DeserializeOwned>(self, field: &str) -> Result<T> {
        if !self.errors.is_empty() {
            return Err(BlogError::Api {
                status: None,
                errors: self.errors,
            });
        }

        let value = self
            .data
            .and_then(|mut data| data.get_mut(field).map(serde_json::Value::take))
            .filter(|value| !value.is_null())
            .ok_or_else(|| BlogError::api_error(format!("Response has no data for '{}'", field)))?;

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let request = GraphQLRequest::new("query Q { q }", "Q", json!({ "limit": 5 })).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&request.to_bytes().unwrap()).unwrap();

        assert_eq!(body["operationName"], "Q");
        assert_eq!(body["variables"]["limit"], 5);
        assert_eq!(body["query"], "query Q { q }");
    }

    #[test]
    fn test_request_omits_null_variables() {
        let request = GraphQLRequest::new("query Q { q }", "Q", ()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&request.to_bytes().unwrap()).unwrap();
        assert!(body.get("variables").is_none());
    }

    #[test]
    fn test_field_extraction() {
        let response = GraphQLResponse::from_bytes(
            br#"{"data":{"deleteBlogPost":{"id":"abc"}}}"#,
        )
        .unwrap();
        let deleted: serde_json::Value = response.field("deleteBlogPost").unwrap();
        assert_eq!(deleted["id"], "abc");
    }

    #[test]
    fn test_partial_data_with_errors_is_an_error() {
        let response = GraphQLResponse::from_bytes(
            br#"{"data":{"updateBlogPost":null},"errors":[{"message":"The conditional request failed","errorType":"DynamoDB:ConditionalCheckFailedException","path":["updateBlogPost"]}]}"#,
        )
        .unwrap();
        assert!(!response.is_success());

        match response.field::<serde_json::Value>("updateBlogPost") {
            Err(BlogError::Api { status, errors }) => {
                assert_eq!(status, None);
                assert_eq!(errors.len(), 1);
                assert_eq!(
                    errors[0].error_type.as_deref(),
                    Some("DynamoDB:ConditionalCheckFailedException")
                );
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let response = GraphQLResponse::success(json!({ "other": 1 })).unwrap();
        assert!(response.field::<serde_json::Value>("listBlogPosts").is_err());
    }
}
