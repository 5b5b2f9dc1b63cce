//! Endpoint errors.
use displaydoc::Display;
use http::HeaderValue;
use http::StatusCode;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;
pub(crate) use crate::graphql::Error;
use crate::spec::OperationKind;

pub(crate) const ERROR_CODE_INVALID_REQUEST: &str = "INVALID_GRAPHQL_REQUEST";
pub(crate) const ERROR_CODE_MISSING_QUERY: &str = "MISSING_QUERY_STRING";
pub(crate) const ERROR_CODE_METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";

/// Methods accepted by the endpoint at all.
pub(crate) const ALLOW_GET_POST: HeaderValue = HeaderValue::from_static("GET, POST");
/// Methods accepted for mutations and subscriptions.
pub(crate) const ALLOW_POST: HeaderValue = HeaderValue::from_static("POST");

/// Malformed request input, detected before the query is looked at.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientInputError {
    /// Variables are invalid JSON.
    InvalidVariables,

    /// POST body sent invalid JSON.
    InvalidJsonBody,

    /// Must provide query string.
    MissingQuery,

    /// Request body payload too large.
    PayloadTooLarge,
}

/// The query text could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", join_messages(.errors))]
pub struct SyntaxError {
    pub errors: Vec<Error>,
}

/// The document violates one or more validation rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", join_messages(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<Error>,
}

/// The HTTP method cannot carry this request.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MethodMismatchError {
    /// GraphQL only supports GET and POST requests.
    UnsupportedMethod,

    /// Can only perform a {0} operation from a POST request.
    RequiresPost(OperationKind),
}

impl MethodMismatchError {
    pub(crate) fn allow(&self) -> HeaderValue {
        match self {
            MethodMismatchError::UnsupportedMethod => ALLOW_GET_POST,
            MethodMismatchError::RequiresPost(_) => ALLOW_POST,
        }
    }
}

/// Terminal failures the dispatcher answers without executing anything.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EndpointError {
    /// {0}
    ClientInput(#[from] ClientInputError),

    /// {0}
    Syntax(#[from] SyntaxError),

    /// {0}
    Validation(#[from] ValidationErrors),

    /// {0}
    MethodMismatch(#[from] MethodMismatchError),
}

impl EndpointError {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            EndpointError::ClientInput(ClientInputError::PayloadTooLarge) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            EndpointError::ClientInput(_)
            | EndpointError::Syntax(_)
            | EndpointError::Validation(_) => StatusCode::BAD_REQUEST,
            EndpointError::MethodMismatch(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// The `allow` header value, for 405 responses.
    pub(crate) fn allow(&self) -> Option<HeaderValue> {
        match self {
            EndpointError::MethodMismatch(error) => Some(error.allow()),
            _ => None,
        }
    }

    pub(crate) fn into_graphql_errors(self) -> Vec<Error> {
        match self {
            EndpointError::ClientInput(error) => {
                let code = match error {
                    ClientInputError::MissingQuery => ERROR_CODE_MISSING_QUERY,
                    ClientInputError::InvalidVariables
                    | ClientInputError::InvalidJsonBody
                    | ClientInputError::PayloadTooLarge => ERROR_CODE_INVALID_REQUEST,
                };
                vec![
                    Error::builder()
                        .message(error.to_string())
                        .extension_code(code)
                        .build(),
                ]
            }
            EndpointError::Syntax(SyntaxError { errors })
            | EndpointError::Validation(ValidationErrors { errors }) => errors,
            EndpointError::MethodMismatch(error) => vec![
                Error::builder()
                    .message(error.to_string())
                    .extension_code(ERROR_CODE_METHOD_NOT_ALLOWED)
                    .build(),
            ],
        }
    }
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|error| match error.locations.first() {
            Some(location) => format!("[{}:{}] {}", location.line, location.column, error.message),
            None => error.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::Location;

    #[test]
    fn method_mismatch_names_the_operation() {
        let error = EndpointError::from(MethodMismatchError::RequiresPost(
            OperationKind::Mutation,
        ));
        assert_eq!(error.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(error.allow(), Some(HeaderValue::from_static("POST")));
        let errors = error.into_graphql_errors();
        assert_eq!(
            errors[0].message,
            "Can only perform a mutation operation from a POST request."
        );
        assert_eq!(
            errors[0].extension_code().as_deref(),
            Some(ERROR_CODE_METHOD_NOT_ALLOWED)
        );
    }

    #[test]
    fn client_input_messages() {
        let error = EndpointError::from(ClientInputError::InvalidVariables);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.allow(), None);
        assert_eq!(
            error.into_graphql_errors()[0].message,
            "Variables are invalid JSON."
        );
        assert_eq!(
            EndpointError::from(ClientInputError::MissingQuery).into_graphql_errors()[0]
                .extension_code()
                .as_deref(),
            Some(ERROR_CODE_MISSING_QUERY)
        );
    }

    #[test]
    fn oversized_bodies_are_payload_too_large() {
        let error = EndpointError::from(ClientInputError::PayloadTooLarge);
        assert_eq!(error.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            error.into_graphql_errors()[0].message,
            "Request body payload too large."
        );
    }

    #[test]
    fn unsupported_methods_allow_get_and_post() {
        let error = EndpointError::from(MethodMismatchError::UnsupportedMethod);
        assert_eq!(error.allow(), Some(HeaderValue::from_static("GET, POST")));
        assert_eq!(
            error.to_string(),
            "GraphQL only supports GET and POST requests."
        );
    }

    #[test]
    fn syntax_errors_display_their_locations() {
        let error = SyntaxError {
            errors: vec![
                Error::builder()
                    .message("Unexpected <EOF>")
                    .location(Location { line: 1, column: 6 })
                    .build(),
                Error::builder().message("second").build(),
            ],
        };
        assert_eq!(error.to_string(), "[1:6] Unexpected <EOF>\nsecond");
    }
}
