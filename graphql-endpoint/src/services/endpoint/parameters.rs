//! Extraction of the GraphQL parameters from the URL and the body.

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use mediatype::MediaType;
use mediatype::names::APPLICATION;
use mediatype::names::JSON;
use serde_json_bytes::Value;

use crate::error::ClientInputError;
use crate::json_ext::Object;
use crate::json_ext::into_optional_object;

/// The body of a request, by the shape it arrived in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum RawBody {
    #[default]
    Empty,
    /// Any body that is neither JSON nor a form is the query itself.
    Text(String),
    Json(Object),
    Form(Vec<(String, String)>),
}

impl RawBody {
    pub(crate) fn from_bytes(headers: &HeaderMap, bytes: Bytes) -> Result<Self, ClientInputError> {
        if bytes.is_empty() {
            return Ok(RawBody::Empty);
        }

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| MediaType::parse(value).ok());
        let (is_json, is_form) = match &content_type {
            Some(mime) if mime.ty == APPLICATION => (
                mime.subty == JSON || mime.suffix == Some(JSON),
                mime.subty.as_str() == "x-www-form-urlencoded",
            ),
            _ => (false, false),
        };

        if is_json {
            let value: Value =
                serde_json::from_slice(&bytes).map_err(|_| ClientInputError::InvalidJsonBody)?;
            // batches and scalars carry no fields
            Ok(match value {
                Value::Object(object) => RawBody::Json(object),
                _ => RawBody::Empty,
            })
        } else if is_form {
            Ok(serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
                .map(RawBody::Form)
                .unwrap_or_default())
        } else {
            Ok(RawBody::Text(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    fn field(&self, name: &str) -> Option<Value> {
        match self {
            RawBody::Empty | RawBody::Text(_) => None,
            RawBody::Json(object) => object.get(name).cloned(),
            RawBody::Form(fields) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| Value::String(value.as_str().into())),
        }
    }

    fn string_field(&self, name: &str) -> Option<String> {
        match self.field(name) {
            Some(Value::String(value)) => Some(value.as_str().to_string()),
            _ => None,
        }
    }
}

/// Variables as sent by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum VariablesInput {
    /// JSON text, from the URL, a form or a JSON string field.
    Text(String),
    Object(Object),
}

impl VariablesInput {
    /// `null` counts as no variables; any other JSON that is not an object is invalid.
    pub(crate) fn parse(self) -> Result<Option<Object>, ClientInputError> {
        match self {
            VariablesInput::Object(object) => Ok(Some(object)),
            VariablesInput::Text(text) => {
                let value: Value = serde_json::from_str(&text)
                    .map_err(|_| ClientInputError::InvalidVariables)?;
                into_optional_object(value).map_err(|_| ClientInputError::InvalidVariables)
            }
        }
    }
}

/// The GraphQL parameters of one request, URL values taking precedence over body values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct RequestParameters {
    pub(crate) query: Option<String>,
    pub(crate) variables: Option<VariablesInput>,
    pub(crate) operation_name: Option<String>,
    pub(crate) raw: bool,
}

impl RequestParameters {
    pub(crate) fn extract(url_query: Option<&str>, body: &RawBody) -> Self {
        let url: Vec<(String, String)> = url_query
            .and_then(|query| serde_urlencoded::from_str(query).ok())
            .unwrap_or_default();
        let from_url = |name: &str| {
            url.iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };

        let query = from_url("query").or_else(|| match body {
            RawBody::Text(text) => Some(text.clone()),
            _ => body.string_field("query"),
        });

        let variables = match from_url("variables") {
            Some(text) => Some(VariablesInput::Text(text)),
            None => match body.field("variables") {
                Some(Value::String(text)) => Some(VariablesInput::Text(text.as_str().to_string())),
                Some(Value::Object(object)) => Some(VariablesInput::Object(object)),
                _ => None,
            },
        };

        let operation_name = from_url("operationName").or_else(|| body.string_field("operationName"));

        // a JSON `"raw": null` still counts
        let raw = from_url("raw").is_some() || body.field("raw").is_some();

        Self {
            query,
            variables,
            operation_name,
            raw,
        }
    }
}
