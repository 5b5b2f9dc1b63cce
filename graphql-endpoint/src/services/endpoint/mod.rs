//! The GraphQL endpoint: from an HTTP request to a rendered result.

mod parameters;

use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use axum::body::Body;
use futures::future::BoxFuture;
use http::HeaderValue;
use http::Method;
use http::StatusCode;
use http::header::ALLOW;
use http::header::CONTENT_TYPE;
use http_body_util::BodyExt;
use http_body_util::LengthLimitError;
use http_body_util::Limited;
use tower::BoxError;
use tower::Service;
use tracing::Instrument;

pub(crate) use self::parameters::RawBody;
pub(crate) use self::parameters::RequestParameters;
pub(crate) use self::parameters::VariablesInput;
use super::APPLICATION_JSON_HEADER_VALUE;
use super::ExecutionRequest;
use super::Executor;
use super::layers::content_negotiation::ResponseStrategy;
use super::layers::static_page::ExplorerConfig;
use super::layers::static_page::ExplorerPage;
use crate::Configuration;
use crate::error::ClientInputError;
use crate::error::EndpointError;
use crate::error::MethodMismatchError;
use crate::graphql;
use crate::protocols::multipart::MULTIPART_SUBSCRIPTION_CONTENT_TYPE;
use crate::protocols::multipart::Multipart;
use crate::spec;
use crate::spec::OperationKind;
use crate::spec::Schema;
use crate::subscription;

/// Serves GraphQL over HTTP for one schema and executor.
#[derive(Clone)]
pub struct EndpointService {
    schema: Schema,
    executor: Arc<dyn Executor>,
    /// `None` when the explorer is disabled.
    explorer: Option<ExplorerPage>,
    heartbeat_interval: Duration,
    max_request_bytes: usize,
}

impl EndpointService {
    pub fn new(
        schema: Schema,
        executor: Arc<dyn Executor>,
        configuration: &Configuration,
    ) -> Self {
        Self {
            schema,
            executor,
            explorer: configuration
                .explorer
                .enabled
                .then(|| ExplorerPage::new(&configuration.explorer)),
            heartbeat_interval: configuration.subscription.heartbeat_interval,
            max_request_bytes: configuration.server.max_request_bytes,
        }
    }

    async fn handle(
        self,
        request: http::Request<Body>,
    ) -> Result<http::Response<Body>, BoxError> {
        let (parts, body) = request.into_parts();
        let bytes = match Limited::new(body, self.max_request_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(error) if error.is::<LengthLimitError>() => {
                return json_error(ClientInputError::PayloadTooLarge.into());
            }
            Err(error) => return Err(error),
        };

        let body = match RawBody::from_bytes(&parts.headers, bytes) {
            Ok(body) => body,
            Err(error) => return json_error(error.into()),
        };
        let parameters = RequestParameters::extract(parts.uri.query(), &body);

        let span = tracing::info_span!(
            "graphql_request",
            "http.method" = %parts.method,
            "graphql.operation.name" = parameters.operation_name.as_deref().unwrap_or_default(),
        );
        self.dispatch(parts, parameters).instrument(span).await
    }

    async fn dispatch(
        &self,
        parts: http::request::Parts,
        parameters: RequestParameters,
    ) -> Result<http::Response<Body>, BoxError> {
        let RequestParameters {
            query,
            variables,
            operation_name,
            raw,
        } = parameters;

        let variables = match variables.map(VariablesInput::parse).transpose() {
            Ok(variables) => variables.flatten(),
            Err(error) => return json_error(error.into()),
        };

        if parts.method != Method::GET && parts.method != Method::POST {
            return json_error(MethodMismatchError::UnsupportedMethod.into());
        }

        let strategy = ResponseStrategy::select(&parts.headers, raw, self.explorer.is_some());

        let Some(query) = query else {
            return match strategy {
                ResponseStrategy::Explorer => {
                    self.explorer_shell(StatusCode::OK, &ExplorerConfig::default())
                }
                ResponseStrategy::Json => json_error(ClientInputError::MissingQuery.into()),
            };
        };

        let config = ExplorerConfig {
            query: Some(&query),
            variables: variables.as_ref(),
            operation_name: operation_name.as_deref(),
            response: None,
        };

        let parsed = match spec::parse(&query) {
            Ok(parsed) => parsed,
            Err(error) => return self.render_error(strategy, error.into(), &config),
        };
        let document = match spec::validate(&self.schema, &parsed) {
            Ok(document) => document,
            Err(errors) => return self.render_error(strategy, errors.into(), &config),
        };

        let kind = spec::classify(&parsed, operation_name.as_deref());
        if parts.method == Method::GET
            && let Some(kind) = kind.filter(|kind| *kind != OperationKind::Query)
        {
            return match strategy {
                // the page lets the user run it with a POST
                ResponseStrategy::Explorer => self.explorer_shell(StatusCode::OK, &config),
                ResponseStrategy::Json => json_error(MethodMismatchError::RequiresPost(kind).into()),
            };
        }

        let request = ExecutionRequest::builder()
            .schema(self.schema.clone())
            .document(Arc::new(document))
            .query(query.clone())
            .variables(variables.clone().unwrap_or_default())
            .and_operation_name(operation_name.clone())
            .context(parts)
            .build();

        if kind == Some(OperationKind::Subscription) {
            return match strategy {
                ResponseStrategy::Explorer => self.explorer_shell(StatusCode::OK, &config),
                ResponseStrategy::Json => self.subscribe(request),
            };
        }

        let response = self.executor.execute(request).await.map_err(|error| {
            tracing::error!(%error, "execution failed");
            error
        })?;

        match strategy {
            ResponseStrategy::Explorer => self.explorer_shell(
                StatusCode::OK,
                &ExplorerConfig {
                    response: Some(&response),
                    ..config
                },
            ),
            ResponseStrategy::Json => json_response(StatusCode::OK, &response, None),
        }
    }

    fn subscribe(&self, request: ExecutionRequest) -> Result<http::Response<Body>, BoxError> {
        let executor = self.executor.clone();
        let results = subscription::from_sink(move |sink| executor.subscribe(request, sink));
        tracing::debug!("subscription started");

        let body = Multipart::new(results.into_stream(), self.heartbeat_interval);
        Ok(http::Response::builder()
            .status(StatusCode::OK)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static(MULTIPART_SUBSCRIPTION_CONTENT_TYPE),
            )
            .body(Body::from_stream(body))?)
    }

    fn render_error(
        &self,
        strategy: ResponseStrategy,
        error: EndpointError,
        config: &ExplorerConfig<'_>,
    ) -> Result<http::Response<Body>, BoxError> {
        match (strategy, &self.explorer) {
            (ResponseStrategy::Explorer, Some(explorer)) => {
                tracing::debug!(%error, "rejecting request");
                let status = error.status_code();
                let response = graphql::Response::builder()
                    .errors(error.into_graphql_errors())
                    .build();
                explorer.response(
                    status,
                    &ExplorerConfig {
                        response: Some(&response),
                        ..*config
                    },
                )
            }
            _ => json_error(error),
        }
    }

    fn explorer_shell(
        &self,
        status: StatusCode,
        config: &ExplorerConfig<'_>,
    ) -> Result<http::Response<Body>, BoxError> {
        match &self.explorer {
            Some(explorer) => explorer.response(status, config),
            None => Err("the explorer is disabled".into()),
        }
    }
}

impl Service<http::Request<Body>> for EndpointService {
    type Response = http::Response<Body>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(this.handle(request))
    }
}

fn json_error(error: EndpointError) -> Result<http::Response<Body>, BoxError> {
    tracing::debug!(%error, "rejecting request");
    let status = error.status_code();
    let allow = error.allow();
    let response = graphql::Response::builder()
        .errors(error.into_graphql_errors())
        .build();
    json_response(status, &response, allow)
}

fn json_response(
    status: StatusCode,
    response: &graphql::Response,
    allow: Option<HeaderValue>,
) -> Result<http::Response<Body>, BoxError> {
    let mut builder = http::Response::builder().status(status).header(
        CONTENT_TYPE,
        HeaderValue::from_static(APPLICATION_JSON_HEADER_VALUE),
    );
    if let Some(allow) = allow {
        builder = builder.header(ALLOW, allow);
    }
    Ok(builder.body(Body::from(response.to_bytes()?))?)
}
