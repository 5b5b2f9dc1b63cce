//! Implementation of the various steps in the endpoint's processing pipeline.

use std::sync::Arc;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::validation::Valid;
use async_trait::async_trait;
pub use tower::BoxError;

pub use self::endpoint::EndpointService;
pub use self::http_executor::HttpExecutor;
use crate::graphql;
use crate::json_ext::Object;
use crate::spec::Schema;
pub use crate::subscription::Disposer;
pub use crate::subscription::Sink;

pub(crate) mod endpoint;
pub(crate) mod http_executor;
pub(crate) mod layers;

pub(crate) const APPLICATION_JSON_HEADER_VALUE: &str = "application/json";

/// Everything an [`Executor`] needs to run one operation.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ExecutionRequest {
    pub schema: Schema,
    pub document: Arc<Valid<ExecutableDocument>>,
    /// The query text the document was parsed from.
    pub query: String,
    pub variables: Object,
    pub operation_name: Option<String>,
    /// The inbound HTTP request, without its body.
    pub context: http::request::Parts,
}

#[buildstructor::buildstructor]
impl ExecutionRequest {
    #[builder(visibility = "pub")]
    fn new(
        schema: Schema,
        document: Arc<Valid<ExecutableDocument>>,
        query: String,
        variables: Object,
        operation_name: Option<String>,
        context: http::request::Parts,
    ) -> Self {
        Self {
            schema,
            document,
            query,
            variables,
            operation_name,
            context,
        }
    }

    /// The request as sent to an upstream GraphQL server.
    pub fn to_graphql_request(&self) -> graphql::Request {
        graphql::Request::builder()
            .query(self.query.clone())
            .and_operation_name(self.operation_name.clone())
            .variables(self.variables.clone())
            .build()
    }
}

/// Runs validated operations.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Run a query or mutation to completion.
    async fn execute(&self, request: ExecutionRequest) -> Result<graphql::Response, BoxError>;

    /// Start a subscription, pushing every event into `sink`.
    ///
    /// The returned [`Disposer`] stops the producer. The default rejects
    /// subscriptions with a single error.
    fn subscribe(
        &self,
        request: ExecutionRequest,
        sink: Sink<graphql::Response, graphql::Error>,
    ) -> Disposer {
        tracing::debug!(
            operation_name = request.operation_name.as_deref().unwrap_or_default(),
            "subscriptions are not supported by this executor"
        );
        sink.error(
            graphql::Error::builder()
                .message("Subscriptions are not supported.")
                .extension_code("SUBSCRIPTION_NOT_SUPPORTED")
                .build(),
        );
        Box::new(|| {})
    }
}
