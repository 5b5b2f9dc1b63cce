//! An [`Executor`] forwarding operations to an upstream GraphQL server.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use http::HeaderValue;
use http::header::ACCEPT;
use http::header::CONTENT_TYPE;
use tower::BoxError;

use super::APPLICATION_JSON_HEADER_VALUE;
use super::ExecutionRequest;
use super::Executor;
use crate::configuration::ExecutorConfig;
use crate::graphql;
use crate::protocols::multipart;
use crate::protocols::multipart::MULTIPART_SUBSCRIPTION_ACCEPT;
use crate::protocols::multipart::Part;
use crate::subscription::Disposer;
use crate::subscription::Sink;

const ERROR_CODE_UPSTREAM_FAILED: &str = "UPSTREAM_REQUEST_FAILED";

#[derive(Clone, Debug)]
pub struct HttpExecutor {
    client: reqwest::Client,
    url: reqwest::Url,
    timeout: Duration,
}

impl HttpExecutor {
    /// Forward to `url`; the configured timeout applies to single responses only.
    pub fn new(url: &str, configuration: &ExecutorConfig) -> Result<Self, BoxError> {
        Ok(Self {
            client: reqwest::Client::builder()
                .tcp_keepalive(Some(Duration::from_secs(5)))
                .build()?,
            url: reqwest::Url::parse(url)?,
            timeout: configuration.timeout,
        })
    }

    fn post(&self, request: &ExecutionRequest, accept: &'static str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url.clone())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static(APPLICATION_JSON_HEADER_VALUE),
            )
            .header(ACCEPT, HeaderValue::from_static(accept))
            .json(&request.to_graphql_request())
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<graphql::Response, BoxError> {
        tracing::debug!(url = %self.url, "forwarding operation");
        let response = self
            .post(&request, APPLICATION_JSON_HEADER_VALUE)
            .timeout(self.timeout)
            .send()
            .await?;
        let bytes = response.bytes().await?;
        Ok(graphql::Response::from_bytes(&bytes)?)
    }

    fn subscribe(
        &self,
        request: ExecutionRequest,
        sink: Sink<graphql::Response, graphql::Error>,
    ) -> Disposer {
        let pending = self.post(&request, MULTIPART_SUBSCRIPTION_ACCEPT);
        let task = tokio::spawn(async move {
            if let Err(error) = forward_subscription(pending, &sink).await {
                tracing::debug!(%error, "upstream subscription failed");
                sink.error(
                    graphql::Error::builder()
                        .message(format!("upstream subscription failed: {error}"))
                        .extension_code(ERROR_CODE_UPSTREAM_FAILED)
                        .build(),
                );
            }
        });
        Box::new(move || task.abort())
    }
}

async fn forward_subscription(
    pending: reqwest::RequestBuilder,
    sink: &Sink<graphql::Response, graphql::Error>,
) -> Result<(), BoxError> {
    let response = pending.send().await?;
    let boundary = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(multipart::boundary);

    // an upstream may answer with a single response, e.g. to report errors
    let Some(boundary) = boundary else {
        let bytes = response.bytes().await?;
        sink.next(graphql::Response::from_bytes(&bytes)?);
        sink.complete();
        return Ok(());
    };

    let mut parts = Box::pin(multipart::decode(response.bytes_stream(), boundary));
    while let Some(part) = parts.next().await {
        match part? {
            Part::Payload(payload) => sink.next(payload),
            Part::Errors(errors) => {
                let error = errors.into_iter().next().unwrap_or_else(|| {
                    graphql::Error::builder()
                        .message("upstream subscription failed")
                        .extension_code(ERROR_CODE_UPSTREAM_FAILED)
                        .build()
                });
                sink.error(error);
                return Ok(());
            }
        }
    }
    sink.complete();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Json;
    use axum::Router;
    use axum::routing::post;
    use serde_json_bytes::json;

    use super::*;
    use crate::json_ext::Object;
    use crate::spec;
    use crate::subscription::from_sink;

    async fn upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        format!("http://{address}/graphql")
    }

    fn request(query: &str) -> ExecutionRequest {
        let schema = spec::tests::schema();
        let parsed = spec::parse(query).unwrap();
        let document = spec::validate(&schema, &parsed).unwrap();
        let (context, _) = http::Request::new(()).into_parts();
        ExecutionRequest::builder()
            .schema(schema)
            .document(Arc::new(document))
            .query(query)
            .variables(Object::new())
            .context(context)
            .build()
    }

    #[tokio::test]
    async fn it_forwards_operations() {
        let url = upstream(Router::new().route(
            "/graphql",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body, serde_json::json!({ "query": "{ me { name } }" }));
                Json(serde_json::json!({ "data": { "me": { "name": "Ada" } } }))
            }),
        ))
        .await;

        let executor = HttpExecutor::new(&url, &ExecutorConfig::default()).unwrap();
        let response = executor.execute(request("{ me { name } }")).await.unwrap();
        assert_eq!(response.data, Some(json!({ "me": { "name": "Ada" } })));
    }

    #[tokio::test]
    async fn it_streams_subscriptions() {
        let url = upstream(Router::new().route(
            "/graphql",
            post(|| async {
                (
                    [(CONTENT_TYPE, "multipart/mixed;boundary=\"graphql\";subscriptionSpec=\"1.0\"")],
                    "\r\n--graphql\r\ncontent-type: application/json\r\n\r\n{\"payload\":{\"data\":{\"ticks\":1}}}\r\n--graphql\r\ncontent-type: application/json\r\n\r\n{}\r\n--graphql\r\ncontent-type: application/json\r\n\r\n{\"payload\":{\"data\":{\"ticks\":2}}}\r\n--graphql--\r\n",
                )
            }),
        ))
        .await;

        let executor = HttpExecutor::new(&url, &ExecutorConfig::default()).unwrap();
        let request = request("subscription { ticks }");
        let results: Vec<_> = from_sink(move |sink| executor.subscribe(request, sink))
            .into_stream()
            .collect()
            .await;
        assert_eq!(
            results,
            vec![
                Ok(graphql::Response::builder().data(json!({ "ticks": 1 })).build()),
                Ok(graphql::Response::builder().data(json!({ "ticks": 2 })).build()),
            ]
        );
    }

    #[tokio::test]
    async fn it_follows_the_upstream_boundary() {
        let url = upstream(Router::new().route(
            "/graphql",
            post(|| async {
                (
                    [(CONTENT_TYPE, "multipart/mixed; boundary=\"sep\"; subscriptionSpec=\"1.0\"")],
                    "--sep\r\ncontent-type: application/json\r\n\r\n{\"payload\":{\"data\":{\"ticks\":1}}}\r\n--sep\r\ncontent-type: application/json\r\n\r\n{\"payload\":null,\"errors\":[{\"message\":\"gone\"}]}\r\n--sep--\r\n",
                )
            }),
        ))
        .await;

        let executor = HttpExecutor::new(&url, &ExecutorConfig::default()).unwrap();
        let request = request("subscription { ticks }");
        let results: Vec<_> = from_sink(move |sink| executor.subscribe(request, sink))
            .into_stream()
            .collect()
            .await;
        assert_eq!(
            results,
            vec![
                Ok(graphql::Response::builder().data(json!({ "ticks": 1 })).build()),
                Err(graphql::Error::builder().message("gone").build()),
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_upstreams_end_subscriptions_with_an_error() {
        // nothing listens on the discard port
        let executor =
            HttpExecutor::new("http://127.0.0.1:9/graphql", &ExecutorConfig::default()).unwrap();
        let request = request("subscription { ticks }");
        let results: Vec<_> = from_sink(move |sink| executor.subscribe(request, sink))
            .into_stream()
            .collect()
            .await;
        assert_eq!(results.len(), 1);
        let error = results[0].as_ref().unwrap_err();
        assert_eq!(
            error.extension_code().as_deref(),
            Some(ERROR_CODE_UPSTREAM_FAILED)
        );
    }
}
