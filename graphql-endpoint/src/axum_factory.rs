//! Axum hosting for the endpoint service.

use axum::Router;
use axum::extract::Request;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::any;
use http::StatusCode;
use tower::ServiceBuilder;
use tower::ServiceExt;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::configuration::Configuration;
use crate::services::EndpointService;

/// Mount `service` at the configured path. Every method reaches it.
pub(crate) fn make_router(service: EndpointService, configuration: &Configuration) -> Router {
    Router::new()
        .route(&configuration.server.path, any(handle))
        .with_state(service)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    configuration.server.request_timeout,
                )),
        )
}

async fn handle(State(service): State<EndpointService>, request: Request) -> Response {
    match service.oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(error) => {
            tracing::error!(%error, "could not handle request");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use http_body_util::BodyExt;

    use super::*;
    use crate::configuration::Server;
    use crate::graphql;
    use crate::services::BoxError;
    use crate::services::ExecutionRequest;
    use crate::services::Executor;
    use crate::spec;

    struct Failing;

    #[async_trait]
    impl Executor for Failing {
        async fn execute(&self, _: ExecutionRequest) -> Result<graphql::Response, BoxError> {
            Err("the database is gone".into())
        }
    }

    struct Slow;

    #[async_trait]
    impl Executor for Slow {
        async fn execute(&self, _: ExecutionRequest) -> Result<graphql::Response, BoxError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(graphql::Response::default())
        }
    }

    fn router(executor: Arc<dyn Executor>, configuration: Configuration) -> Router {
        let service = EndpointService::new(spec::tests::schema(), executor, &configuration);
        make_router(service, &configuration)
    }

    fn post(uri: &str) -> Request {
        http::Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query":"{ me { name } }"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn executor_failures_are_internal_errors() {
        let response = router(Arc::new(Failing), Configuration::default())
            .oneshot(post("/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn the_endpoint_is_mounted_at_the_configured_path() {
        let configuration = Configuration::builder()
            .server(Server::builder().path("/graphql").build())
            .build()
            .unwrap();
        let router = router(Arc::new(Failing), configuration);

        let response = router.clone().oneshot(post("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router.oneshot(post("/graphql")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn other_methods_reach_the_endpoint() {
        let response = router(Arc::new(Failing), Configuration::default())
            .oneshot(
                http::Request::delete("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get("allow").unwrap(), "GET, POST");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        insta::assert_snapshot!(
            String::from_utf8_lossy(&body),
            @r###"{"errors":[{"message":"GraphQL only supports GET and POST requests.","extensions":{"code":"METHOD_NOT_ALLOWED"}}]}"###
        );
    }

    #[tokio::test]
    async fn slow_executions_time_out() {
        let configuration = Configuration::builder()
            .server(
                Server::builder()
                    .request_timeout(Duration::from_millis(50))
                    .build(),
            )
            .build()
            .unwrap();
        let response = router(Arc::new(Slow), configuration)
            .oneshot(post("/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
