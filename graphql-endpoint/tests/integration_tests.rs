use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use graphql_endpoint::Configuration;
use graphql_endpoint::Endpoint;
use graphql_endpoint::ExecutionRequest;
use graphql_endpoint::Executor;
use graphql_endpoint::graphql;
use graphql_endpoint::services::BoxError;
use graphql_endpoint::services::Disposer;
use graphql_endpoint::services::Sink;
use graphql_endpoint::spec;
use serde_json_bytes::json;
use tokio::sync::oneshot;

const SCHEMA: &str = r#"
type Query {
  greeting(name: String): String
}

type Mutation {
  rename(name: String!): String
}

type Subscription {
  countdown: Int
}
"#;

struct Greeter;

#[async_trait]
impl Executor for Greeter {
    async fn execute(&self, request: ExecutionRequest) -> Result<graphql::Response, BoxError> {
        let name = request
            .variables
            .get("name")
            .and_then(|name| name.as_str())
            .unwrap_or("world")
            .to_string();
        Ok(graphql::Response::builder()
            .data(json!({ "greeting": format!("Hello, {name}!") }))
            .build())
    }

    fn subscribe(
        &self,
        _request: ExecutionRequest,
        sink: Sink<graphql::Response, graphql::Error>,
    ) -> Disposer {
        let task = tokio::spawn(async move {
            for n in (1..=3).rev() {
                sink.next(
                    graphql::Response::builder()
                        .data(json!({ "countdown": n }))
                        .build(),
                );
            }
            sink.complete();
        });
        Box::new(move || task.abort())
    }
}

fn endpoint(configuration: Configuration) -> Endpoint {
    Endpoint::builder()
        .schema(spec::parse_schema(SCHEMA, "schema.graphql").unwrap())
        .executor(Arc::new(Greeter))
        .configuration(configuration)
        .build()
}

struct Running {
    address: SocketAddr,
    shutdown: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl Running {
    async fn start(configuration: Configuration) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (shutdown, signal) = oneshot::channel::<()>();
        let server = tokio::spawn(endpoint(configuration).serve(listener, async move {
            let _ = signal.await;
        }));
        Self {
            address,
            shutdown,
            server,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.server.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn queries_are_answered_over_http() {
    let running = Running::start(Configuration::default()).await;

    let response = reqwest::Client::new()
        .post(running.url("/"))
        .json(&serde_json::json!({
            "query": "query Greet($name: String) { greeting(name: $name) }",
            "variables": { "name": "Ada" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/json"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "data": { "greeting": "Hello, Ada!" } })
    );

    running.stop().await;
}

#[tokio::test]
async fn browsers_are_served_the_explorer() {
    let configuration: Configuration = r#"
server:
  path: /graphql
explorer:
  title: "Greetings <3"
"#
    .parse()
    .unwrap();
    let running = Running::start(configuration).await;

    let response = reqwest::Client::new()
        .get(running.url("/graphql"))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("content-security-policy"));
    let page = response.text().await.unwrap();
    assert!(page.contains("<title>Greetings &lt;3</title>"));

    running.stop().await;
}

#[tokio::test]
async fn mutations_over_get_are_refused() {
    let running = Running::start(Configuration::default()).await;

    let response = reqwest::Client::new()
        .get(running.url("/"))
        .query(&[("query", "mutation { rename(name: \"Ada\") }")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
    assert_eq!(response.headers()["allow"], "POST");

    running.stop().await;
}

#[tokio::test]
async fn subscriptions_are_streamed_as_multipart() {
    let running = Running::start(Configuration::default()).await;

    let response = reqwest::Client::new()
        .post(running.url("/"))
        .header("accept", "multipart/mixed;subscriptionSpec=\"1.0\", application/json")
        .json(&serde_json::json!({ "query": "subscription { countdown }" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("multipart/mixed")
    );
    let body = response.text().await.unwrap();
    let payloads: Vec<&str> = body
        .split("\r\n\r\n")
        .skip(1)
        .map(|part| part.split("\r\n").next().unwrap_or_default())
        .collect();
    assert_eq!(
        payloads,
        vec![
            r#"{"payload":{"data":{"countdown":3}}}"#,
            r#"{"payload":{"data":{"countdown":2}}}"#,
            r#"{"payload":{"data":{"countdown":1}}}"#,
        ]
    );
    assert!(body.ends_with("--graphql--\r\n"));

    running.stop().await;
}
