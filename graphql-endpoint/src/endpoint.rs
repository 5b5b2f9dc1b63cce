//! Wiring a schema, an executor and a configuration into a server.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::axum_factory::make_router;
use crate::configuration::Configuration;
use crate::services::EndpointService;
use crate::services::Executor;
use crate::spec::Schema;

/// A GraphQL endpoint, ready to be served.
///
/// ```ignore
/// let endpoint = Endpoint::builder()
///     .schema(schema)
///     .executor(executor)
///     .build();
/// endpoint.serve(listener, shutdown).await?;
/// ```
pub struct Endpoint {
    schema: Schema,
    executor: Arc<dyn Executor>,
    configuration: Configuration,
}

#[buildstructor::buildstructor]
impl Endpoint {
    #[builder(visibility = "pub")]
    fn new(
        schema: Schema,
        executor: Arc<dyn Executor>,
        configuration: Option<Configuration>,
    ) -> Self {
        Self {
            schema,
            executor,
            configuration: configuration.unwrap_or_default(),
        }
    }

    /// The endpoint as a tower service, without any HTTP server concerns.
    pub fn service(&self) -> EndpointService {
        EndpointService::new(
            self.schema.clone(),
            self.executor.clone(),
            &self.configuration,
        )
    }

    /// An axum router serving the endpoint at `server.path`.
    pub fn into_router(self) -> Router {
        make_router(self.service(), &self.configuration)
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = listener.local_addr()?;
        tracing::info!(
            "GraphQL endpoint listening on http://{address}{}",
            self.configuration.server.path
        );
        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("stopped");
        Ok(())
    }
}
