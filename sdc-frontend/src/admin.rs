//! The plaintext admin server: readiness, Prometheus metrics, and a
//! runtime log-level toggle. Same `make_service_fn`/`service_fn` shape as a
//! registration-style admin endpoint, just without TLS.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::{self, FutureExt};
use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Method, Request, Response, StatusCode};
use prometheus_client::registry::Registry;
use sdc_core::AddressTable;
use tracing::{info, warn};

use crate::error::FrontendError;

/// Applies a requested log-level string, or fails if it isn't recognized.
/// A thin seam so this crate doesn't need to know the concrete
/// `tracing_subscriber` reload-handle type the binary constructed.
pub type LogLevelSetter = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

pub async fn serve(
    addr: SocketAddr,
    table: AddressTable,
    registry: Arc<Registry>,
    set_log_level: LogLevelSetter,
    drain: drain::Watch,
) -> Result<(), FrontendError> {
    let make_svc = make_service_fn(move |_conn| {
        let table = table.clone();
        let registry = registry.clone();
        let set_log_level = set_log_level.clone();
        future::ok::<_, Infallible>(service_fn(move |req| {
            route(req, table.clone(), registry.clone(), set_log_level.clone())
        }))
    });

    let (close_tx, close_rx) = tokio::sync::oneshot::channel();
    let server = hyper::Server::try_bind(&addr)?
        .serve(make_svc)
        .with_graceful_shutdown(close_rx.map(|_| ()));
    info!(%addr, "admin server listening");

    tokio::pin!(server);
    tokio::select! {
        res = &mut server => res.map_err(FrontendError::from),
        handle = drain.signaled() => {
            let _ = close_tx.send(());
            handle.release_after(server).await.map_err(FrontendError::from)
        }
    }
}

async fn route(
    req: Request<Body>,
    table: AddressTable,
    registry: Arc<Registry>,
    set_log_level: LogLevelSetter,
) -> Result<Response<Body>, Infallible> {
    let response = match (req.method().clone(), req.uri().path().to_string()) {
        (Method::GET, path) if path == "/ready" || path == "/health" => ready_response(&table),
        (Method::GET, path) if path == "/metrics" => metrics_response(&registry),
        (Method::POST, path) if path == "/log-level" => log_level_response(req, &set_log_level).await,
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap(),
    };
    Ok(response)
}

fn ready_response(table: &AddressTable) -> Response<Body> {
    if table.is_warm() {
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("ready\n"))
            .unwrap()
    } else {
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("not ready\n"))
            .unwrap()
    }
}

fn metrics_response(registry: &Registry) -> Response<Body> {
    let mut buf = String::new();
    match prometheus_client::encoding::text::encode(&mut buf, registry) {
        Ok(()) => Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )
            .body(Body::from(buf))
            .unwrap(),
        Err(error) => {
            warn!(%error, "failed to encode metrics");
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap()
        }
    }
}

async fn log_level_response(req: Request<Body>, set_log_level: &LogLevelSetter) -> Response<Body> {
    let bytes = match hyper::body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(%error, "failed to read log-level request body");
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::empty())
                .unwrap();
        }
    };
    let level = String::from_utf8_lossy(&bytes).trim().to_string();
    match set_log_level(&level) {
        Ok(()) => {
            info!(level, "log level changed");
            Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(Body::empty())
                .unwrap()
        }
        Err(error) => {
            warn!(%error, requested = %level, "rejected log-level change");
            Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::empty())
                .unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use sdc_core::TestClock;

    fn table() -> AddressTable {
        AddressTable::new(
            Duration::from_secs(60),
            Duration::from_secs(10),
            Arc::new(TestClock::new()),
        )
    }

    #[test]
    fn ready_response_reflects_warm_state() {
        let table = table();
        assert_eq!(
            ready_response(&table).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        table.set_warm(true);
        assert_eq!(ready_response(&table).status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn log_level_response_rejects_unknown_directive() {
        let set_log_level: LogLevelSetter = Arc::new(|level: &str| {
            if level == "debug" || level == "info" {
                Ok(())
            } else {
                Err(anyhow::anyhow!("unknown level"))
            }
        });
        let req = Request::builder()
            .method(Method::POST)
            .body(Body::from("chatty"))
            .unwrap();
        let resp = log_level_response(req, &set_log_level).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn log_level_response_accepts_known_directive() {
        let set_log_level: LogLevelSetter = Arc::new(|_: &str| Ok(()));
        let req = Request::builder()
            .method(Method::POST)
            .body(Body::from("debug"))
            .unwrap();
        let resp = log_level_response(req, &set_log_level).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
