//! `GET /v1/registration/<fqdn>` and `GET /routes`, bit-exact to the
//! original registry's JSON shape.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::time::Instant;

use hyper::{header, Body, Method, Request, Response, StatusCode};
use sdc_core::{AddressTable, Fqdn};
use serde::Serialize;

use crate::metrics::FrontendMetrics;

const NOT_WARM_BODY: &str = "address table is not warm";

#[derive(Debug, Serialize)]
struct RegistrationResponse {
    env: String,
    service: String,
    hosts: Vec<HostEntry>,
}

#[derive(Debug, Serialize)]
struct HostEntry {
    ip_address: String,
    last_check_in: String,
    port: u32,
    revision: String,
    service: String,
    service_repo_name: String,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct RoutesResponse {
    addresses: Vec<AddressEntry>,
}

#[derive(Debug, Serialize)]
struct AddressEntry {
    hostname: String,
    ips: Vec<String>,
}

pub async fn handle(
    req: Request<Body>,
    table: AddressTable,
    metrics: FrontendMetrics,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::GET {
        return Ok(Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Body::empty())
            .unwrap());
    }

    if let Some(fqdn) = req.uri().path().strip_prefix("/v1/registration/") {
        return Ok(registration_response(&table, &metrics, fqdn));
    }
    if req.uri().path() == "/routes" {
        return Ok(routes_response(&table));
    }
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::empty())
        .unwrap())
}

fn registration_response(table: &AddressTable, metrics: &FrontendMetrics, fqdn: &str) -> Response<Body> {
    if !table.is_warm() {
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(NOT_WARM_BODY))
            .unwrap();
    }

    let fqdn: Fqdn = fqdn.into();
    let started = Instant::now();
    let ips = table.lookup(&fqdn);
    metrics
        .address_table_lookup_time
        .observe(started.elapsed().as_secs_f64() * 1000.0);

    let hosts = ips
        .into_iter()
        .map(|ip| HostEntry {
            ip_address: ip,
            last_check_in: String::new(),
            port: 0,
            revision: String::new(),
            service: String::new(),
            service_repo_name: String::new(),
            tags: BTreeMap::new(),
        })
        .collect();

    json_response(
        StatusCode::OK,
        &RegistrationResponse {
            env: String::new(),
            service: String::new(),
            hosts,
        },
    )
}

fn routes_response(table: &AddressTable) -> Response<Body> {
    let addresses = table
        .get_all()
        .into_iter()
        .map(|(fqdn, ips)| AddressEntry {
            hostname: fqdn.to_string(),
            ips,
        })
        .collect();
    json_response(StatusCode::OK, &RoutesResponse { addresses })
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let bytes = serde_json::to_vec(body).expect("response payloads always serialize");
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .unwrap()
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

    fn metrics() -> FrontendMetrics {
        FrontendMetrics::register(&mut prometheus_client::registry::Registry::default())
    }

    async fn body_string(resp: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn unwarmed_table_returns_500_with_substring() {
        let table = table();
        let resp = registration_response(&table, &metrics(), "app.internal.");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(resp).await, NOT_WARM_BODY);
    }

    #[tokio::test]
    async fn unknown_fqdn_returns_empty_hosts() {
        let table = table();
        table.set_warm(true);
        let resp = registration_response(&table, &metrics(), "app.internal.");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_string(resp).await,
            r#"{"env":"","service":"","hosts":[]}"#
        );
    }

    #[tokio::test]
    async fn registered_host_is_reported_with_zero_value_fields() {
        let table = table();
        let host: Fqdn = "app.internal.".into();
        table.add(&host, "192.168.0.2").unwrap();
        table.set_warm(true);

        let resp = registration_response(&table, &metrics(), "app.internal.");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_string(resp).await,
            r#"{"env":"","service":"","hosts":[{"ip_address":"192.168.0.2","last_check_in":"","port":0,"revision":"","service":"","service_repo_name":"","tags":{}}]}"#
        );
    }

    #[tokio::test]
    async fn registration_lookup_observes_the_timer() {
        let table = table();
        table.add(&"app.internal.".into(), "192.168.0.2").unwrap();
        table.set_warm(true);
        let metrics = metrics();

        registration_response(&table, &metrics, "app.internal.");

        let mut buf = String::new();
        let mut registry = prometheus_client::registry::Registry::default();
        registry.register_with_unit(
            "addressTableLookupTime",
            "test",
            prometheus_client::registry::Unit::Other("milliseconds".to_string()),
            metrics.address_table_lookup_time.clone(),
        );
        prometheus_client::encoding::text::encode(&mut buf, &registry).unwrap();
        assert!(buf.contains("addressTableLookupTime_count 1"));
    }

    #[tokio::test]
    async fn routes_enumerates_every_hostname() {
        let table = table();
        table
            .add(&"foo.internal.".into(), "1.1.1.1".to_string())
            .unwrap();
        table
            .add(&"foo.internal.".into(), "1.1.1.2".to_string())
            .unwrap();
        table
            .add(&"bar.internal.".into(), "2.2.2.2".to_string())
            .unwrap();
        table.set_warm(true);

        let resp = routes_response(&table);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_string(resp).await,
            r#"{"addresses":[{"hostname":"bar.internal","ips":["2.2.2.2"]},{"hostname":"foo.internal","ips":["1.1.1.1","1.1.1.2"]}]}"#
        );
    }
}
