//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::{A, SRV};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

use service_resolver::discovery::catalog::CatalogService;
use service_resolver::discovery::{
    CheckStatus, DnsProvider, HealthCheck, HealthProvider, ProviderError, ProviderResult,
    ServiceInstance, SrvRecord,
};
use service_resolver::observability::{SelectionObserver, Stage};

/// Request head as seen by a mock backend.
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    /// e.g. `GET /v1/health/service/api HTTP/1.1`
    pub line: String,
    /// Header names lowercased, values trimmed.
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    fn parse(raw: &str) -> Self {
        let mut lines = raw.split("\r\n");
        let line = lines.next().unwrap_or_default().to_string();
        let headers = lines
            .take_while(|l| !l.is_empty())
            .filter_map(|l| l.split_once(':'))
            .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
            .collect();
        Self { line, headers }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Start a programmable mock HTTP server on an ephemeral port.
///
/// `f` maps the request head to a status code and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let request = String::from_utf8_lossy(&buf[..n]);
                        let (status, body) = f(RecordedRequest::parse(&request)).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Mock Consul health endpoint that records every request it serves.
pub async fn start_mock_consul(body: String) -> (SocketAddr, Arc<Mutex<Vec<RecordedRequest>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let addr = start_programmable_backend(move |request| {
        log.lock().unwrap().push(request);
        let body = body.clone();
        async move { (200, body) }
    })
    .await;
    (addr, seen)
}

/// Mock DNS server on an ephemeral UDP port.
///
/// Answers `SRV` queries for `query` with `records` (each record's name is
/// its target) and `A` queries for those targets with the record's ip.
/// Any other name is NXDOMAIN.
pub async fn start_mock_dns(query: &str, records: Vec<SrvRecord>) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let query = dns_name(query);

    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Ok(request) = Message::from_bytes(&buf[..n]) else {
                continue;
            };
            let response = answer_dns(&request, &query, &records);
            if let Ok(bytes) = response.to_bytes() {
                let _ = socket.send_to(&bytes, peer).await;
            }
        }
    });

    addr
}

fn dns_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

fn answer_dns(request: &Message, srv_name: &str, records: &[SrvRecord]) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_authoritative(true);

    let mut known = false;
    for q in request.queries() {
        response.add_query(q.clone());
        let name = dns_name(&q.name().to_ascii());

        if name == srv_name {
            known = true;
            if q.query_type() == RecordType::SRV {
                for r in records {
                    let target = Name::from_ascii(format!("{}.", r.name)).unwrap();
                    let rdata = RData::SRV(SRV::new(r.priority, r.weight, r.port, target));
                    response.add_answer(Record::from_rdata(q.name().clone(), 30, rdata));
                }
            }
        }

        for r in records.iter().filter(|r| dns_name(&r.name) == name) {
            known = true;
            if q.query_type() == RecordType::A {
                if let Ok(ip) = r.ip.parse::<Ipv4Addr>() {
                    let rdata = RData::A(A::from(ip));
                    response.add_answer(Record::from_rdata(q.name().clone(), 30, rdata));
                }
            }
        }
    }

    if !known {
        response.set_response_code(ResponseCode::NXDomain);
    }
    response
}

pub fn instance(id: &str, address: &str, port: u16, statuses: &[CheckStatus]) -> ServiceInstance {
    ServiceInstance {
        id: id.to_string(),
        address: address.to_string(),
        port,
        tags: Vec::new(),
        checks: statuses.iter().map(|s| HealthCheck::new(*s, "")).collect(),
    }
}

pub fn healthy(id: &str, address: &str, port: u16) -> ServiceInstance {
    instance(id, address, port, &[CheckStatus::Passing])
}

pub fn srv(name: &str, ip: &str, port: u16, priority: u16, weight: u16) -> SrvRecord {
    SrvRecord {
        name: name.to_string(),
        ip: ip.to_string(),
        port,
        priority,
        weight,
    }
}

pub fn service(
    name: &str,
    instances: Vec<ServiceInstance>,
    srv: Vec<SrvRecord>,
) -> CatalogService {
    CatalogService {
        name: name.to_string(),
        instances,
        srv,
    }
}

/// Observer that keeps every suppressed stage for assertions.
#[derive(Default)]
pub struct RecordingObserver {
    pub suppressed: Mutex<Vec<(Stage, String)>>,
}

impl RecordingObserver {
    pub fn stages(&self) -> Vec<Stage> {
        self.suppressed.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }
}

impl SelectionObserver for RecordingObserver {
    fn on_suppressed(&self, stage: Stage, subject: &str, _error: &(dyn std::error::Error + 'static)) {
        self.suppressed.lock().unwrap().push((stage, subject.to_string()));
    }
}

/// Provider that always fails.
pub struct FailingProvider;

#[async_trait]
impl HealthProvider for FailingProvider {
    async fn get_health_checks(&self, _service: &str) -> ProviderResult<Vec<ServiceInstance>> {
        Err(ProviderError::InvalidResponse("directory unavailable".into()))
    }
}

#[async_trait]
impl DnsProvider for FailingProvider {
    async fn resolve_dns(&self, _service: &str) -> ProviderResult<Vec<SrvRecord>> {
        Err(ProviderError::InvalidResponse("dns unavailable".into()))
    }
}

/// Provider that never answers within any reasonable deadline.
pub struct HangingProvider;

#[async_trait]
impl HealthProvider for HangingProvider {
    async fn get_health_checks(&self, _service: &str) -> ProviderResult<Vec<ServiceInstance>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}
