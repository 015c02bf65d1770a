//! Forward HTTP proxy acting as a shell host session.
//!
//! The embedded renderer is pointed at this proxy. Requests arrive either in
//! absolute form (`http://` or `https://`) or inside CONNECT tunnels, which
//! are terminated with a certificate from the session's interception CA.
//! Either way each request raises the before-send-headers event, is
//! forwarded upstream, and raises the headers-received event on the way
//! back, including the gateway errors the proxy produces itself. Upstream
//! TLS failures raise the certificate-error event.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::header::{HeaderMap, HeaderValue, CONNECTION, HOST};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::config::ProxyConfig;
use crate::error::ShellPolicyError;
use crate::host::ca::CertificateAuthority;
use crate::host::tls::client_config;
use crate::pipeline::{HandlerSlots, SessionHandle};
use crate::policy::{
    CertificateHandler, InboundResponse, OutboundRequest, RequestHandler, ResponseHandler,
};

type ProxyBody = BoxBody<Bytes, hyper::Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connection-scoped headers that must not reach the upstream server.
const HOP_BY_HOP_HEADERS: [&str; 7] = [
    "connection",
    "proxy-connection",
    "proxy-authorization",
    "keep-alive",
    "te",
    "trailer",
    "upgrade",
];

/// State shared by every connection the proxy serves.
struct Upstream {
    slots: Arc<HandlerSlots>,
    tls: TlsConnector,
    /// Present when CONNECT tunnels are intercepted.
    ca: Option<Arc<CertificateAuthority>>,
}

/// Where an intercepted request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    secure: bool,
}

/// Proxy server session.
pub struct ProxySession {
    listener: Option<TcpListener>,
    addr: SocketAddr,
    upstream: Arc<Upstream>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ProxySession {
    /// Bind the proxy on localhost. Port 0 picks any free port.
    pub async fn bind(config: &ProxyConfig) -> Result<Self, ShellPolicyError> {
        let listener = TcpListener::bind(("127.0.0.1", config.listen_port)).await?;
        let addr = listener.local_addr()?;

        let slots = Arc::new(HandlerSlots::new());
        let tls = TlsConnector::from(Arc::new(client_config(slots.clone())?));
        let ca = if config.intercept_connect {
            let provider = Arc::new(rustls::crypto::ring::default_provider());
            Some(Arc::new(CertificateAuthority::generate(provider)?))
        } else {
            None
        };

        tracing::debug!(
            "Proxy session listening on {} (intercept CONNECT: {})",
            addr,
            ca.is_some()
        );

        Ok(Self {
            listener: Some(listener),
            addr,
            upstream: Arc::new(Upstream { slots, tls, ca }),
            shutdown_tx: None,
        })
    }

    /// Get the address the proxy is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Authority that signs intercepted CONNECT traffic, if enabled.
    pub fn certificate_authority(&self) -> Option<&CertificateAuthority> {
        self.upstream.ca.as_deref()
    }

    /// Start serving connections.
    pub fn start(&mut self) -> Result<(), ShellPolicyError> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| ShellPolicyError::Proxy("Proxy already started".to_string()))?;

        let upstream = self.upstream.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                let upstream = upstream.clone();
                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(stream, upstream).await {
                                        tracing::debug!("Connection error from {}: {}", addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Proxy session shutting down");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop the proxy server.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ProxySession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SessionHandle for ProxySession {
    fn on_before_send_headers(&self, handler: Arc<dyn RequestHandler>) {
        self.upstream.slots.on_before_send_headers(handler);
    }

    fn on_headers_received(&self, handler: Arc<dyn ResponseHandler>) {
        self.upstream.slots.on_headers_received(handler);
    }

    fn on_certificate_error(&self, handler: Arc<dyn CertificateHandler>) {
        self.upstream.slots.on_certificate_error(handler);
    }
}

/// Handle a single proxy connection.
async fn handle_connection(stream: TcpStream, upstream: Arc<Upstream>) -> Result<(), BoxError> {
    let io = TokioIo::new(stream);

    http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .serve_connection(
            io,
            service_fn(move |req| {
                let upstream = upstream.clone();
                async move { handle_request(req, upstream).await }
            }),
        )
        .with_upgrades()
        .await?;

    Ok(())
}

/// Handle a single HTTP request.
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    upstream: Arc<Upstream>,
) -> Result<Response<ProxyBody>, hyper::Error> {
    if req.method() == Method::CONNECT {
        handle_connect(req, upstream).await
    } else {
        handle_http(req, upstream).await
    }
}

/// Accept a CONNECT tunnel, then intercept or relay what flows through it.
async fn handle_connect(
    req: Request<hyper::body::Incoming>,
    upstream: Arc<Upstream>,
) -> Result<Response<ProxyBody>, hyper::Error> {
    let host = req.uri().host().unwrap_or_default().to_string();
    let port = req.uri().port_u16().unwrap_or(443);

    if host.is_empty() {
        return Ok(status_response(StatusCode::BAD_REQUEST, "CONNECT target missing"));
    }

    tokio::task::spawn(async move {
        let upgraded = match hyper::upgrade::on(req).await {
            Ok(upgraded) => upgraded,
            Err(e) => {
                tracing::debug!("Upgrade error: {}", e);
                return;
            }
        };

        let result = match upstream.ca.clone() {
            Some(ca) => {
                tracing::debug!("CONNECT {}:{} intercepted", host, port);
                serve_intercepted(upgraded, host, port, ca, upstream).await
            }
            None => {
                tracing::debug!("CONNECT {}:{} relayed without interception", host, port);
                tunnel(upgraded, &host, port).await
            }
        };
        if let Err(e) = result {
            tracing::debug!("Tunnel error: {}", e);
        }
    });

    Ok(Response::new(empty_body()))
}

/// Tunnel data between upgraded connection and target.
async fn tunnel(upgraded: hyper::upgrade::Upgraded, host: &str, port: u16) -> Result<(), BoxError> {
    let mut target = TcpStream::connect((host, port)).await?;
    let mut upgraded = TokioIo::new(upgraded);

    tokio::io::copy_bidirectional(&mut upgraded, &mut target).await?;

    Ok(())
}

/// Terminate TLS inside a tunnel and serve the decrypted requests.
async fn serve_intercepted(
    upgraded: hyper::upgrade::Upgraded,
    host: String,
    port: u16,
    ca: Arc<CertificateAuthority>,
    upstream: Arc<Upstream>,
) -> Result<(), BoxError> {
    let acceptor = TlsAcceptor::from(ca.server_config(&host)?);
    let stream = acceptor.accept(TokioIo::new(upgraded)).await?;

    let authority = if port == 443 {
        host.clone()
    } else {
        format!("{}:{}", host, port)
    };
    let target = Target {
        host: bare_host(&host).to_string(),
        port,
        secure: true,
    };

    http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .serve_connection(
            TokioIo::new(stream),
            service_fn(move |req: Request<hyper::body::Incoming>| {
                let upstream = upstream.clone();
                let target = target.clone();
                let uri = absolute_uri(&authority, req.uri());
                async move {
                    match uri {
                        Some(uri) => intercept(req, uri, target, upstream).await,
                        None => Ok(status_response(StatusCode::BAD_REQUEST, "Invalid request target")),
                    }
                }
            }),
        )
        .await?;

    Ok(())
}

/// Handle absolute-form requests.
async fn handle_http(
    req: Request<hyper::body::Incoming>,
    upstream: Arc<Upstream>,
) -> Result<Response<ProxyBody>, hyper::Error> {
    let uri = req.uri().clone();
    match target(&uri) {
        Some(target) => intercept(req, uri, target, upstream).await,
        None => {
            tracing::debug!("Rejected non-proxy request for {}", uri);
            Ok(status_response(
                StatusCode::BAD_REQUEST,
                "Expected an absolute http:// or https:// URI",
            ))
        }
    }
}

/// Rewrite, forward, inject.
async fn intercept(
    req: Request<hyper::body::Incoming>,
    uri: Uri,
    target: Target,
    upstream: Arc<Upstream>,
) -> Result<Response<ProxyBody>, hyper::Error> {
    let (mut parts, body) = req.into_parts();

    strip_hop_by_hop(&mut parts.headers);
    let outbound = upstream.slots.before_send_headers(
        OutboundRequest::new(parts.method.clone(), uri.clone()).with_headers(parts.headers),
    );
    parts.headers = outbound.headers;

    if !parts.headers.contains_key(HOST) {
        if let Some(authority) = uri.authority() {
            if let Ok(value) = HeaderValue::from_str(authority.as_str()) {
                parts.headers.insert(HOST, value);
            }
        }
    }
    parts.uri = origin_form(&uri);

    tracing::debug!("{} {}:{}{}", parts.method, target.host, target.port, parts.uri);

    let response = match forward(Request::from_parts(parts, body), &target, &upstream).await {
        Ok(response) => response.map(|body| body.boxed()),
        Err(gateway_error) => gateway_error,
    };

    let (mut parts, body) = response.into_parts();
    let inbound = upstream
        .slots
        .headers_received(InboundResponse::new(uri, parts.status).with_headers(parts.headers));
    parts.headers = inbound.headers;

    Ok(Response::from_parts(parts, body))
}

/// Connect to the target and send the request.
///
/// Failures are returned as ready-made gateway responses.
async fn forward(
    req: Request<hyper::body::Incoming>,
    target: &Target,
    upstream: &Upstream,
) -> Result<Response<hyper::body::Incoming>, Response<ProxyBody>> {
    let stream = TcpStream::connect((target.host.as_str(), target.port))
        .await
        .map_err(|e| {
            tracing::debug!("Failed to connect to {}:{}: {}", target.host, target.port, e);
            status_response(StatusCode::BAD_GATEWAY, "Failed to connect to target")
        })?;

    if !target.secure {
        return send_upstream(stream, req).await;
    }

    let server_name = rustls::pki_types::ServerName::try_from(target.host.clone()).map_err(|e| {
        tracing::debug!("Invalid TLS server name {}: {}", target.host, e);
        status_response(StatusCode::BAD_REQUEST, "Invalid host name")
    })?;
    let tls_stream = upstream.tls.connect(server_name, stream).await.map_err(|e| {
        tracing::debug!("TLS handshake with {} failed: {}", target.host, e);
        status_response(StatusCode::BAD_GATEWAY, "TLS handshake failed")
    })?;

    send_upstream(tls_stream, req).await
}

/// Send a request over an established upstream connection.
async fn send_upstream<T>(
    stream: T,
    req: Request<hyper::body::Incoming>,
) -> Result<Response<hyper::body::Incoming>, Response<ProxyBody>>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let io = TokioIo::new(stream);

    let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("Handshake error: {}", e);
            return Err(status_response(StatusCode::BAD_GATEWAY, "Handshake failed"));
        }
    };

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("Connection error: {}", e);
        }
    });

    sender.send_request(req).await.map_err(|e| {
        tracing::debug!("Request error: {}", e);
        status_response(StatusCode::BAD_GATEWAY, "Request failed")
    })
}

/// Remove headers scoped to the client-proxy connection, including any
/// named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in listed.iter().map(String::as_str).chain(HOP_BY_HOP_HEADERS) {
        headers.remove(name);
    }
}

/// Target of an absolute-form URI.
fn target(uri: &Uri) -> Option<Target> {
    let secure = match uri.scheme_str() {
        Some("http") => false,
        Some("https") => true,
        _ => return None,
    };
    let host = uri.host().filter(|h| !h.is_empty())?;
    let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });

    Some(Target {
        host: bare_host(host).to_string(),
        port,
        secure,
    })
}

/// Bracketed IPv6 literals connect without the brackets.
fn bare_host(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

/// Rebuild the `https://` URI of a request received inside a tunnel.
fn absolute_uri(authority: &str, inner: &Uri) -> Option<Uri> {
    let path = inner.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Uri::builder()
        .scheme("https")
        .authority(authority)
        .path_and_query(path)
        .build()
        .ok()
}

/// Strip scheme and authority, leaving path and query.
fn origin_form(uri: &Uri) -> Uri {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    path.parse().unwrap_or_else(|_| Uri::from_static("/"))
}

fn status_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    let mut response = Response::new(full_body(message));
    *response.status_mut() = status;
    response
}

fn empty_body() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

fn full_body(s: &str) -> ProxyBody {
    Full::new(Bytes::from(s.to_string()))
        .map_err(|never| match never {})
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use hyper::body::Incoming;
    use hyper::header::{ACCESS_CONTROL_ALLOW_ORIGIN, PRAGMA, PROXY_AUTHORIZATION, USER_AGENT};
    use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
    use rustls::{ClientConfig, RootCertStore, ServerConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::config::schema::DEFAULT_USER_AGENT;
    use crate::pipeline::InterceptionPipeline;

    /// Echo what the upstream received into response headers.
    async fn echo(req: Request<Incoming>) -> Result<Response<ProxyBody>, Infallible> {
        let mut resp = Response::new(full_body("ok"));
        let headers = resp.headers_mut();
        if let Some(ua) = req.headers().get(USER_AGENT) {
            headers.insert("x-seen-user-agent", ua.clone());
        }
        if let Some(keep) = req.headers().get("x-keep") {
            headers.insert("x-seen-keep", keep.clone());
        }
        for name in ["proxy-connection", "proxy-authorization", "x-drop-me"] {
            if req.headers().contains_key(name) {
                headers.insert("x-seen-hop-by-hop", HeaderValue::from_static(name));
            }
        }
        if let Ok(uri) = HeaderValue::from_str(&req.uri().to_string()) {
            headers.insert("x-seen-uri", uri);
        }
        headers.insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://origin.example"),
        );
        Ok(resp)
    }

    async fn spawn_upstream() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service_fn(echo))
                        .await;
                });
            }
        });

        addr
    }

    /// HTTPS echo upstream presenting a self-signed certificate for localhost.
    async fn spawn_tls_upstream() -> SocketAddr {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        let config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![cert.der().clone()],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
        )
        .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    if let Ok(tls) = acceptor.accept(stream).await {
                        let _ = http1::Builder::new()
                            .serve_connection(TokioIo::new(tls), service_fn(echo))
                            .await;
                    }
                });
            }
        });

        addr
    }

    async fn start_proxy(config: &ProxyConfig) -> ProxySession {
        ProxySession::bind(config).await.unwrap()
    }

    async fn send_via_proxy(
        proxy: &ProxySession,
        req: Request<Empty<Bytes>>,
    ) -> Response<Incoming> {
        let stream = TcpStream::connect(proxy.local_addr()).await.unwrap();
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .unwrap();
        tokio::spawn(conn);
        sender.send_request(req).await.unwrap()
    }

    /// Open a CONNECT tunnel and return the raw stream once it is established.
    async fn open_tunnel(proxy: &ProxySession, authority: &str) -> TcpStream {
        let mut stream = TcpStream::connect(proxy.local_addr()).await.unwrap();
        stream
            .write_all(format!("CONNECT {0} HTTP/1.1\r\nHost: {0}\r\n\r\n", authority).as_bytes())
            .await
            .unwrap();

        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            stream.read_exact(&mut byte).await.unwrap();
            head.push(byte[0]);
        }
        assert!(head.starts_with(b"HTTP/1.1 200"));

        stream
    }

    /// Send `GET /x` through a tunnel, trusting the proxy's CA.
    async fn send_through_tunnel(proxy: &ProxySession, upstream: SocketAddr) -> Response<Incoming> {
        let authority = format!("localhost:{}", upstream.port());
        let stream = open_tunnel(proxy, &authority).await;

        let mut roots = RootCertStore::empty();
        roots
            .add(proxy.certificate_authority().unwrap().cert_der().clone())
            .unwrap();
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();

        let tls = TlsConnector::from(Arc::new(config))
            .connect(ServerName::try_from("localhost").unwrap(), stream)
            .await
            .unwrap();
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(tls))
            .await
            .unwrap();
        tokio::spawn(conn);

        let req = Request::builder()
            .uri("/x")
            .header(HOST, authority)
            .header(USER_AGENT, "curl/7")
            .body(Empty::<Bytes>::new())
            .unwrap();
        sender.send_request(req).await.unwrap()
    }

    #[test]
    fn test_target_parsing() {
        let uri: Uri = "http://example.com/a?b=1".parse().unwrap();
        assert_eq!(
            target(&uri),
            Some(Target {
                host: "example.com".to_string(),
                port: 80,
                secure: false
            })
        );

        let uri: Uri = "https://[::1]:8443/".parse().unwrap();
        assert_eq!(
            target(&uri),
            Some(Target {
                host: "::1".to_string(),
                port: 8443,
                secure: true
            })
        );

        let uri: Uri = "/relative".parse().unwrap();
        assert_eq!(target(&uri), None);

        let uri: Uri = "ftp://example.com/".parse().unwrap();
        assert_eq!(target(&uri), None);
    }

    #[test]
    fn test_origin_form() {
        let uri: Uri = "http://example.com/v1/items?page=2".parse().unwrap();
        assert_eq!(origin_form(&uri), "/v1/items?page=2");

        let uri: Uri = "http://example.com".parse().unwrap();
        assert_eq!(origin_form(&uri), "/");
    }

    #[test]
    fn test_absolute_uri_for_tunnelled_request() {
        let inner: Uri = "/v1/chat?stream=true".parse().unwrap();
        let uri = absolute_uri("api.deepseek.com", &inner).unwrap();
        assert_eq!(uri, "https://api.deepseek.com/v1/chat?stream=true");

        let uri = absolute_uri("localhost:8443", &"/".parse().unwrap()).unwrap();
        assert_eq!(uri.port_u16(), Some(8443));
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, X-Drop-Me"));
        headers.insert("proxy-connection", HeaderValue::from_static("keep-alive"));
        headers.insert(PROXY_AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-drop-me", HeaderValue::from_static("1"));
        headers.insert("x-keep", HeaderValue::from_static("Yes"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-keep").unwrap(), "Yes");
    }

    #[tokio::test]
    async fn test_proxy_applies_pipeline() {
        let upstream = spawn_upstream().await;

        let mut proxy = start_proxy(&ProxyConfig::default()).await;
        let _pipeline = InterceptionPipeline::new().register(&proxy);
        proxy.start().unwrap();

        let req = Request::builder()
            .method(Method::GET)
            .uri(format!("http://{}/data?x=1", upstream))
            .header(HOST, upstream.to_string())
            .header(USER_AGENT, "curl/7")
            .header(PRAGMA, "max-age=3")
            .header("x-keep", "Yes")
            .body(Empty::<Bytes>::new())
            .unwrap();

        let resp = send_via_proxy(&proxy, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers.get("x-seen-user-agent").unwrap(), DEFAULT_USER_AGENT);
        assert_eq!(headers.get("x-seen-keep").unwrap(), "Yes");
        assert_eq!(headers.get("x-seen-uri").unwrap(), "/data?x=1");

        let origins: Vec<_> = headers.get_all(ACCESS_CONTROL_ALLOW_ORIGIN).iter().collect();
        assert_eq!(origins, vec!["https://origin.example", "*"]);
        assert_eq!(
            headers.get("access-control-allow-credentials").unwrap(),
            "true"
        );

        proxy.stop();
    }

    #[tokio::test]
    async fn test_proxy_drops_proxy_only_headers() {
        let upstream = spawn_upstream().await;

        let mut proxy = start_proxy(&ProxyConfig::default()).await;
        let _pipeline = InterceptionPipeline::new().register(&proxy);
        proxy.start().unwrap();

        let req = Request::builder()
            .uri(format!("http://{}/", upstream))
            .header(HOST, upstream.to_string())
            .header("proxy-connection", "keep-alive")
            .header(PROXY_AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .body(Empty::<Bytes>::new())
            .unwrap();

        let resp = send_via_proxy(&proxy, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("x-seen-hop-by-hop").is_none());
    }

    #[tokio::test]
    async fn test_proxy_without_pipeline_passes_through() {
        let upstream = spawn_upstream().await;

        let mut proxy = start_proxy(&ProxyConfig::default()).await;
        proxy.start().unwrap();

        let req = Request::builder()
            .uri(format!("http://{}/plain", upstream))
            .header(HOST, upstream.to_string())
            .header(USER_AGENT, "curl/7")
            .body(Empty::<Bytes>::new())
            .unwrap();

        let resp = send_via_proxy(&proxy, req).await;

        assert_eq!(resp.headers().get("x-seen-user-agent").unwrap(), "curl/7");
        assert_eq!(
            resp.headers().get_all(ACCESS_CONTROL_ALLOW_ORIGIN).iter().count(),
            1
        );
    }

    #[tokio::test]
    async fn test_proxy_rejects_origin_form_request() {
        let mut proxy = start_proxy(&ProxyConfig::default()).await;
        proxy.start().unwrap();

        let req = Request::builder()
            .uri("/no-authority")
            .header(HOST, "localhost")
            .body(Empty::<Bytes>::new())
            .unwrap();

        let resp = send_via_proxy(&proxy, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_proxy_reports_unreachable_upstream() {
        // bind then drop to get a port nothing listens on
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();

        let mut proxy = start_proxy(&ProxyConfig::default()).await;
        let _pipeline = InterceptionPipeline::new().register(&proxy);
        proxy.start().unwrap();

        let req = Request::builder()
            .uri(format!("http://{}/", closed))
            .header(HOST, closed.to_string())
            .body(Empty::<Bytes>::new())
            .unwrap();

        let resp = send_via_proxy(&proxy, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }

    #[tokio::test]
    async fn test_connect_tunnel_is_intercepted() {
        let upstream = spawn_tls_upstream().await;

        let mut proxy = start_proxy(&ProxyConfig::default()).await;
        let _pipeline = InterceptionPipeline::new().insecure(true).register(&proxy);
        proxy.start().unwrap();

        let resp = send_through_tunnel(&proxy, upstream).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers.get("x-seen-user-agent").unwrap(), DEFAULT_USER_AGENT);
        assert_eq!(headers.get("x-seen-uri").unwrap(), "/x");

        let origins: Vec<_> = headers.get_all(ACCESS_CONTROL_ALLOW_ORIGIN).iter().collect();
        assert_eq!(origins, vec!["https://origin.example", "*"]);
        assert!(headers.contains_key("access-control-allow-methods"));
    }

    #[tokio::test]
    async fn test_connect_tunnel_keeps_certificate_failure_when_secure() {
        let upstream = spawn_tls_upstream().await;

        let mut proxy = start_proxy(&ProxyConfig::default()).await;
        let _pipeline = InterceptionPipeline::new().register(&proxy);
        proxy.start().unwrap();

        let resp = send_through_tunnel(&proxy, upstream).await;

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(resp.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }

    #[tokio::test]
    async fn test_connect_relayed_when_interception_disabled() {
        let upstream = spawn_upstream().await;

        let config = ProxyConfig {
            intercept_connect: false,
            ..ProxyConfig::default()
        };
        let mut proxy = start_proxy(&config).await;
        let _pipeline = InterceptionPipeline::new().register(&proxy);
        proxy.start().unwrap();
        assert!(proxy.certificate_authority().is_none());

        let stream = open_tunnel(&proxy, &upstream.to_string()).await;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .unwrap();
        tokio::spawn(conn);

        let req = Request::builder()
            .uri("/x")
            .header(HOST, upstream.to_string())
            .header(USER_AGENT, "curl/7")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let resp = sender.send_request(req).await.unwrap();

        assert_eq!(resp.headers().get("x-seen-user-agent").unwrap(), "curl/7");
        assert_eq!(
            resp.headers().get_all(ACCESS_CONTROL_ALLOW_ORIGIN).iter().count(),
            1
        );
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut proxy = start_proxy(&ProxyConfig::default()).await;
        proxy.start().unwrap();
        assert!(matches!(proxy.start(), Err(ShellPolicyError::Proxy(_))));
    }
}
