use super::{Probe, ProbeResponse, Probing, CANISTER_ID_HEADER};
use crate::base::neterror::NetError;
use crate::dns::{HickoryResolver, Resolve};
use crate::socket::connectjob::ConnectJob;
use crate::socket::tls::TlsConfig;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, HOST, USER_AGENT};
use http::{Method, Request};
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const PROBE_USER_AGENT: &str = concat!("canisternet/", env!("CARGO_PKG_VERSION"));

/// `HEAD` probe over a fresh HTTP/1.1 connection.
///
/// No connection reuse and no cookie or credential headers: every probe is
/// an anonymous one-shot exchange.
#[derive(Clone)]
pub struct HttpProbe {
    connect: Arc<ConnectJob>,
    header: HeaderName,
    timeout: Option<Duration>,
}

impl HttpProbe {
    /// Probe using hickory-dns and default TLS settings.
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(HickoryResolver::new()), TlsConfig::default())
    }

    pub fn with_resolver(resolver: Arc<dyn Resolve>, tls: TlsConfig) -> Self {
        Self {
            connect: Arc::new(ConnectJob::new(resolver, tls)),
            header: HeaderName::from_static(CANISTER_ID_HEADER),
            timeout: None,
        }
    }

    /// Name of the allow-listed header to surface.
    ///
    /// Falls back to [`CANISTER_ID_HEADER`] if `name` is not a valid header name.
    pub fn canister_id_header(mut self, name: &str) -> Self {
        match HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()) {
            Ok(header) => self.header = header,
            Err(e) => tracing::warn!(header = %name, error = %e, "ignoring invalid header name"),
        }
        self
    }

    /// Overall deadline for one exchange (connect + response headers).
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(
        connect: Arc<ConnectJob>,
        header: HeaderName,
        url: Url,
    ) -> Result<ProbeResponse, NetError> {
        let socket = connect.connect(&url).await?;
        let io = TokioIo::new(socket);

        let (mut sender, conn) = http1::handshake(io).await.map_err(|e| map_hyper_error(&e))?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::trace!(error = %e, "probe connection closed with error");
            }
        });

        let request = Request::builder()
            .method(Method::HEAD)
            .uri(request_target(&url))
            .header(HOST, host_header(&url)?)
            .header(USER_AGENT, HeaderValue::from_static(PROBE_USER_AGENT))
            .body(Empty::<Bytes>::new())
            .map_err(|_| NetError::InvalidUrl)?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| map_hyper_error(&e))?;

        let status = response.status();
        let canister_id = response
            .headers()
            .get(&header)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        Ok(ProbeResponse::new(status, canister_id))
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe")
            .field("header", &self.header)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Probe for HttpProbe {
    fn head(&self, url: Url) -> Probing {
        let connect = Arc::clone(&self.connect);
        let header = self.header.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let exchange = Self::exchange(connect, header, url);
            match timeout {
                Some(limit) => tokio::time::timeout(limit, exchange)
                    .await
                    .map_err(|_| NetError::ConnectionTimedOut)?,
                None => exchange.await,
            }
        })
    }
}

/// Origin-form target: path plus query.
fn request_target(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

fn host_header(url: &Url) -> Result<HeaderValue, NetError> {
    let host = url.host_str().ok_or(NetError::InvalidUrl)?;
    let value = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).map_err(|_| NetError::InvalidUrl)
}

fn map_hyper_error(err: &hyper::Error) -> NetError {
    if err.is_parse() {
        NetError::InvalidHttpResponse
    } else if err.is_incomplete_message() {
        NetError::EmptyResponse
    } else if err.is_timeout() {
        NetError::ConnectionTimedOut
    } else if err.is_closed() || err.is_canceled() {
        NetError::ConnectionClosed
    } else {
        NetError::ConnectionFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_target() {
        let url = Url::parse("https://www.dappdomain.io/a/b?x=1#frag").unwrap();
        assert_eq!(request_target(&url), "/a/b?x=1");

        let root = Url::parse("https://www.dappdomain.io").unwrap();
        assert_eq!(request_target(&root), "/");
    }

    #[test]
    fn test_host_header_keeps_explicit_port() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(host_header(&url).unwrap(), "127.0.0.1:8080");

        let default_port = Url::parse("https://ic1.app:443/").unwrap();
        assert_eq!(host_header(&default_port).unwrap(), "ic1.app");
    }

    #[test]
    fn test_canister_id_header_override() {
        let probe = HttpProbe::new().canister_id_header("X-Custom-Canister");
        assert_eq!(probe.header.as_str(), "x-custom-canister");

        let fallback = HttpProbe::new().canister_id_header("bad header");
        assert_eq!(fallback.header.as_str(), CANISTER_ID_HEADER);
    }
}
