use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::{Name, Resolve};
use crate::socket::client::SocketType;
use crate::socket::tls::TlsConfig;
use boring::ssl::{SslConnector, SslMethod};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use url::Url;

/// Opens the connection for one probe: DNS -> TCP -> TLS.
/// Roughly equivalent to net::ConnectJob.
pub struct ConnectJob {
    resolver: Arc<dyn Resolve>,
    tls: TlsConfig,
}

impl ConnectJob {
    pub fn new(resolver: Arc<dyn Resolve>, tls: TlsConfig) -> Self {
        Self { resolver, tls }
    }

    pub async fn connect(&self, url: &Url) -> Result<SocketType, NetError> {
        let secure = match url.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(NetError::UnknownUrlScheme),
        };
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

        // 1. DNS Resolution
        let addrs = self.resolver.resolve(Name::new(host)).await?;

        // 2. TCP Connect, first address that answers wins
        let mut last_err = NetError::NameNotResolved;
        let mut stream = None;
        for mut addr in addrs {
            addr.set_port(port);
            match Self::connect_tcp(addr, host).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = e,
            }
        }
        let stream = stream.ok_or(last_err)?;

        // 3. SSL Handshake (if https)
        if !secure {
            return Ok(SocketType::Tcp(stream));
        }

        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
        self.tls.apply_to_builder(&mut builder)?;
        let connector = builder.build();

        let mut config = connector
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        if !TlsConfig::should_set_sni(host) {
            config.set_use_server_name_indication(false);
            config.set_verify_hostname(false);
        }

        let tls_stream = tokio_boring::connect(config, host, stream)
            .await
            .map_err(|e| {
                tracing::debug!(host = %host, error = ?e, "TLS handshake failed");
                NetError::SslProtocolError
            })?;

        Ok(SocketType::Ssl(tls_stream))
    }

    async fn connect_tcp(addr: SocketAddr, host: &str) -> Result<TcpStream, NetError> {
        let stream = TcpStream::connect(addr)
            .await
            .connection_context(host, addr.port())?;
        // Probes are a single small request, Nagle only adds latency.
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }
}
