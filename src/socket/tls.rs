use crate::base::neterror::NetError;
use boring::ssl::{SslConnectorBuilder, SslVerifyMode, SslVersion};

/// TLS settings for probe connections.
///
/// Probes only ever speak HTTP/1.1, so ALPN advertises that alone.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: Option<SslVersion>,
    pub max_version: Option<SslVersion>,
    pub alpn_protos: Vec<String>,
    pub verify_peer: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: Some(SslVersion::TLS1_2),
            max_version: Some(SslVersion::TLS1_3),
            alpn_protos: vec!["http/1.1".to_string()],
            verify_peer: true,
        }
    }
}

impl TlsConfig {
    /// Apply this configuration to an SSL connector builder.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        if let Some(min) = self.min_version {
            builder
                .set_min_proto_version(Some(min))
                .map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(max) = self.max_version {
            builder
                .set_max_proto_version(Some(max))
                .map_err(|_| NetError::SslProtocolError)?;
        }

        if !self.alpn_protos.is_empty() {
            builder
                .set_alpn_protos(&Self::alpn_wire(&self.alpn_protos)?)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        builder.set_verify(if self.verify_peer {
            SslVerifyMode::PEER
        } else {
            SslVerifyMode::NONE
        });
        Ok(())
    }

    /// Length-prefixed ALPN protocol list.
    fn alpn_wire(protos: &[String]) -> Result<Vec<u8>, NetError> {
        let mut wire = Vec::new();
        for proto in protos {
            if proto.is_empty() || proto.len() > 255 {
                return Err(NetError::SslProtocolError);
            }
            wire.push(proto.len() as u8);
            wire.extend_from_slice(proto.as_bytes());
        }
        Ok(wire)
    }

    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        host.trim_matches(&['[', ']'][..])
            .parse::<std::net::IpAddr>()
            .is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpn_wire_format() {
        let wire = TlsConfig::alpn_wire(&["http/1.1".to_string()]).unwrap();
        assert_eq!(wire, b"\x08http/1.1");
    }

    #[test]
    fn test_alpn_rejects_empty_proto() {
        assert_eq!(
            TlsConfig::alpn_wire(&[String::new()]),
            Err(NetError::SslProtocolError)
        );
    }

    #[test]
    fn test_should_set_sni() {
        assert!(TlsConfig::should_set_sni("icp-api.io"));
        assert!(!TlsConfig::should_set_sni("127.0.0.1"));
        assert!(!TlsConfig::should_set_sni("[::1]"));
    }
}
