use crate::base::neterror::NetError;

#[test]
fn test_net_error_roundtrip() {
    let original = NetError::ConnectionRefused;
    let code = original.as_i32();
    assert_eq!(code, -102);
    let converted = NetError::from(code);
    assert!(matches!(converted, NetError::ConnectionRefused));

    let timeout = NetError::ConnectionTimedOut;
    assert_eq!(NetError::from(timeout.as_i32()), timeout);
}

#[test]
fn test_unknown_error() {
    let err = NetError::from(-9999);
    assert!(matches!(err, NetError::Unknown(-9999)));
    assert_eq!(err.as_i32(), -9999);

    // Codes a probe never produces are not modelled.
    assert_eq!(NetError::from(-106), NetError::Unknown(-106));
    assert_eq!(NetError::from(-320), NetError::Unknown(-320));
}

#[test]
fn test_transient_classification() {
    assert!(NetError::ConnectionReset.is_transient());
    assert!(NetError::NameNotResolved.is_transient());
    assert!(NetError::SslProtocolError.is_transient());
    assert!(!NetError::InvalidUrl.is_transient());
    assert!(!NetError::UnknownUrlScheme.is_transient());
}

#[test]
fn test_from_io_kinds() {
    use std::io::{Error, ErrorKind};

    let reset = Error::new(ErrorKind::ConnectionReset, "rst");
    assert_eq!(NetError::from_io(&reset), NetError::ConnectionReset);

    let eof = Error::new(ErrorKind::UnexpectedEof, "eof");
    assert_eq!(NetError::from_io(&eof), NetError::ConnectionClosed);
}
