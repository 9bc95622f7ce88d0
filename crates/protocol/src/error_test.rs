//! Tests for protocol error types

use std::io;

use crate::error::ProtocolError;

#[test]
fn test_connection_error_classification() {
    let err = ProtocolError::connection(
        "127.0.0.1:8081",
        io::Error::from(io::ErrorKind::ConnectionRefused),
    );
    assert!(err.is_connection_error());
    assert!(!err.is_transport_error());
    assert!(!err.is_recoverable());
}

#[test]
fn test_transport_error_classification() {
    let err = ProtocolError::from(io::Error::from(io::ErrorKind::BrokenPipe));
    assert!(err.is_transport_error());
    assert!(!err.is_connection_error());

    assert!(ProtocolError::ConnectionClosed.is_transport_error());
}

#[test]
fn test_unknown_frame_type_is_recoverable() {
    let err = ProtocolError::UnknownFrameType { code: 42, len: 3 };
    assert!(err.is_recoverable());
    assert!(!err.is_transport_error());
}

#[test]
fn test_frame_too_large_is_not_recoverable() {
    let err = ProtocolError::FrameTooLarge { size: 10, limit: 5 };
    assert!(!err.is_recoverable());
}

#[test]
fn test_error_display_connection() {
    let err = ProtocolError::connection(
        "127.0.0.1:8081",
        io::Error::from(io::ErrorKind::ConnectionRefused),
    );
    assert!(err.to_string().starts_with("failed to connect to 127.0.0.1:8081"));
}

#[test]
fn test_error_display_unknown_frame_type() {
    let err = ProtocolError::UnknownFrameType { code: 42, len: 3 };
    assert_eq!(
        err.to_string(),
        "unknown frame type 42 (3 byte payload discarded)"
    );
}

#[test]
fn test_error_display_invalid_payload() {
    let err = ProtocolError::invalid_payload("bad name");
    assert_eq!(err.to_string(), "invalid payload: bad name");
}
