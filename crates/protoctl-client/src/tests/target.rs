// crates/protoctl-client/src/tests/target.rs
// ============================================================================
// Module: Target Tests
// Description: Protocol parsing and URL construction.
// Purpose: Ensure addresses map to the right scheme and method URL.
// Dependencies: protoctl-client
// ============================================================================

use crate::target::CallTarget;
use crate::target::Protocol;

#[test]
fn protocol_parses_cli_spellings() {
    assert_eq!("grpc".parse::<Protocol>(), Ok(Protocol::Grpc));
    assert_eq!("Connect".parse::<Protocol>(), Ok(Protocol::Connect));
    assert_eq!("grpcweb".parse::<Protocol>(), Ok(Protocol::GrpcWeb));
    assert_eq!("grpc-web".parse::<Protocol>(), Ok(Protocol::GrpcWeb));
    assert!("thrift".parse::<Protocol>().is_err());
    assert_eq!(Protocol::GrpcWeb.to_string(), "grpcweb");
}

#[test]
fn bare_addresses_get_a_scheme() {
    let tls = CallTarget::new("api.example.com:443", Protocol::Grpc, false);
    assert_eq!(tls.base_url(), "https://api.example.com:443");
    let plain = CallTarget::new("localhost:8080", Protocol::Connect, true);
    assert_eq!(plain.base_url(), "http://localhost:8080");
    assert_eq!(
        plain.method_url("/example.FooAPI/Hello"),
        "http://localhost:8080/example.FooAPI/Hello"
    );
}

#[test]
fn http_scheme_implies_plaintext() {
    let target = CallTarget::new("http://localhost:8080/", Protocol::GrpcWeb, false);
    assert!(target.plaintext());
    assert_eq!(target.base_url(), "http://localhost:8080");
    assert_eq!(target.address(), "http://localhost:8080/");
}
