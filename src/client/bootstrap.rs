//! Relay discovery.
//!
//! Before connecting, the client asks a bootstrap service which relay node
//! serves its address:
//! - [`JsonRpcResolver`]: JSON-RPC 2.0 `getwsaddr` over HTTP/1.1
//! - [`StaticResolver`]: a fixed endpoint, for tests and pinned deployments

use futures::future::BoxFuture;

use crate::core::{EndpointResolver, LookupError};

/// Always resolves to the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResolver {
    endpoint: String,
}

impl StaticResolver {
    /// Resolve every address to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl EndpointResolver for StaticResolver {
    fn resolve<'a>(&'a self, _address: &'a str) -> BoxFuture<'a, Result<String, LookupError>> {
        Box::pin(async move { Ok(self.endpoint.clone()) })
    }
}

#[cfg(feature = "bootstrap")]
pub use json_rpc::JsonRpcResolver;

#[cfg(feature = "bootstrap")]
mod json_rpc {
    use super::*;

    use std::time::Duration;

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper::header::{CONTENT_TYPE, HOST};
    use hyper::{Method, Request};
    use hyper_util::rt::TokioIo;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use tokio::net::TcpStream;
    use tracing::debug;

    use crate::core::{DEFAULT_LOOKUP_TIMEOUT, DEFAULT_RPC_SERVER_ADDR, methods};

    #[derive(Serialize)]
    struct LookupRequest<'a> {
        jsonrpc: &'static str,
        id: u64,
        method: &'static str,
        params: LookupParams<'a>,
    }

    #[derive(Serialize)]
    struct LookupParams<'a> {
        address: &'a str,
    }

    #[derive(Deserialize)]
    struct LookupResponse {
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<LookupFault>,
    }

    #[derive(Deserialize)]
    struct LookupFault {
        code: i64,
        #[serde(default)]
        message: String,
    }

    /// Asks a JSON-RPC server for the websocket address serving a client.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct JsonRpcResolver {
        rpc_server_addr: String,
        timeout: Duration,
    }

    impl Default for JsonRpcResolver {
        fn default() -> Self {
            Self::new(DEFAULT_RPC_SERVER_ADDR)
        }
    }

    impl JsonRpcResolver {
        /// Query the server at `rpc_server_addr` (`host:port`, optionally
        /// prefixed with `http://`).
        pub fn new(rpc_server_addr: impl Into<String>) -> Self {
            Self {
                rpc_server_addr: rpc_server_addr.into(),
                timeout: DEFAULT_LOOKUP_TIMEOUT,
            }
        }

        /// Bound the whole lookup by `timeout`.
        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        /// The server being queried.
        pub fn rpc_server_addr(&self) -> &str {
            &self.rpc_server_addr
        }

        fn authority(&self) -> &str {
            let addr = self.rpc_server_addr.as_str();
            let addr = addr.strip_prefix("http://").unwrap_or(addr);
            addr.trim_end_matches('/')
        }

        async fn lookup(&self, address: &str) -> Result<String, LookupError> {
            let authority = self.authority();
            let body = serde_json::to_vec(&LookupRequest {
                jsonrpc: "2.0",
                id: 1,
                method: methods::GET_WS_ADDR,
                params: LookupParams { address },
            })
            .map_err(|e| LookupError::Unreachable(e.to_string()))?;

            let stream = TcpStream::connect(authority)
                .await
                .map_err(|e| LookupError::Unreachable(format!("{authority}: {e}")))?;
            let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
                .await
                .map_err(|e| LookupError::Unreachable(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(error = %e, "lookup connection ended");
                }
            });

            let request = Request::builder()
                .method(Method::POST)
                .uri("/")
                .header(HOST, authority)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(body)))
                .map_err(|e| LookupError::Unreachable(e.to_string()))?;

            let response = sender
                .send_request(request)
                .await
                .map_err(|e| LookupError::Unreachable(e.to_string()))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| LookupError::Unreachable(e.to_string()))?
                .to_bytes();
            if !status.is_success() {
                return Err(LookupError::Unreachable(format!("http status {status}")));
            }

            parse_ws_addr(&body)
        }
    }

    impl EndpointResolver for JsonRpcResolver {
        fn resolve<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<String, LookupError>> {
            Box::pin(async move {
                let endpoint = tokio::time::timeout(self.timeout, self.lookup(address))
                    .await
                    .map_err(|_| {
                        LookupError::Unreachable(format!(
                            "{} did not answer within {:?}",
                            self.rpc_server_addr, self.timeout
                        ))
                    })??;
                debug!(address, %endpoint, "relay endpoint resolved");
                Ok(endpoint)
            })
        }
    }

    /// The endpoint from a `getwsaddr` response body.
    ///
    /// Servers answer either with the bare `host:port` string or with an
    /// object carrying it under `addr`.
    fn parse_ws_addr(body: &[u8]) -> Result<String, LookupError> {
        let response: LookupResponse = serde_json::from_slice(body)
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;
        if let Some(fault) = response.error {
            return Err(LookupError::Rpc {
                code: fault.code,
                message: fault.message,
            });
        }

        let endpoint = match response.result {
            Some(Value::String(endpoint)) => endpoint,
            Some(Value::Object(mut fields)) => match fields.remove("addr") {
                Some(Value::String(endpoint)) => endpoint,
                _ => return Err(LookupError::InvalidResponse("result has no addr".into())),
            },
            Some(other) => {
                return Err(LookupError::InvalidResponse(format!("unexpected result {other}")));
            }
            None => return Err(LookupError::InvalidResponse("no result".into())),
        };
        if endpoint.is_empty() {
            return Err(LookupError::InvalidResponse("empty endpoint".into()));
        }
        Ok(endpoint)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use hyper::Response;
        use hyper::body::Incoming;
        use hyper::service::service_fn;
        use std::convert::Infallible;
        use tokio::net::TcpListener;

        #[test]
        fn test_parse_ws_addr() {
            assert_eq!(
                parse_ws_addr(br#"{"jsonrpc":"2.0","id":1,"result":"10.0.0.1:30002"}"#).unwrap(),
                "10.0.0.1:30002"
            );
            assert_eq!(
                parse_ws_addr(br#"{"result":{"addr":"10.0.0.2:30002","pubkey":"ab"}}"#).unwrap(),
                "10.0.0.2:30002"
            );
            assert_eq!(
                parse_ws_addr(br#"{"error":{"code":-45022,"message":"WRONG NODE"}}"#).unwrap_err(),
                LookupError::Rpc {
                    code: -45022,
                    message: "WRONG NODE".into()
                }
            );
            assert!(matches!(
                parse_ws_addr(b"<html>"),
                Err(LookupError::InvalidResponse(_))
            ));
            assert!(matches!(
                parse_ws_addr(br#"{"result":5}"#),
                Err(LookupError::InvalidResponse(_))
            ));
        }

        #[test]
        fn test_authority_strips_scheme() {
            assert_eq!(JsonRpcResolver::new("http://seed:30003/").authority(), "seed:30003");
            assert_eq!(JsonRpcResolver::new("seed:30003").authority(), "seed:30003");
        }

        async fn answer(request: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
            let body = request.into_body().collect().await.map(|b| b.to_bytes()).unwrap_or_default();
            let call: Value = serde_json::from_slice(&body).unwrap_or_default();
            let reply = if call["method"] == "getwsaddr" && call["params"]["address"] == "alice.ab" {
                r#"{"jsonrpc":"2.0","id":1,"result":"127.0.0.1:30002"}"#
            } else {
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"bad call"}}"#
            };
            Ok(Response::new(Full::new(Bytes::from(reply))))
        }

        #[tokio::test]
        async fn test_resolve_over_http() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(
                        hyper::server::conn::http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service_fn(answer)),
                    );
                }
            });

            let resolver = JsonRpcResolver::new(addr.to_string());
            assert_eq!(resolver.resolve("alice.ab").await.unwrap(), "127.0.0.1:30002");
            assert_eq!(
                resolver.resolve("bob.cd").await.unwrap_err(),
                LookupError::Rpc {
                    code: -32601,
                    message: "bad call".into()
                }
            );
        }

        #[tokio::test]
        async fn test_unreachable_server() {
            let addr = TcpListener::bind("127.0.0.1:0")
                .await
                .unwrap()
                .local_addr()
                .unwrap();

            let err = JsonRpcResolver::new(addr.to_string())
                .with_timeout(Duration::from_secs(2))
                .resolve("alice.ab")
                .await
                .unwrap_err();
            assert!(matches!(err, LookupError::Unreachable(_)));
        }
    }
}
