//! OpenID Connect token issuance against the runner's token endpoint.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::contract::TokenBroker;
use crate::env::{self, RunnerEnvironment};
use crate::error::ToolkitError;
use crate::http;

/// Broker backed by `ACTIONS_ID_TOKEN_REQUEST_URL`.
pub struct RunnerTokenBroker {
    client: Client,
    env: RunnerEnvironment,
}

impl RunnerTokenBroker {
    /// Wires the broker against a captured environment.
    pub fn new(client: Client, env: RunnerEnvironment) -> Self {
        Self { client, env }
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenResponse {
    value: Option<String>,
}

#[async_trait]
impl TokenBroker for RunnerTokenBroker {
    async fn id_token(&self, audience: Option<&str>) -> Result<String, ToolkitError> {
        let endpoint = env::require(
            self.env.id_token_url.as_ref(),
            "ACTIONS_ID_TOKEN_REQUEST_URL",
        )?;
        let bearer = env::require(
            self.env.id_token_request_token.as_ref(),
            "ACTIONS_ID_TOKEN_REQUEST_TOKEN",
        )?;
        let mut url = Url::parse(endpoint).map_err(|error| {
            ToolkitError::configuration(format!(
                "`ACTIONS_ID_TOKEN_REQUEST_URL` is not a valid URL: {error}"
            ))
        })?;
        if let Some(audience) = audience {
            url.query_pairs_mut().append_pair("audience", audience);
        }
        debug!(%url, "requesting identity token");
        let response = self
            .client
            .get(url)
            .bearer_auth(bearer)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|error| http::send_failure("identity token", error))?;
        let response = http::ensure_status(response, "identity token")?;
        let body: IdTokenResponse = response.json().await.map_err(|error| {
            ToolkitError::http_with("identity token response was not valid JSON", error)
        })?;
        body.value.ok_or_else(|| {
            ToolkitError::http("identity token response did not include a value")
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    use super::*;

    /// Serves exactly one canned JSON response and hands back the raw request.
    fn serve_once(body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener address");
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept connection");
            let mut request = Vec::new();
            let mut buffer = [0_u8; 1024];
            loop {
                let read = stream.read(&mut buffer).expect("read request");
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buffer[..read]);
                if request.windows(4).any(|window| window == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).expect("write response");
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}/token"), handle)
    }

    fn broker_for(endpoint: String) -> RunnerTokenBroker {
        let env = RunnerEnvironment {
            id_token_url: Some(endpoint),
            id_token_request_token: Some("request-bearer".to_owned()),
            ..RunnerEnvironment::default()
        };
        RunnerTokenBroker::new(crate::http::client().expect("client builds"), env)
    }

    #[tokio::test]
    async fn issues_a_token_and_sends_the_audience() {
        let (endpoint, served) = serve_once(r#"{"value":"abc123"}"#);
        let token = broker_for(endpoint)
            .id_token(Some("deploy"))
            .await
            .expect("token should issue");
        assert_eq!(token, "abc123");

        let request = served.join().expect("server thread");
        assert!(request.contains("audience=deploy"));
        let authorised = request
            .lines()
            .any(|line| line.eq_ignore_ascii_case("authorization: Bearer request-bearer"));
        assert!(authorised, "missing bearer header in: {request}");
    }

    #[tokio::test]
    async fn value_free_responses_are_rejected() {
        let (endpoint, served) = serve_once(r#"{"count":1}"#);
        let error = broker_for(endpoint)
            .id_token(None)
            .await
            .expect_err("response carries no token");
        assert_eq!(
            error.to_string(),
            "identity token response did not include a value"
        );
        served.join().expect("server thread");
    }

    #[tokio::test]
    async fn missing_environment_reports_configuration() {
        let broker = RunnerTokenBroker::new(
            crate::http::client().expect("client builds"),
            RunnerEnvironment::default(),
        );
        let error = broker.id_token(None).await.expect_err("no endpoint configured");
        let fault: shuttle_protocol::Fault = error.into();
        assert_eq!(
            fault.reason(),
            "Configuration: environment variable `ACTIONS_ID_TOKEN_REQUEST_URL` is not set"
        );
    }
}
