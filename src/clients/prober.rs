//! HTTP client for the per-datacenter seed prober sidecar
//!
//! The prober holds two pieces of cluster-wide state for its datacenter: the
//! seed list Cassandra nodes boot with, and whether the local and remote
//! datacenters are ready.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{expect_status, expect_success, read_bool, read_json, send, Result};

#[async_trait]
pub trait ProberClient: Send + Sync {
    /// `GET /ping`. Non-200 answers mean not ready; transport failures are errors
    async fn ready(&self) -> Result<bool>;

    /// Seeds of the datacenter's own pods
    async fn local_seeds(&self) -> Result<Vec<String>>;

    /// Cluster-wide seed list currently held by the sidecar
    async fn seeds(&self) -> Result<Vec<String>>;

    async fn update_seeds(&self, seeds: &[String]) -> Result<()>;

    /// Readiness flag published for the local datacenter
    async fn local_dc_ready(&self) -> Result<bool>;

    async fn update_dc_status(&self, ready: bool) -> Result<()>;

    /// Whether this datacenter sees every datacenter as ready
    async fn dcs_ready(&self) -> Result<bool>;
}

pub trait ProberConnector: Send + Sync {
    fn connect(&self, base_url: &str) -> Arc<dyn ProberClient>;
}

/// Builds [`HttpProberClient`]s sharing one connection pool
pub struct HttpProberConnector {
    http: Client,
}

impl HttpProberConnector {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl ProberConnector for HttpProberConnector {
    fn connect(&self, base_url: &str) -> Arc<dyn ProberClient> {
        Arc::new(HttpProberClient::new(base_url, self.http.clone()))
    }
}

pub struct HttpProberClient {
    base_url: String,
    http: Client,
}

impl HttpProberClient {
    pub fn new(base_url: &str, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Result<Vec<String>> {
        let url = self.url(path);
        let response = send(&url, self.http.get(&url)).await?;
        let response = expect_status(&url, response, &[StatusCode::OK])?;
        read_json(&url, response).await
    }
}

#[async_trait]
impl ProberClient for HttpProberClient {
    async fn ready(&self) -> Result<bool> {
        let url = self.url("/ping");
        let response = send(&url, self.http.get(&url)).await?;
        Ok(response.status() == StatusCode::OK)
    }

    async fn local_seeds(&self) -> Result<Vec<String>> {
        self.get_json("/localseeds").await
    }

    async fn seeds(&self) -> Result<Vec<String>> {
        self.get_json("/seeds").await
    }

    async fn update_seeds(&self, seeds: &[String]) -> Result<()> {
        let url = self.url("/seeds");
        debug!("Updating seeds at {} to {:?}", url, seeds);
        let response = send(&url, self.http.put(&url).json(seeds)).await?;
        expect_success(&url, response)?;
        Ok(())
    }

    async fn local_dc_ready(&self) -> Result<bool> {
        let url = self.url("/readylocaldcs");
        let response = send(&url, self.http.get(&url)).await?;
        let response = expect_status(&url, response, &[StatusCode::OK])?;
        read_bool(&url, response).await
    }

    async fn update_dc_status(&self, ready: bool) -> Result<()> {
        let url = self.url("/readylocaldcs");
        debug!("Setting local DC readiness at {} to {}", url, ready);
        let response = send(&url, self.http.put(&url).body(ready.to_string())).await?;
        expect_success(&url, response)?;
        Ok(())
    }

    async fn dcs_ready(&self) -> Result<bool> {
        let url = self.url("/readyalldcs");
        let response = send(&url, self.http.get(&url)).await?;
        let response = expect_status(&url, response, &[StatusCode::OK])?;
        read_bool(&url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{http_client, ClientError};
    use std::time::Duration;
    use wiremock::matchers::{body_json, body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> HttpProberClient {
        let http = http_client(Duration::from_secs(2)).unwrap();
        HttpProberClient::new(&server.uri(), http)
    }

    #[tokio::test]
    async fn test_ready_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(client(&server).await.ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_not_ready_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(!client(&server).await.ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_ready_transport_failure_is_error() {
        let http = http_client(Duration::from_millis(500)).unwrap();
        let client = HttpProberClient::new("http://127.0.0.1:1", http);

        let err = client.ready().await.unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_local_seeds_parses_json_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/localseeds"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"["10.0.0.1","10.0.0.2"]"#),
            )
            .mount(&server)
            .await;

        let seeds = client(&server).await.local_seeds().await.unwrap();
        assert_eq!(seeds, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[tokio::test]
    async fn test_local_seeds_rejects_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/localseeds"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server).await.local_seeds().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_seeds_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/seeds"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).await.seeds().await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn test_update_seeds_sends_json() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/seeds"))
            .and(body_json(vec!["a", "b"]))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .update_seeds(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_updates_accept_any_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/seeds"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/readylocaldcs"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = client(&server).await;
        client.update_seeds(&["a".to_string()]).await.unwrap();
        client.update_dc_status(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_updates_reject_non_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/seeds"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .update_seeds(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus { status: 409, .. }
        ));
    }

    #[tokio::test]
    async fn test_dc_flags_are_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/readylocaldcs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(" true\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/readyalldcs"))
            .respond_with(ResponseTemplate::new(200).set_body_string("false"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/readylocaldcs"))
            .and(body_string("true"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        assert!(client.local_dc_ready().await.unwrap());
        assert!(!client.dcs_ready().await.unwrap());
        client.update_dc_status(true).await.unwrap();
    }

    #[tokio::test]
    async fn test_dcs_ready_rejects_garbage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/readyalldcs"))
            .respond_with(ResponseTemplate::new(200).set_body_string("maybe"))
            .mount(&server)
            .await;

        let err = client(&server).await.dcs_ready().await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedPayload { .. }));
    }
}
