// Appliance client - HTTP calls against the streaming appliance's web API
use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::commands::AdminCommand;
use crate::types::{BitrateBounds, PipelineOption, StartForm, StatusSnapshot, StreamConfig};

#[derive(Debug, Clone)]
pub struct ApplianceClient {
    client: Client,
    base: Url,
}

impl ApplianceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .with_context(|| format!("Invalid appliance URL '{}'", base_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Appliance URL '{}' cannot be used as a base URL", base_url);
        }
        // Endpoints are joined relative to the base, so it must end in a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("belapanel")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))
    }

    /// GET /data. Any non-success status is an error; callers skip the cycle.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_status(&self) -> Result<StatusSnapshot> {
        let response = self.client.get(self.endpoint("data")?).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Status request failed: {}", status));
        }
        let body: serde_json::Value = response.json().await?;
        Ok(StatusSnapshot::from_json(&body))
    }

    pub async fn fetch_pipelines(&self) -> Result<Vec<PipelineOption>> {
        let response = self.client.get(self.endpoint("pipelines")?).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Pipeline request failed: {}", status));
        }
        response.json().await.context("Malformed pipeline list")
    }

    pub async fn fetch_config(&self) -> Result<StreamConfig> {
        let response = self.client.get(self.endpoint("config")?).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Config request failed: {}", status));
        }
        response.json().await.context("Malformed stream config")
    }

    pub async fn set_bitrate(&self, bounds: BitrateBounds) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("bitrate")?)
            .form(&bounds.form_fields())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Bitrate update failed: {}", status));
        }
        debug!(min_br = bounds.min_br, max_br = bounds.max_br, "bitrate updated");
        Ok(())
    }

    /// POST /start. On rejection the error message is the appliance's response body.
    pub async fn start(&self, form: &StartForm) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("start")?)
            .form(&form.form_fields())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(body));
        }
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let response = self.client.post(self.endpoint("stop")?).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Stop request failed: {}", status));
        }
        Ok(())
    }

    /// POST /command and return the response text.
    pub async fn send_command(&self, command: AdminCommand) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("command")?)
            .form(&[("cmd", command.token())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Command '{}' failed: {}", command.token(), status));
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApplianceClient {
        ApplianceClient::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "active": false,
                "modems": [{"i": 0, "ip": "10.0.0.2", "txb": 1000}],
                "temps": [{"i": 0, "type_name": "soc", "type_value": 47000}],
            })))
            .mount(&server)
            .await;

        let snapshot = client_for(&server).fetch_status().await.unwrap();
        assert_eq!(snapshot.active, Some(false));
        assert_eq!(snapshot.modems.unwrap()[0].tx_bytes, Some(1000));
        assert_eq!(snapshot.temps.unwrap()[0].raw_milli_degrees, 47000.0);
    }

    #[tokio::test]
    async fn test_fetch_status_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(client_for(&server).fetch_status().await.is_err());
    }

    #[tokio::test]
    async fn test_start_rejected_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(400).set_body_string("pipeline busy"))
            .mount(&server)
            .await;

        let form = StartForm {
            pipeline: "p1".to_string(),
            delay: 0,
            bitrate: BitrateBounds { min_br: 500, max_br: 5000 },
            srtla_addr: String::new(),
            srtla_port: String::new(),
            srt_streamid: String::new(),
            srt_latency: 2000,
        };
        let err = client_for(&server).start(&form).await.unwrap_err();
        assert_eq!(err.to_string(), "pipeline busy");
    }

    #[tokio::test]
    async fn test_start_sends_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start"))
            .and(body_string(
                "pipeline=p1&delay=-20&min_br=800&max_br=6000&srtla_addr=relay.local&srtla_port=5000&srt_streamid=live&srt_latency=1500",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let form = StartForm {
            pipeline: "p1".to_string(),
            delay: -20,
            bitrate: BitrateBounds { min_br: 800, max_br: 6000 },
            srtla_addr: "relay.local".to_string(),
            srtla_port: "5000".to_string(),
            srt_streamid: "live".to_string(),
            srt_latency: 1500,
        };
        client_for(&server).start(&form).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_bitrate_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bitrate"))
            .and(body_string("min_br=1000&max_br=8000"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .set_bitrate(BitrateBounds { min_br: 1000, max_br: 8000 })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_command_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/command"))
            .and(body_string("cmd=update"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Updating 3 packages"))
            .mount(&server)
            .await;

        let text = client_for(&server).send_command(AdminCommand::Update).await.unwrap();
        assert_eq!(text, "Updating 3 packages");
    }

    #[tokio::test]
    async fn test_pipelines_and_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pipelines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "a1", "name": "1080p30 h265", "selected": false},
                {"id": "b2", "name": "720p60 h264", "selected": true},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"min_br": 1000, "max_br": 8000})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let pipelines = client.fetch_pipelines().await.unwrap();
        assert_eq!(pipelines.len(), 2);
        assert!(pipelines[1].selected);

        let config = client.fetch_config().await.unwrap();
        assert_eq!(config.bitrate(), (1000, 8000));
        assert_eq!(config.srt_latency_ms(), 2000);
    }

    #[test]
    fn test_base_url_with_path() {
        let client = ApplianceClient::new("http://10.0.0.1:8080/panel", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("data").unwrap().as_str(), "http://10.0.0.1:8080/panel/data");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApplianceClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
