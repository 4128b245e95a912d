use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

/// Status and body of a producer call, kept raw so scenarios can check declines.
#[derive(Debug, Clone)]
pub struct ProducerResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ProducerResponse {
    pub fn accepted(&self) -> bool {
        self.status.is_success()
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn notify(&self, message: i64) -> Result<ProducerResponse> {
        let response = self
            .client
            .post(self.url("/notify"))
            .json(&json!({ "message": message }))
            .send()
            .await
            .context("Failed to call notify")?;

        Self::read_response(response).await
    }

    pub async fn republish(&self) -> Result<ProducerResponse> {
        let response = self
            .client
            .post(self.url("/get-updated-data"))
            .send()
            .await
            .context("Failed to call get-updated-data")?;

        Self::read_response(response).await
    }

    pub async fn update(&self, data: i64) -> Result<()> {
        let response = self
            .client
            .post(self.url("/update"))
            .query(&[("data", data)])
            .send()
            .await
            .context("Failed to update client data")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to update client data: {}", response.status());
        }

        Ok(())
    }

    pub async fn client_data(&self) -> Result<i64> {
        let response = self
            .client
            .get(self.url("/getclientdata"))
            .send()
            .await
            .context("Failed to read client data")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to read client data: {}", response.status());
        }

        let value: Value = response.json().await.context("Failed to parse response")?;
        value.as_i64().context("Client data is not an integer")
    }

    async fn read_response(response: reqwest::Response) -> Result<ProducerResponse> {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        Ok(ProducerResponse { status, body })
    }
}
