//! HTTP client for the cloud document store, talking to a `nosh serve`
//! instance (or anything speaking the same API).

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use nosh_core::catalog::DocPath;
use nosh_core::remote::RemoteStore;

pub struct CloudClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct BatchWrite {
    doc: String,
    body: Value,
}

#[derive(Serialize)]
struct BatchRequest {
    writes: Vec<BatchWrite>,
}

impl CloudClient {
    #[must_use]
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("nosh-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn doc_url(&self, path: &DocPath) -> String {
        format!(
            "{}/api/users/{}/{}/{}",
            self.base_url, path.user_id, path.collection, path.doc_id
        )
    }

    fn commit_url(&self, user_id: &str) -> String {
        format!("{}/api/users/{user_id}/commit", self.base_url)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl RemoteStore for CloudClient {
    async fn get_doc(&self, path: &DocPath) -> Result<Option<Value>> {
        let resp = self
            .authed(self.client.get(self.doc_url(path)))
            .send()
            .await
            .context("Failed to reach sync server")?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .with_context(|| format!("Fetching {path} failed"))?;
        let doc = resp
            .json()
            .await
            .with_context(|| format!("Malformed response for {path}"))?;
        Ok(Some(doc))
    }

    async fn set_doc(&self, path: &DocPath, doc: Value) -> Result<()> {
        self.authed(self.client.put(self.doc_url(path)))
            .json(&doc)
            .send()
            .await
            .context("Failed to reach sync server")?
            .error_for_status()
            .with_context(|| format!("Writing {path} failed"))?;
        Ok(())
    }

    async fn delete_doc(&self, path: &DocPath) -> Result<()> {
        let resp = self
            .authed(self.client.delete(self.doc_url(path)))
            .send()
            .await
            .context("Failed to reach sync server")?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        resp.error_for_status()
            .with_context(|| format!("Deleting {path} failed"))?;
        Ok(())
    }

    async fn commit_batch(&self, writes: Vec<(DocPath, Value)>) -> Result<()> {
        let Some((first, _)) = writes.first() else {
            return Ok(());
        };
        let user_id = first.user_id.clone();
        if writes.iter().any(|(p, _)| p.user_id != user_id) {
            bail!("batch commit cannot span users");
        }
        let request = BatchRequest {
            writes: writes
                .into_iter()
                .map(|(path, body)| BatchWrite {
                    doc: path.doc_id,
                    body,
                })
                .collect(),
        };
        self.authed(self.client.post(self.commit_url(&user_id)))
            .json(&request)
            .send()
            .await
            .context("Failed to reach sync server")?
            .error_for_status()
            .context("Batch commit failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nosh_core::catalog::RecordType;

    #[test]
    fn test_urls() {
        let client = CloudClient::new("http://localhost:8080/", None);
        let path = DocPath::record("u1", RecordType::FoodLog);
        assert_eq!(
            client.doc_url(&path),
            "http://localhost:8080/api/users/u1/data/foodLog"
        );
        assert_eq!(
            client.commit_url("u1"),
            "http://localhost:8080/api/users/u1/commit"
        );
    }
}
