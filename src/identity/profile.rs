use async_trait::async_trait;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Denormalised identity row kept by the application. Optional and never
/// written from this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileRecord {
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ProfileRecord {
    pub fn name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }

    pub fn phone(&self) -> Option<&str> {
        non_blank(self.phone.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Read-only keyed lookup of profile rows.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Option<ProfileRecord>>;
}

/// Profile lookup through the hosted database's REST interface.
pub struct RestProfileStore {
    endpoint: String,
    anon_key: String,
    client: reqwest::Client,
}

impl RestProfileStore {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("building profile store HTTP client")?;
        Ok(Self {
            endpoint: format!("{}/rest/v1/{}", config.auth_url, config.profiles_table),
            anon_key: config.anon_key.clone(),
            client,
        })
    }
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn fetch(&self, id: &str) -> Result<Option<ProfileRecord>> {
        let url = format!(
            "{}?id=eq.{}&select=id,role,name,phone&limit=1",
            self.endpoint,
            urlencoding::encode(id)
        );
        let resp = self
            .client
            .get(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .send()
            .await
            .context("profile lookup request")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("profile lookup failed with status {}", status.as_u16()));
        }
        let rows: Vec<ProfileRecord> = resp.json().await.context("decoding profile rows")?;
        Ok(rows.into_iter().next())
    }
}
