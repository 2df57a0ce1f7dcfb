//! ArchivesSpace REST client implementing [`Registry`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use dp_bag::DateRecord;
use dp_core::{Error, RefId, Result};
use dp_pipeline::{FindResult, Registry, RegistrySettings};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
const SESSION_HEADER: &str = "X-ArchivesSpace-Session";
const SERVICE: &str = "registry";

#[derive(Deserialize)]
struct LoginResponse {
    session: String,
}

#[derive(Deserialize)]
struct FindResponse {
    #[serde(default)]
    archival_objects: Vec<Ref>,
}

#[derive(Deserialize)]
struct Ref {
    #[serde(rename = "ref")]
    uri: String,
}

/// Authenticated session against one ArchivesSpace repository.
#[derive(Debug)]
pub struct ArchivesSpaceClient {
    client: Client,
    base_url: String,
    repo: String,
    session: String,
}

impl ArchivesSpaceClient {
    /// Log in and keep the session token for later requests.
    pub async fn login(settings: &RegistrySettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(CONNECTION_TIMEOUT)
            .build()
            .map_err(|e| Error::transport(SERVICE, e))?;
        let base_url = settings.baseurl.trim_end_matches('/').to_string();

        let url = format!("{}/users/{}/login", base_url, settings.username);
        let response = client
            .post(&url)
            .query(&[("password", settings.password.as_str())])
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::transport(
                SERVICE,
                format!("login as {} failed ({})", settings.username, status),
            ));
        }
        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;
        tracing::debug!("Logged in to {} as {}", base_url, settings.username);

        Ok(Self {
            client,
            base_url,
            repo: settings.repo.clone(),
            session: login.session,
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(query)
            .header(SESSION_HEADER, &self.session)
            .send()
            .await
            .map_err(|e| Error::transport(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(
                SERVICE,
                format!("GET {} failed ({}): {}", path, status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::transport(SERVICE, e))
    }
}

/// Non-empty `dates` of a JSON record, if any.
fn dates_of(record: &Value) -> Result<Option<Vec<DateRecord>>> {
    match record.get("dates") {
        Some(dates) if dates.as_array().is_some_and(|a| !a.is_empty()) => {
            let parsed: Vec<DateRecord> = serde_json::from_value(dates.clone())
                .map_err(|e| Error::Precondition(format!("malformed dates: {e}")))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

#[async_trait]
impl Registry for ArchivesSpaceClient {
    async fn find_by_ref_id(&self, refid: &RefId) -> Result<FindResult> {
        let path = format!("repositories/{}/find_by_id/archival_objects", self.repo);
        let value = self
            .get_json(&path, &[("ref_id[]", refid.as_str())])
            .await?;
        let found: FindResponse =
            serde_json::from_value(value).map_err(|e| Error::transport(SERVICE, e))?;
        Ok(FindResult {
            query: format!("{path}?ref_id[]={refid}"),
            uris: found.archival_objects.into_iter().map(|r| r.uri).collect(),
        })
    }

    /// Checks the object first, then its ancestors from nearest to farthest.
    async fn closest_dates(&self, uri: &str) -> Result<Vec<DateRecord>> {
        let object = self
            .get_json(uri, &[("resolve[]", "ancestors")])
            .await?;
        if let Some(dates) = dates_of(&object)? {
            return Ok(dates);
        }

        let ancestors = object
            .get("ancestors")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for ancestor in &ancestors {
            let resolved = match ancestor.get("_resolved") {
                Some(resolved) => resolved.clone(),
                None => match ancestor.get("ref").and_then(Value::as_str) {
                    Some(r) => self.get_json(r, &[]).await?,
                    None => continue,
                },
            };
            if let Some(dates) = dates_of(&resolved)? {
                return Ok(dates);
            }
        }

        Err(Error::Precondition(format!(
            "no dates found for {} or its ancestors",
            uri
        )))
    }
}
