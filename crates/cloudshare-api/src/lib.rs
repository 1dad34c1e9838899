//! Typed Rust client for the CloudShare v3 REST API.
//!
//! Covers the subset needed for managing docker-machine environments:
//! projects, templates, policies, environments (create, list, extended
//! status, suspend, resume, delete) and VMs (reboot, hardware edit).

mod types;

pub use reqwest::StatusCode;
pub use types::*;

use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::{Method, Url};
use sha1::{Digest, Sha1};

const BASE_URL: &str = "https://use.cloudshare.com/api/v3";
const AUTH_TOKEN_LEN: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cloudshare api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("cloudshare api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("invalid cloudshare api url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the CloudShare REST API.
///
/// Every request is signed with the `cs_sha1` scheme, which hashes the full
/// request URL, so query parameters are fixed before signing.
#[derive(Clone)]
pub struct CloudShareClient {
    api_id: String,
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl CloudShareClient {
    pub fn new(api_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_id: api_id.into(),
            api_key: api_key.into(),
            base_url: BASE_URL.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Point the client at a different API root (staging, a local fake).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}/{path}", self.base_url);
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|e| Error::InvalidUrl {
            url: raw,
            reason: e.to_string(),
        })
    }

    fn auth(&self, url: &Url) -> String {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let token: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(AUTH_TOKEN_LEN)
            .map(char::from)
            .collect();
        sign(&self.api_id, &self.api_key, url.as_str(), &timestamp, &token)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let auth = self.auth(&url);
        self.http
            .request(method, url)
            .header("Authorization", auth)
            .header("Accept", "application/json")
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                endpoint,
                status,
                body,
            });
        }
        Ok(resp)
    }

    /// Like `check` but also treats 404 as success (for delete idempotency).
    async fn check_allow_404(
        resp: reqwest::Response,
        endpoint: &'static str,
    ) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                endpoint,
                status,
                body,
            });
        }
        Ok(resp)
    }

    // ── Projects ────────────────────────────────────────────────────

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let resp = self
            .request(Method::GET, self.url("projects", &[])?)
            .send()
            .await?;

        Self::check(resp, "list projects")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Templates ───────────────────────────────────────────────────

    pub async fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>> {
        let resp = self
            .request(Method::GET, self.url("templates", &filter.query())?)
            .send()
            .await?;

        Self::check(resp, "list templates")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Policies ────────────────────────────────────────────────────

    pub async fn list_policies(&self, project_id: &str) -> Result<Vec<Policy>> {
        let resp = self
            .request(
                Method::GET,
                self.url(&format!("projects/{project_id}/policies"), &[])?,
            )
            .send()
            .await?;

        Self::check(resp, "list policies")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn create_policy(&self, req: &CreatePolicyRequest) -> Result<Policy> {
        let resp = self
            .request(Method::POST, self.url("policies", &[])?)
            .json(req)
            .send()
            .await?;

        Self::check(resp, "create policy")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    // ── Environments ────────────────────────────────────────────────

    /// List every environment visible to the API identity.
    pub async fn list_environments(&self) -> Result<Vec<Environment>> {
        let resp = self
            .request(
                Method::GET,
                self.url("envs", &[("criteria", "allvisible")])?,
            )
            .send()
            .await?;

        Self::check(resp, "list environments")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn create_environment_from_template(
        &self,
        req: &CreateEnvironmentRequest,
    ) -> Result<CreateEnvironmentResponse> {
        let resp = self
            .request(Method::POST, self.url("envs", &[])?)
            .json(req)
            .send()
            .await?;

        Self::check(resp, "create environment")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn get_environment_extended(&self, env_id: &str) -> Result<EnvironmentExtended> {
        let resp = self
            .request(
                Method::GET,
                self.url("envs/actions/getextended", &[("envId", env_id)])?,
            )
            .send()
            .await?;

        Self::check(resp, "get environment extended")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn suspend_environment(&self, env_id: &str) -> Result<()> {
        let resp = self
            .request(
                Method::PUT,
                self.url("envs/actions/suspend", &[("envId", env_id)])?,
            )
            .send()
            .await?;

        Self::check(resp, "suspend environment").await?;
        Ok(())
    }

    pub async fn resume_environment(&self, env_id: &str) -> Result<()> {
        let resp = self
            .request(
                Method::PUT,
                self.url("envs/actions/resume", &[("envId", env_id)])?,
            )
            .send()
            .await?;

        Self::check(resp, "resume environment").await?;
        Ok(())
    }

    pub async fn delete_environment(&self, env_id: &str) -> Result<()> {
        let resp = self
            .request(Method::DELETE, self.url(&format!("envs/{env_id}"), &[])?)
            .send()
            .await?;

        Self::check_allow_404(resp, "delete environment").await?;
        Ok(())
    }

    // ── VMs ─────────────────────────────────────────────────────────

    pub async fn reboot_vm(&self, vm_id: &str) -> Result<()> {
        let resp = self
            .request(
                Method::PUT,
                self.url("vms/actions/rebootvm", &[("vmId", vm_id)])?,
            )
            .send()
            .await?;

        Self::check(resp, "reboot vm").await?;
        Ok(())
    }

    pub async fn edit_vm_hardware(
        &self,
        req: &EditVmHardwareRequest,
    ) -> Result<EditVmHardwareResponse> {
        let resp = self
            .request(Method::PUT, self.url("vms/actions/editvmhardware", &[])?)
            .json(req)
            .send()
            .await?;

        Self::check(resp, "edit vm hardware")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }
}

/// Build a `cs_sha1` authorization header value.
///
/// The digest is SHA-1 over `api_key + url + timestamp + token`, hex encoded.
fn sign(api_id: &str, api_key: &str, url: &str, timestamp: &str, token: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(api_key.as_bytes());
    hasher.update(url.as_bytes());
    hasher.update(timestamp.as_bytes());
    hasher.update(token.as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("cs_sha1 userapiid:{api_id};timestamp:{timestamp};token:{token};hmac:{digest}")
}
