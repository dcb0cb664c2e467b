//! Faxter REST client
//!
//! Thin wrapper over `reqwest` with bearer authentication and the API's
//! URL layout:
//!
//! - collections: `/{collection}/` (projects: `/projects`)
//! - items: `/{collection}/{name}?project_name={project}` (projects: `/projects/{name}`)

use crate::error::{ApiError, Result};
use faxter_cloud::ResourceKind;
use faxter_config::ProviderConfig;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// API path segment for a resource kind
pub fn collection(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Project => "projects",
        ResourceKind::SshKey => "ssh_keys",
        ResourceKind::SecurityGroup => "security_groups",
        ResourceKind::Network => "networks",
        ResourceKind::Router => "routers",
        ResourceKind::Volume => "volumes",
        ResourceKind::Server => "servers",
        ResourceKind::LoadBalancer => "loadbalancers",
    }
}

/// Faxter API client
#[derive(Clone)]
pub struct FaxterClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl FaxterClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(&config.base_url, config.token.clone())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// URL used to create resources of `kind`
    pub fn collection_url(&self, kind: ResourceKind) -> Url {
        match kind {
            ResourceKind::Project => self.url(&[collection(kind)]),
            _ => self.url(&[collection(kind), ""]),
        }
    }

    /// URL of a single resource
    pub fn item_url(&self, kind: ResourceKind, name: &str, project: &str) -> Url {
        let mut url = self.url(&[collection(kind), name]);
        if kind != ResourceKind::Project {
            url.query_pairs_mut().append_pair("project_name", project);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
    }

    /// Send a request and classify the response status
    async fn execute(&self, request: RequestBuilder, operation: &str, what: &str) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(what.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(format!("{status} - {detail}")));
        }

        Err(ApiError::Status {
            operation: format!("{operation} {what}"),
            status,
            detail,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// POST a new resource and decode the response
    pub async fn create<B, T>(&self, kind: ResourceKind, name: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, self.collection_url(kind)).json(body);
        let response = self.execute(request, "create", &describe(kind, name)).await?;
        Self::decode(response).await
    }

    /// POST a new resource, ignoring the response body
    pub async fn create_unit<B>(&self, kind: ResourceKind, name: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, self.collection_url(kind)).json(body);
        self.execute(request, "create", &describe(kind, name)).await?;
        Ok(())
    }

    /// GET a resource and decode it
    pub async fn read<T: DeserializeOwned>(&self, kind: ResourceKind, name: &str, project: &str) -> Result<T> {
        let request = self.request(Method::GET, self.item_url(kind, name, project));
        let response = self.execute(request, "read", &describe(kind, name)).await?;
        Self::decode(response).await
    }

    /// GET a resource, only checking that it exists
    pub async fn exists(&self, kind: ResourceKind, name: &str, project: &str) -> Result<()> {
        let request = self.request(Method::GET, self.item_url(kind, name, project));
        self.execute(request, "read", &describe(kind, name)).await?;
        Ok(())
    }

    /// PUT an update to an existing resource
    pub async fn update<B>(&self, kind: ResourceKind, name: &str, project: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let request = self
            .request(Method::PUT, self.item_url(kind, name, project))
            .json(body);
        self.execute(request, "update", &describe(kind, name)).await?;
        Ok(())
    }

    /// DELETE a resource
    pub async fn delete(&self, kind: ResourceKind, name: &str, project: &str) -> Result<()> {
        let request = self.request(Method::DELETE, self.item_url(kind, name, project));
        self.execute(request, "delete", &describe(kind, name)).await?;
        Ok(())
    }

    /// Check that the token is accepted by listing projects
    pub async fn whoami(&self) -> Result<()> {
        let request = self.request(Method::GET, self.collection_url(ResourceKind::Project));
        self.execute(request, "list", "projects").await?;
        Ok(())
    }
}

fn describe(kind: ResourceKind, name: &str) -> String {
    format!("{} '{}'", kind.as_str().replace('_', " "), name)
}

/// Extract the `detail` message from an error body, falling back to the raw text
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
