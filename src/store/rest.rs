//! HTTP policy store implementation using reqwest.
//!
//! Talks to the policy service's JSON API. Schema entities live under
//! `/v2/schema/{project}/{environment}/...`; routing configs live under
//! `/v2/facts/{project}/{environment}/proxy_configs`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::error::{Error, ErrorKind, Result};
use crate::store::{PolicyStore, Scope};
use crate::types::{
    ConditionSet, MappingConfig, Relation, RelationCreate, Resource, ResourceCreate,
    ResourceRole, ResourceRoleCreate, ResourceRoleUpdate, ResourceUpdate, Role, RoleCreate,
    RoleUpdate,
};

const PER_PAGE: usize = 100;

// ============================================================================
// REST Policy Store
// ============================================================================

/// Policy store backed by the remote HTTP API.
///
/// Cheap to clone; the underlying connection pool is shared.
///
/// ## Example
///
/// ```rust,no_run
/// use policysync::RestPolicyStore;
///
/// # fn main() -> Result<(), policysync::Error> {
/// let store = RestPolicyStore::builder()
///     .base_url("https://api.example.com")?
///     .api_key("secret-key")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RestPolicyStore {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for RestPolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestPolicyStore")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl RestPolicyStore {
    /// Creates a new builder.
    pub fn builder() -> RestPolicyStoreBuilder {
        RestPolicyStoreBuilder::new()
    }

    fn schema_url(&self, scope: &Scope, segments: &[&str]) -> Result<Url> {
        self.url_for(&["v2", "schema", &scope.project, &scope.environment], segments)
    }

    fn facts_url(&self, scope: &Scope, segments: &[&str]) -> Result<Url> {
        self.url_for(&["v2", "facts", &scope.project, &scope.environment], segments)
    }

    fn url_for(&self, prefix: &[&str], segments: &[&str]) -> Result<Url> {
        let mut path = String::new();
        for segment in prefix.iter().chain(segments.iter()) {
            path.push('/');
            path.push_str(&urlencoding::encode(segment));
        }
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| {
                Error::new(ErrorKind::Configuration, format!("Invalid URL path: {}", e))
            })
    }

    async fn get_json<R>(&self, url: Url) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let response = self.client.get(url).send().await?;
        handle_response(response).await
    }

    async fn post_json<T, R>(&self, url: Url, body: &T) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let response = self.client.post(url).json(body).send().await?;
        handle_response(response).await
    }

    async fn patch_json<T, R>(&self, url: Url, body: &T) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let response = self.client.patch(url).json(body).send().await?;
        handle_response(response).await
    }

    /// Fetches every page of a list endpoint.
    ///
    /// Pages are requested sequentially; a page shorter than `per_page`
    /// terminates the loop.
    async fn get_all_pages<R>(&self, url: Url) -> Result<Vec<R>>
    where
        R: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("per_page", &PER_PAGE.to_string());

            let response = self.client.get(page_url).send().await?;
            let body: ListPage<R> = handle_response(response).await?;
            let chunk = body.into_items();
            let short = chunk.len() < PER_PAGE;
            items.extend(chunk);
            if short {
                return Ok(items);
            }
            page += 1;
        }
    }
}

/// List endpoints return either a bare array or an envelope with `data`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListPage<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListPage<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            ListPage::Wrapped { data } => data,
            ListPage::Bare(items) => items,
        }
    }
}

#[async_trait]
impl PolicyStore for RestPolicyStore {
    async fn list_resources(&self, scope: &Scope) -> Result<Vec<Resource>> {
        let url = self.schema_url(scope, &["resources"])?;
        self.get_all_pages(url).await
    }

    async fn get_resource(&self, scope: &Scope, key: &str) -> Result<Resource> {
        let url = self.schema_url(scope, &["resources", key])?;
        self.get_json(url).await
    }

    async fn create_resource(&self, scope: &Scope, body: &ResourceCreate) -> Result<Resource> {
        let url = self.schema_url(scope, &["resources"])?;
        self.post_json(url, body).await
    }

    async fn update_resource(
        &self,
        scope: &Scope,
        key: &str,
        body: &ResourceUpdate,
    ) -> Result<Resource> {
        let url = self.schema_url(scope, &["resources", key])?;
        self.patch_json(url, body).await
    }

    async fn create_action(
        &self,
        scope: &Scope,
        resource_key: &str,
        action_key: &str,
        name: &str,
    ) -> Result<()> {
        let url = self.schema_url(scope, &["resources", resource_key, "actions"])?;
        let body = serde_json::json!({ "key": action_key, "name": name });
        let response = self.client.post(url).json(&body).send().await?;
        handle_empty_response(response).await
    }

    async fn list_roles(&self, scope: &Scope) -> Result<Vec<Role>> {
        let url = self.schema_url(scope, &["roles"])?;
        self.get_all_pages(url).await
    }

    async fn get_role(&self, scope: &Scope, key: &str) -> Result<Role> {
        let url = self.schema_url(scope, &["roles", key])?;
        self.get_json(url).await
    }

    async fn create_role(&self, scope: &Scope, body: &RoleCreate) -> Result<Role> {
        let url = self.schema_url(scope, &["roles"])?;
        self.post_json(url, body).await
    }

    async fn update_role(&self, scope: &Scope, key: &str, body: &RoleUpdate) -> Result<Role> {
        let url = self.schema_url(scope, &["roles", key])?;
        self.patch_json(url, body).await
    }

    async fn list_resource_roles(
        &self,
        scope: &Scope,
        resource_key: &str,
    ) -> Result<Vec<ResourceRole>> {
        let url = self.schema_url(scope, &["resources", resource_key, "roles"])?;
        self.get_all_pages(url).await
    }

    async fn get_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        role_key: &str,
    ) -> Result<ResourceRole> {
        let url = self.schema_url(scope, &["resources", resource_key, "roles", role_key])?;
        self.get_json(url).await
    }

    async fn create_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        body: &ResourceRoleCreate,
    ) -> Result<ResourceRole> {
        let url = self.schema_url(scope, &["resources", resource_key, "roles"])?;
        self.post_json(url, body).await
    }

    async fn update_resource_role(
        &self,
        scope: &Scope,
        resource_key: &str,
        role_key: &str,
        body: &ResourceRoleUpdate,
    ) -> Result<ResourceRole> {
        let url = self.schema_url(scope, &["resources", resource_key, "roles", role_key])?;
        self.patch_json(url, body).await
    }

    async fn list_relations(&self, scope: &Scope, resource_key: &str) -> Result<Vec<Relation>> {
        let url = self.schema_url(scope, &["resources", resource_key, "relations"])?;
        self.get_all_pages(url).await
    }

    async fn create_relation(
        &self,
        scope: &Scope,
        subject_resource: &str,
        body: &RelationCreate,
    ) -> Result<Relation> {
        let url = self.schema_url(scope, &["resources", subject_resource, "relations"])?;
        self.post_json(url, body).await
    }

    async fn list_condition_sets(&self, scope: &Scope) -> Result<Vec<ConditionSet>> {
        let url = self.schema_url(scope, &["condition_sets"])?;
        self.get_all_pages(url).await
    }

    async fn delete_mapping_config(&self, scope: &Scope, namespace: &str) -> Result<()> {
        let url = self.facts_url(scope, &["proxy_configs", namespace])?;
        let response = self.client.delete(url).send().await?;
        match handle_empty_response(response).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    async fn create_mapping_config(&self, scope: &Scope, body: &MappingConfig) -> Result<()> {
        let url = self.facts_url(scope, &["proxy_configs"])?;
        let response = self.client.post(url).json(body).send().await?;
        handle_empty_response(response).await
    }
}

async fn handle_response<R>(response: reqwest::Response) -> Result<R>
where
    R: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(map_status_error(status.as_u16(), &error_text));
    }

    response.json::<R>().await.map_err(|e| {
        Error::new(
            ErrorKind::InvalidResponse,
            format!("Failed to parse response: {}", e),
        )
    })
}

/// Handles responses whose body the caller does not need.
async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(map_status_error(status.as_u16(), &error_text));
    }
    Ok(())
}

/// Maps HTTP status codes to store errors.
///
/// Some backends report duplicate creates as 400 with a `DUPLICATE_ENTITY`
/// error code instead of 409; those are normalized to `Conflict` here so
/// callers only ever branch on one kind.
fn map_status_error(status: u16, body: &str) -> Error {
    let mut duplicate = false;
    let message = if body.is_empty() {
        format!("HTTP {}", status)
    } else if let Ok(error) = serde_json::from_str::<serde_json::Value>(body) {
        duplicate = error
            .get("error_code")
            .and_then(|c| c.as_str())
            .is_some_and(|c| c == "DUPLICATE_ENTITY");
        error
            .get("detail")
            .or_else(|| error.get("message"))
            .or_else(|| error.get("error"))
            .and_then(|e| e.as_str())
            .unwrap_or(body)
            .to_string()
    } else {
        body.to_string()
    };

    if duplicate && (400..500).contains(&status) {
        return Error::new(ErrorKind::Conflict, message).with_status(status);
    }

    let error = match status {
        400 => Error::new(ErrorKind::InvalidArgument, message),
        401 => Error::new(ErrorKind::Unauthorized, message),
        403 => Error::new(ErrorKind::Forbidden, message),
        404 => Error::new(ErrorKind::NotFound, message),
        409 => Error::new(ErrorKind::Conflict, message),
        429 => Error::new(ErrorKind::RateLimited, message),
        500..=599 => Error::new(ErrorKind::Unavailable, message),
        _ => Error::new(ErrorKind::Transport, message),
    };
    error.with_status(status)
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`RestPolicyStore`].
pub struct RestPolicyStoreBuilder {
    base_url: Option<Url>,
    api_key: Option<String>,
    timeout: Duration,
}

impl RestPolicyStoreBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the base URL of the policy service.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let mut parsed = Url::parse(url.as_ref()).map_err(|e| {
            Error::new(ErrorKind::Configuration, format!("Invalid base URL: {}", e))
        })?;
        // A missing trailing slash would make Url::join drop the last segment.
        if !parsed.path().ends_with('/') {
            parsed.set_path(&format!("{}/", parsed.path()));
        }
        self.base_url = Some(parsed);
        Ok(self)
    }

    /// Sets the API key sent as a bearer token on every request.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the per-request timeout. Defaults to 30 seconds.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the store.
    pub fn build(self) -> Result<RestPolicyStore> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::new(ErrorKind::Configuration, "base_url is required"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| Error::new(ErrorKind::Configuration, "Invalid API key format"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                Error::new(
                    ErrorKind::Configuration,
                    format!("Failed to create HTTP client: {}", e),
                )
            })?;

        Ok(RestPolicyStore { client, base_url })
    }
}

impl Default for RestPolicyStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod wiremock_tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scope() -> Scope {
        Scope::new("acme", "storefront", "dev")
    }

    async fn store_for(server: &MockServer) -> RestPolicyStore {
        RestPolicyStore::builder()
            .base_url(server.uri())
            .unwrap()
            .api_key("test-key")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn get_resource_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/schema/storefront/dev/resources/document"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": "document",
                "name": "Document"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let resource = store.get_resource(&scope(), "document").await.unwrap();
        assert_eq!(resource.key, "document");
        assert_eq!(resource.name, "Document");
    }

    #[tokio::test]
    async fn list_resources_accepts_enveloped_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/schema/storefront/dev/resources"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "key": "document", "name": "Document" },
                    { "key": "folder", "name": "Folder" }
                ]
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let resources = store.list_resources(&scope()).await.unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[1].key, "folder");
    }

    #[tokio::test]
    async fn duplicate_create_maps_to_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/schema/storefront/dev/resources"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error_code": "DUPLICATE_ENTITY",
                "message": "resource 'document' already exists"
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let body = ResourceCreate::new("document", "Document");
        let err = store.create_resource(&scope(), &body).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn delete_missing_mapping_config_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v2/facts/storefront/dev/proxy_configs/openapi"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        store
            .delete_mapping_config(&scope(), "openapi")
            .await
            .unwrap();
    }
}
