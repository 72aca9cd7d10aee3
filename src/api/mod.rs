use crate::config::EnvConfig;
use crate::models::{Record, RecordInsert, RecordPatch, RecordTag, Tag, Workspace, WorkspaceInsert};
use crate::storage::{self, TOKEN_KEY};
use thiserror::Error;

#[cfg(test)]
pub(crate) mod memory;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
    NotFound,
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn network(e: reqwest::Error) -> Self {
        Self::new(ApiErrorKind::Network, e.to_string())
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self::new(ApiErrorKind::Parse, e.to_string())
    }

    fn unauthorized() -> Self {
        Self::new(ApiErrorKind::Unauthorized, "Unauthorized")
    }

    fn not_found(what: &str) -> Self {
        Self::new(ApiErrorKind::NotFound, format!("{what} not found"))
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self::new(ApiErrorKind::Http, format!("{ctx} ({status}): {body}"))
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Persistence for pages. Calls are never retried here.
pub(crate) trait RecordStore {
    async fn create_record(&self, record: RecordInsert) -> ApiResult<Record>;
    async fn update_record(&self, id: &str, patch: RecordPatch) -> ApiResult<Record>;
    async fn delete_record(&self, id: &str) -> ApiResult<()>;
    async fn list_records(&self, workspace_id: &str) -> ApiResult<Vec<Record>>;
}

pub(crate) trait TagStore {
    /// Return the owner's tag called `name`, creating it if needed.
    async fn upsert_tag(&self, owner: &str, name: &str) -> ApiResult<Tag>;
    /// Make `tag_ids` the record's complete tag set.
    async fn replace_associations(&self, record_id: &str, tag_ids: &[String]) -> ApiResult<()>;
    async fn list_tags(&self) -> ApiResult<Vec<Tag>>;
}

pub(crate) trait WorkspaceStore {
    /// The user's workspaces, first by `sort_order`.
    async fn list_workspaces(&self) -> ApiResult<Vec<Workspace>>;
    async fn create_workspace(&self, workspace: WorkspaceInsert) -> ApiResult<Workspace>;
}

pub(crate) const DEFAULT_WORKSPACE_NAME: &str = "My Workspace";

/// The user's first workspace, or a freshly created default one.
pub(crate) async fn get_or_create_default_workspace<S: WorkspaceStore>(
    store: &S,
    owner: &str,
) -> ApiResult<Workspace> {
    if let Some(existing) = store.list_workspaces().await?.into_iter().next() {
        return Ok(existing);
    }
    tracing::info!(owner, "creating default workspace");
    store
        .create_workspace(WorkspaceInsert {
            user_id: owner.to_string(),
            name: DEFAULT_WORKSPACE_NAME.to_string(),
        })
        .await
}

/// Client for the hosted PostgREST-style backend.
#[derive(Clone, Debug)]
pub(crate) struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            token: None,
        }
    }

    pub fn load_from_storage(config: &EnvConfig) -> Self {
        let mut client = Self::new(config.api_url.clone(), config.api_key.clone());
        client.token = storage::load_string(TOKEN_KEY);
        client
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn logout(&mut self) {
        self.token = None;
        storage::clear_session();
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn with_auth_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req = req.header("apikey", &self.api_key);
        let bearer = self.token.as_deref().unwrap_or(&self.api_key);
        req.header("Authorization", format!("Bearer {bearer}"))
    }

    async fn request_api(
        &self,
        req: reqwest::RequestBuilder,
        ctx: &str,
    ) -> ApiResult<serde_json::Value> {
        let res = self
            .with_auth_headers(req)
            .send()
            .await
            .map_err(ApiError::network)?;

        let status = res.status();
        if status.as_u16() == 401 {
            return Err(ApiError::unauthorized());
        }
        let body = res.text().await.map_err(ApiError::network)?;
        if !status.is_success() {
            return Err(ApiError::http(status, body, ctx));
        }
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(ApiError::parse)
    }

    /// Id of the user the bearer token belongs to.
    pub async fn current_user_id(&self) -> ApiResult<String> {
        let url = format!("{}/auth/v1/user", self.base_url.trim_end_matches('/'));
        let data = self
            .request_api(reqwest::Client::new().get(url), "Fetch user failed")
            .await?;
        Self::parse_user_id(&data).ok_or_else(|| ApiError::not_found("user"))
    }

    pub(crate) fn parse_user_id(data: &serde_json::Value) -> Option<String> {
        data.get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
    }

    /// `return=representation` responses are arrays; take the single row.
    fn first_row(data: serde_json::Value, what: &str) -> ApiResult<serde_json::Value> {
        match data {
            serde_json::Value::Array(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| ApiError::not_found(what)),
            row @ serde_json::Value::Object(_) => Ok(row),
            _ => Err(ApiError::not_found(what)),
        }
    }

    /// Parse one page row, lifting embedded `page_tags(tags(*))` into `tags`.
    pub(crate) fn parse_record(item: &serde_json::Value) -> Option<Record> {
        let mut record = serde_json::from_value::<Record>(item.clone()).ok()?;
        if record.id.trim().is_empty() {
            return None;
        }
        record.tags = item
            .get("page_tags")
            .and_then(|v| v.as_array())
            .map(|links| {
                links
                    .iter()
                    .filter_map(|link| link.get("tags"))
                    .filter(|t| !t.is_null())
                    .filter_map(|t| serde_json::from_value::<Tag>(t.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Some(record)
    }

    pub(crate) fn parse_record_list(data: serde_json::Value) -> Vec<Record> {
        data.as_array()
            .map(|rows| rows.iter().filter_map(Self::parse_record).collect())
            .unwrap_or_default()
    }

    pub(crate) fn parse_tag_list(data: serde_json::Value) -> Vec<Tag> {
        data.as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|t| serde_json::from_value::<Tag>(t.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl RecordStore for ApiClient {
    async fn create_record(&self, record: RecordInsert) -> ApiResult<Record> {
        let req = reqwest::Client::new()
            .post(self.url("pages"))
            .header("Prefer", "return=representation")
            .json(&record);
        let row = Self::first_row(self.request_api(req, "Create page failed").await?, "page")?;
        Self::parse_record(&row).ok_or_else(|| ApiError::parse(format!("bad page row: {row}")))
    }

    async fn update_record(&self, id: &str, patch: RecordPatch) -> ApiResult<Record> {
        let url = self.url(&format!("pages?id=eq.{}", urlencoding::encode(id)));
        let req = reqwest::Client::new()
            .patch(url)
            .header("Prefer", "return=representation")
            .json(&patch);
        let row = Self::first_row(self.request_api(req, "Update page failed").await?, "page")?;
        Self::parse_record(&row).ok_or_else(|| ApiError::parse(format!("bad page row: {row}")))
    }

    async fn delete_record(&self, id: &str) -> ApiResult<()> {
        let url = self.url(&format!("pages?id=eq.{}", urlencoding::encode(id)));
        self.request_api(reqwest::Client::new().delete(url), "Delete page failed")
            .await?;
        Ok(())
    }

    async fn list_records(&self, workspace_id: &str) -> ApiResult<Vec<Record>> {
        let url = self.url(&format!(
            "pages?select=*,page_tags(tags(*))&workspace_id=eq.{}&is_archived=eq.false&order=sort_order.asc",
            urlencoding::encode(workspace_id)
        ));
        let data = self
            .request_api(reqwest::Client::new().get(url), "List pages failed")
            .await?;
        Ok(Self::parse_record_list(data))
    }
}

impl TagStore for ApiClient {
    async fn upsert_tag(&self, owner: &str, name: &str) -> ApiResult<Tag> {
        let req = reqwest::Client::new()
            .post(self.url("tags?on_conflict=user_id,name"))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&serde_json::json!({ "user_id": owner, "name": name }));
        let row = Self::first_row(self.request_api(req, "Upsert tag failed").await?, "tag")?;
        serde_json::from_value(row).map_err(ApiError::parse)
    }

    async fn replace_associations(&self, record_id: &str, tag_ids: &[String]) -> ApiResult<()> {
        let url = self.url(&format!("page_tags?page_id=eq.{}", urlencoding::encode(record_id)));
        self.request_api(reqwest::Client::new().delete(url), "Clear page tags failed")
            .await?;
        if tag_ids.is_empty() {
            return Ok(());
        }

        let rows: Vec<RecordTag> = tag_ids
            .iter()
            .map(|tag_id| RecordTag {
                page_id: record_id.to_string(),
                tag_id: tag_id.clone(),
            })
            .collect();
        let req = reqwest::Client::new().post(self.url("page_tags")).json(&rows);
        self.request_api(req, "Insert page tags failed").await?;
        Ok(())
    }

    async fn list_tags(&self) -> ApiResult<Vec<Tag>> {
        let data = self
            .request_api(
                reqwest::Client::new().get(self.url("tags?select=*&order=name.asc")),
                "List tags failed",
            )
            .await?;
        Ok(Self::parse_tag_list(data))
    }
}

impl WorkspaceStore for ApiClient {
    async fn list_workspaces(&self) -> ApiResult<Vec<Workspace>> {
        let data = self
            .request_api(
                reqwest::Client::new().get(self.url("workspaces?select=*&order=sort_order.asc")),
                "List workspaces failed",
            )
            .await?;
        Ok(data
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|w| serde_json::from_value::<Workspace>(w.clone()).ok())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_workspace(&self, workspace: WorkspaceInsert) -> ApiResult<Workspace> {
        let req = reqwest::Client::new()
            .post(self.url("workspaces"))
            .header("Prefer", "return=representation")
            .json(&workspace);
        let row = Self::first_row(
            self.request_api(req, "Create workspace failed").await?,
            "workspace",
        )?;
        serde_json::from_value(row).map_err(ApiError::parse)
    }
}
