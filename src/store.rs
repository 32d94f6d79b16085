//! Client for the host's REST resources backing the editor.
//!
//! [`LayoutStore`] is the seam the rest of the crate talks to;
//! [`HttpLayoutStore`] implements it over [`reqwest`] against the
//! `status`, `layout`, `widget-details` and `widget-opts` resources.

use crate::config::HostConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{
    Envelope, LayoutUpdatePayload, ObjectRef, OptionsSaveResponse, PersistedLayout,
    StatusUpdatePayload, WidgetDetails, WidgetForm, WidgetFormRequest,
};
use async_trait::async_trait;
use serde_json::Value;

/// Header carrying the per-session anti-forgery token.
pub const NONCE_HEADER: &str = "X-WP-Nonce";

#[async_trait]
pub trait LayoutStore: Send + Sync {
    async fn fetch_status(&self, object: &ObjectRef) -> AppResult<bool>;
    async fn update_status(&self, object: &ObjectRef, enabled: bool) -> AppResult<()>;
    async fn fetch_layout(&self, object: &ObjectRef) -> AppResult<PersistedLayout>;
    async fn save_layout(&self, object: &ObjectRef, layout: &PersistedLayout) -> AppResult<()>;
    /// `Ok(None)` when the host answers with an empty payload.
    async fn fetch_widget_details(
        &self,
        object: &ObjectRef,
        widget_id: &str,
    ) -> AppResult<Option<WidgetDetails>>;
    async fn fetch_widget_form(
        &self,
        object: &ObjectRef,
        request: &WidgetFormRequest,
    ) -> AppResult<String>;
    async fn save_widget_options(&self, fields: &[(String, String)]) -> AppResult<OptionsSaveResponse>;
}

/// HTTP implementation of [`LayoutStore`].
pub struct HttpLayoutStore {
    client: reqwest::Client,
    base_url: String,
    nonce: String,
}

impl HttpLayoutStore {
    pub fn new(host: &HostConfig) -> AppResult<Self> {
        Self::with_client(reqwest::Client::new(), host)
    }

    /// Reuses an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, host: &HostConfig) -> AppResult<Self> {
        Ok(Self {
            client,
            base_url: resolve_base_url(&host.rest_url_base, host.site_url.as_deref())?,
            nonce: host.rest_nonce.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    async fn get_data(&self, resource: &str, query: &[(&str, String)]) -> AppResult<Value> {
        let response = self
            .client
            .get(self.endpoint(resource))
            .header(NONCE_HEADER, &self.nonce)
            .query(query)
            .send()
            .await?;

        let envelope: Envelope<Value> = parse_response(response).await?;
        Ok(envelope.data)
    }

    async fn post_json<T: serde::Serialize + ?Sized>(&self, resource: &str, body: &T) -> AppResult<()> {
        let response = self
            .client
            .post(self.endpoint(resource))
            .header(NONCE_HEADER, &self.nonce)
            .json(body)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl LayoutStore for HttpLayoutStore {
    async fn fetch_status(&self, object: &ObjectRef) -> AppResult<bool> {
        let data = self.get_data("status", &object.query_pairs()).await?;
        decode_status(data)
    }

    async fn update_status(&self, object: &ObjectRef, enabled: bool) -> AppResult<()> {
        self.post_json("status", &StatusUpdatePayload::new(object, enabled))
            .await
    }

    async fn fetch_layout(&self, object: &ObjectRef) -> AppResult<PersistedLayout> {
        let data = self.get_data("layout", &object.query_pairs()).await?;
        decode_layout(data)
    }

    async fn save_layout(&self, object: &ObjectRef, layout: &PersistedLayout) -> AppResult<()> {
        let payload = LayoutUpdatePayload {
            object_type: &object.object_type,
            object_id: object.object_id,
            layout,
        };
        self.post_json("layout", &payload).await
    }

    async fn fetch_widget_details(
        &self,
        object: &ObjectRef,
        widget_id: &str,
    ) -> AppResult<Option<WidgetDetails>> {
        let mut query = object.query_pairs().to_vec();
        query.push(("widget_id", widget_id.to_string()));
        let data = self.get_data("widget-details", &query).await?;
        decode_details(data)
    }

    async fn fetch_widget_form(
        &self,
        object: &ObjectRef,
        request: &WidgetFormRequest,
    ) -> AppResult<String> {
        let mut query = object.query_pairs().to_vec();
        query.push(("widget_type", request.widget_type.clone()));
        query.push(("widget_id", request.widget_id.clone()));
        query.push(("is_new", request.is_new.to_string()));
        let data = self.get_data("widget-opts", &query).await?;
        let form: WidgetForm = serde_json::from_value(data)?;
        Ok(form.html)
    }

    async fn save_widget_options(&self, fields: &[(String, String)]) -> AppResult<OptionsSaveResponse> {
        let response = self
            .client
            .post(self.endpoint("widget-opts"))
            .header(NONCE_HEADER, &self.nonce)
            .form(fields)
            .send()
            .await?;

        parse_response(response).await
    }
}

/// Joins a site-relative REST base onto the site origin; absolute bases
/// are used as given. The result never ends with a slash.
pub fn resolve_base_url(rest_url_base: &str, site_url: Option<&str>) -> AppResult<String> {
    let base = rest_url_base.trim();
    let resolved = match reqwest::Url::parse(base) {
        Ok(url) => url,
        Err(_) => {
            let Some(site_url) = site_url else {
                return Err(AppError::Config(format!(
                    "relative rest_url_base {} requires site_url",
                    base
                )));
            };
            let origin = reqwest::Url::parse(site_url.trim())
                .map_err(|error| AppError::Config(format!("invalid site_url: {}", error)))?;
            origin
                .join(base)
                .map_err(|error| AppError::Config(format!("invalid rest_url_base: {}", error)))?
        }
    };
    Ok(resolved.as_str().trim_end_matches('/').to_string())
}

async fn ensure_success(response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(AppError::Host {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

pub(crate) fn decode_status(data: Value) -> AppResult<bool> {
    match data {
        Value::Bool(enabled) => Ok(enabled),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Ok(true),
            "no" | "false" | "0" | "" => Ok(false),
            other => Err(AppError::Decode(format!("unrecognized status value: {}", other))),
        },
        Value::Number(number) => match (number.as_i64(), number.as_u64()) {
            (Some(flag), _) => Ok(flag != 0),
            (None, Some(_)) => Ok(true),
            _ => Err(AppError::Decode(format!("status is not an integer flag: {}", number))),
        },
        Value::Null => Ok(false),
        other => Err(AppError::Decode(format!("unrecognized status payload: {}", other))),
    }
}

pub(crate) fn decode_layout(data: Value) -> AppResult<PersistedLayout> {
    let rows = match data {
        Value::Null => return Ok(Vec::new()),
        Value::Array(rows) => rows,
        other => return Err(AppError::Decode(format!("layout is not a list: {}", other))),
    };

    rows.into_iter()
        .map(|row| match row {
            Value::Array(cells) => cells.into_iter().map(decode_cell).collect::<AppResult<Vec<_>>>(),
            Value::Null => Ok(Vec::new()),
            other => Err(AppError::Decode(format!("layout row is not a list: {}", other))),
        })
        .collect()
}

fn decode_cell(cell: Value) -> AppResult<String> {
    match cell {
        Value::String(widget_id) => Ok(widget_id),
        Value::Number(number) => Ok(number.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(AppError::Decode(format!("layout cell is not a widget id: {}", other))),
    }
}

pub(crate) fn decode_details(data: Value) -> AppResult<Option<WidgetDetails>> {
    let is_empty = match &data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(flag) => !flag,
        _ => false,
    };
    if is_empty {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(data)?))
}
