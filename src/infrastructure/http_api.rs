// HTTP implementation of the SCADA backend API
use crate::application::scada_api::{ApiError, ScadaApi};
use crate::domain::device::DeviceRecord;
use crate::domain::widget::{LayoutPatch, Widget, WidgetDraft, WidgetPatch};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpScadaApi {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

/// Some backend routes wrap their payload in `{"data": ...}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Payload<T> {
    fn into_inner(self) -> T {
        match self {
            Payload::Wrapped { data } => data,
            Payload::Bare(data) => data,
        }
    }
}

impl HttpScadaApi {
    pub fn new(base_url: String, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn widget_path(id: &str) -> String {
        format!("/api/widgets/{}", urlencoding::encode(id))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        tracing::debug!("Calling backend {}", path);
        let response = builder.send().await.map_err(|e| ApiError::Request {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                path: path.to_string(),
                status,
                body,
            });
        }

        Ok(response)
    }

    async fn execute<T: DeserializeOwned>(&self, path: &str, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(path, builder).await?;
        let payload = response
            .json::<Payload<T>>()
            .await
            .map_err(|e| ApiError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        Ok(payload.into_inner())
    }
}

#[async_trait]
impl ScadaApi for HttpScadaApi {
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, ApiError> {
        let path = "/api/devices";
        self.execute(path, self.request(Method::GET, path)).await
    }

    async fn list_widgets(&self) -> Result<Vec<Widget>, ApiError> {
        let path = "/api/widgets";
        self.execute(path, self.request(Method::GET, path)).await
    }

    async fn create_widget(&self, draft: &WidgetDraft) -> Result<Widget, ApiError> {
        let path = "/api/widgets";
        self.execute(path, self.request(Method::POST, path).json(draft)).await
    }

    async fn update_widget(&self, id: &str, patch: &WidgetPatch) -> Result<Widget, ApiError> {
        let path = Self::widget_path(id);
        self.execute(&path, self.request(Method::PUT, &path).json(patch)).await
    }

    async fn delete_widget(&self, id: &str) -> Result<(), ApiError> {
        let path = Self::widget_path(id);
        self.send(&path, self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn update_layout(&self, patches: &[LayoutPatch<'_>]) -> Result<(), ApiError> {
        let path = "/api/widgets/batch-update-layout";
        self.send(path, self.request(Method::POST, path).json(patches)).await?;
        Ok(())
    }
}
