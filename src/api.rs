//! HTTP client for the drowsiness detection API

use std::sync::{Arc, RwLock};

use reqwest::{header, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::ApiConfig,
    errors::DashboardError,
    models::{
        AlertLevelSummary, AlertSlots, AuthResult, AuthUser, DeviceReading, DriverOverview,
        DriversResponse, ForgotPasswordRequest, ForgotPasswordResponse, HistoryResponse,
        LoginRequest, RecentAlertsResponse, RegisterRequest, ResetPasswordRequest,
    },
};

/// Error body the API sends with non-2xx responses
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Thin client over the REST API.
///
/// Cloning is cheap; clones share the bearer token.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, DashboardError> {
        Self::with_http(base_url, reqwest::Client::builder().build()?)
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, DashboardError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Self::with_http(&config.resolve_base_url(), http)
    }

    fn with_http(base_url: &str, http: reqwest::Client) -> Result<Self, DashboardError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach (or clear) the bearer token sent with every request
    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CACHE_CONTROL, "no-store");
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DashboardError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self.authorize(self.http.get(&url)).send().await?;
        self.handle_response(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DashboardError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self.authorize(self.http.post(&url)).json(body).send().await?;
        self.handle_response(response).await
    }

    /// POST whose response body is not needed
    pub async fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<(), DashboardError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self.authorize(self.http.post(&url)).json(body).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, DashboardError> {
        let response = Self::check_status(response).await?;
        let body = response.json().await?;
        Ok(body)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DashboardError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(DashboardError::Unauthorized);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(DashboardError::NotFound);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(DashboardError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResult, DashboardError> {
        self.post("/auth/login", &LoginRequest { email, password })
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResult, DashboardError> {
        self.post("/auth/register", request).await
    }

    pub async fn me(&self) -> Result<AuthUser, DashboardError> {
        self.get("/auth/me").await
    }

    pub async fn forgot_password(
        &self,
        email: &str,
    ) -> Result<ForgotPasswordResponse, DashboardError> {
        self.post("/forgot-password", &ForgotPasswordRequest { email })
            .await
    }

    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), DashboardError> {
        self.post_empty(
            "/reset-password",
            &ResetPasswordRequest {
                email,
                code,
                new_password,
            },
        )
        .await
    }

    pub async fn device_latest(&self, device_id: &str) -> Result<DeviceReading, DashboardError> {
        self.get(&format!("/devices/{}/data", device_id)).await
    }

    pub async fn device_history(
        &self,
        device_id: &str,
        limit: u32,
    ) -> Result<HistoryResponse, DashboardError> {
        self.get(&format!("/devices/{}/history?limit={}", device_id, limit))
            .await
    }

    pub async fn admin_overview(&self) -> Result<DriverOverview, DashboardError> {
        self.get("/admin/overview").await
    }

    pub async fn admin_drivers(&self) -> Result<DriversResponse, DashboardError> {
        self.get("/admin/drivers").await
    }

    pub async fn admin_recent_alerts(
        &self,
        limit: u32,
    ) -> Result<RecentAlertsResponse, DashboardError> {
        self.get(&format!("/admin/recent-alerts?limit={}", limit))
            .await
    }

    pub async fn admin_alert_slots(&self) -> Result<AlertSlots, DashboardError> {
        self.get("/admin/alert-slots").await
    }

    pub async fn admin_alert_levels(&self) -> Result<AlertLevelSummary, DashboardError> {
        self.get("/admin/alert-levels").await
    }
}
