//! reqwest implementation of [`DashboardApi`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::{ApiError, DashboardApi};
use crate::model::{
    AnalysisKind, GeoPoint, ImageResult, Lane, LaneAnalysis, NetworkSummary, RouteResult,
    StagedFile, TelemetrySample, VideoResult,
};

/// Default backend address when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5005";

pub struct HttpDashboardApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDashboardApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { base_url, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of the continuous MJPEG camera stream. Display-only; never fetched here.
    pub fn video_feed_url(&self) -> String {
        self.url("/video_feed")
    }

    /// URL of a stored processed frame image. Display-only; never fetched here.
    pub fn frame_url(&self, name: &str) -> String {
        self.url(&format!("/frames/{name}"))
    }

    /// Checks the `success` flag and extracts the typed payload.
    ///
    /// Anything without `success: true` is a server-reported failure
    /// regardless of HTTP status; the optional `error` field becomes the
    /// failure message.
    fn extract<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
        if value.get("success").and_then(Value::as_bool) != Some(true) {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Err(ApiError::Server { message });
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn get_checked<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value: Value = self.client.get(self.url(path)).send().await?.json().await?;
        Self::extract(value)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, ApiError> {
        let value: Value = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        Self::extract(value)
    }

    async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ApiError> {
        let value: Value = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        Self::extract(value)
    }
}

fn file_part(file: &StagedFile) -> Part {
    Part::bytes(file.bytes.clone()).file_name(file.name.clone())
}

#[derive(Deserialize)]
struct GeocodeResponse {
    lat: f64,
    lng: f64,
    address: Option<String>,
}

#[derive(Deserialize)]
struct RouteResponse {
    route: Vec<[f64; 2]>,
    distance_km: f64,
    estimated_time_min: f64,
    num_nodes: u32,
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn stats(&self) -> Result<TelemetrySample, ApiError> {
        // /stats returns the sample directly, with no success envelope.
        let resp = self.client.get(self.url("/stats")).send().await?;
        let value: Value = resp.json().await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn upload_image(&self, file: &StagedFile) -> Result<ImageResult, ApiError> {
        debug!(name = %file.name, bytes = file.bytes.len(), "uploading image");
        let form = Form::new().part("image", file_part(file));
        self.post_multipart("/upload-image", form).await
    }

    async fn upload_video(&self, file: &StagedFile) -> Result<VideoResult, ApiError> {
        debug!(name = %file.name, bytes = file.bytes.len(), "uploading video");
        let form = Form::new().part("video", file_part(file));
        self.post_multipart("/upload-video", form).await
    }

    async fn upload_lanes(
        &self,
        kind: AnalysisKind,
        files: &BTreeMap<Lane, StagedFile>,
    ) -> Result<LaneAnalysis, ApiError> {
        debug_assert!(kind.is_lane_keyed());
        let path = match kind {
            AnalysisKind::Emergency => "/upload-emergency",
            _ => "/upload-multi",
        };

        let mut form = Form::new();
        for (lane, file) in files {
            form = form.part(lane.field_key(), file_part(file));
        }

        debug!(%kind, lanes = files.len(), "uploading lane images");
        self.post_multipart(path, form).await
    }

    async fn geocode(&self, address: &str) -> Result<GeoPoint, ApiError> {
        let resp: GeocodeResponse = self
            .post_json("/api/geocode", &serde_json::json!({ "address": address }))
            .await?;
        Ok(GeoPoint {
            lat: resp.lat,
            lng: resp.lng,
            address: resp.address.or_else(|| Some(address.to_string())),
        })
    }

    async fn calculate_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteResult, ApiError> {
        let body = serde_json::json!({ "origin": origin, "destination": destination });
        let resp: RouteResponse = self.post_json("/api/calculate-route", &body).await?;
        Ok(RouteResult {
            points: resp
                .route
                .into_iter()
                .map(|[lat, lng]| GeoPoint::new(lat, lng))
                .collect(),
            distance_km: resp.distance_km,
            estimated_time_min: resp.estimated_time_min,
            node_count: resp.num_nodes,
        })
    }

    async fn network_stats(&self) -> Result<NetworkSummary, ApiError> {
        self.get_checked("/api/network-stats").await
    }
}
