//! Typed client for the traffic backend's HTTP API.
//!
//! [`DashboardApi`] is the seam the workflows program against; [`HttpDashboardApi`]
//! is the reqwest implementation. Tests substitute mock implementations.

mod http;

pub use http::{DEFAULT_BASE_URL, HttpDashboardApi};

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::{
    AnalysisKind, GeoPoint, ImageResult, Lane, LaneAnalysis, NetworkSummary, RouteResult,
    StagedFile, TelemetrySample, VideoResult,
};

/// How an API call failed.
///
/// The backend signals logical failure with `success: false` (or by omitting
/// `success: true` entirely), independent of the HTTP status code. Everything
/// else is a transport or decoding problem.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered but reported failure. Carries the server-provided
    /// message when one was present.
    #[error("server reported failure: {}", message.as_deref().unwrap_or("no message"))]
    Server { message: Option<String> },

    /// The request never completed (connection refused, timeout, etc).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered success but the body did not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ApiError {
    /// The server-supplied message, if this is a server-reported failure with one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Server { message } => message.as_deref(),
            _ => None,
        }
    }
}

/// The backend operations the dashboard workflows depend on.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// `GET /stats` — latest live-feed telemetry sample.
    async fn stats(&self) -> Result<TelemetrySample, ApiError>;

    /// `POST /upload-image` — single-image vehicle detection.
    async fn upload_image(&self, file: &StagedFile) -> Result<ImageResult, ApiError>;

    /// `POST /upload-video` — frame-by-frame video analysis.
    async fn upload_video(&self, file: &StagedFile) -> Result<VideoResult, ApiError>;

    /// `POST /upload-multi` or `/upload-emergency` — lane-keyed intersection
    /// analysis. `kind` selects the endpoint; only lane-keyed kinds are valid.
    async fn upload_lanes(
        &self,
        kind: AnalysisKind,
        files: &BTreeMap<Lane, StagedFile>,
    ) -> Result<LaneAnalysis, ApiError>;

    /// `POST /api/geocode` — resolve a free-text address to coordinates.
    async fn geocode(&self, address: &str) -> Result<GeoPoint, ApiError>;

    /// `POST /api/calculate-route` — shortest path between two points.
    async fn calculate_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteResult, ApiError>;

    /// `GET /api/network-stats` — road-network size, informational only.
    async fn network_stats(&self) -> Result<NetworkSummary, ApiError>;
}
