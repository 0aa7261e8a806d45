//! Domain types shared across the analysis, routing, and telemetry workflows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Per-type vehicle counts (e.g. `"car" -> 12`), as reported by the backend.
pub type Breakdown = BTreeMap<String, u32>;

/// One of the four fixed directional approaches to the simulated intersection.
///
/// The wire name in responses is the direction (`"North"`); the multipart
/// form field key on upload is the positional id (`"lane1"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Lane {
    North,
    East,
    South,
    West,
}

impl Lane {
    /// All lanes in their fixed submission order (lane1..lane4).
    pub const ALL: [Lane; 4] = [Lane::North, Lane::East, Lane::South, Lane::West];

    /// The multipart field key used when uploading this lane's image.
    pub fn field_key(&self) -> &'static str {
        match self {
            Lane::North => "lane1",
            Lane::East => "lane2",
            Lane::South => "lane3",
            Lane::West => "lane4",
        }
    }

    /// Parses a form field key (`"lane1"`..`"lane4"`) back into a lane.
    pub fn from_field_key(key: &str) -> Option<Lane> {
        Lane::ALL.into_iter().find(|l| l.field_key() == key)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lane::North => "North",
            Lane::East => "East",
            Lane::South => "South",
            Lane::West => "West",
        };
        f.write_str(name)
    }
}

/// The kind of analysis a session performs. Determines the accepted media
/// category, whether the payload is a single blob or lane-keyed, and which
/// upload endpoint receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Image,
    Video,
    MultiLane,
    Emergency,
}

impl AnalysisKind {
    /// Media category this kind accepts for staged files.
    pub fn accepted_category(&self) -> MediaCategory {
        match self {
            AnalysisKind::Video => MediaCategory::Video,
            _ => MediaCategory::Image,
        }
    }

    /// True for kinds whose payload is a lane-keyed mapping.
    pub fn is_lane_keyed(&self) -> bool {
        matches!(self, AnalysisKind::MultiLane | AnalysisKind::Emergency)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisKind::Image => "image",
            AnalysisKind::Video => "video",
            AnalysisKind::MultiLane => "multi-lane",
            AnalysisKind::Emergency => "emergency",
        };
        f.write_str(name)
    }
}

/// Coarse media category, derived locally from the file extension. Used to
/// reject a wrong-category selection before any network traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Image,
    Video,
}

impl MediaCategory {
    const IMAGE_EXTS: [&'static str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];
    const VIDEO_EXTS: [&'static str; 4] = ["mp4", "avi", "mov", "mkv"];

    /// Classifies a file name by extension. Unknown extensions return `None`.
    pub fn from_path(path: &str) -> Option<MediaCategory> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        if Self::IMAGE_EXTS.contains(&ext.as_str()) {
            Some(MediaCategory::Image)
        } else if Self::VIDEO_EXTS.contains(&ext.as_str()) {
            Some(MediaCategory::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaCategory::Image => f.write_str("image"),
            MediaCategory::Video => f.write_str("video"),
        }
    }
}

/// A file staged for upload: its original name plus raw contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl StagedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    pub fn category(&self) -> Option<MediaCategory> {
        MediaCategory::from_path(&self.name)
    }
}

/// Result of a single-image analysis.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageResult {
    pub vehicle_count: u32,
    #[serde(default)]
    pub breakdown: Breakdown,
    pub result_image: String,
}

/// Summary of one processed video frame, in processing order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrameSummary {
    pub frame_number: u32,
    pub vehicle_count: u32,
    pub frame_image: String,
}

/// Result of a frame-by-frame video analysis.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoResult {
    pub total_frames: u32,
    pub fps: f64,
    pub processed_frames: u32,
    pub avg_vehicles_per_frame: f64,
    #[serde(default)]
    pub overall_breakdown: Breakdown,
    #[serde(default)]
    pub frames: Vec<FrameSummary>,
}

impl VideoResult {
    /// The leading frames shown as a preview gallery (the dashboard caps at 12).
    pub fn frames_preview(&self, n: usize) -> &[FrameSummary] {
        &self.frames[..self.frames.len().min(n)]
    }
}

/// Per-lane detection outcome inside a multi-lane or emergency analysis.
///
/// A lane that failed carries `error` and renders independently; it does not
/// invalidate sibling lanes or the overall signal decision.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LaneResult {
    pub lane: Lane,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub breakdown: Breakdown,
    #[serde(default)]
    pub emergency_count: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result_image: Option<String>,
}

/// Green/Red state of one lane's signal, as assigned by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Green,
    Red,
}

/// One entry in a signal decision, in server-supplied order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalEntry {
    pub lane: Lane,
    pub status: SignalStatus,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub has_emergency: Option<bool>,
    #[serde(default)]
    pub emergency_count: Option<u32>,
}

impl SignalEntry {
    /// True when this lane should carry the emergency overlay, independent
    /// of its Green/Red status.
    pub fn emergency(&self) -> bool {
        self.has_emergency.unwrap_or(false) || self.emergency_count.unwrap_or(0) > 0
    }
}

/// Server-computed signal assignment for the submitted lanes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalDecision {
    pub total_vehicles: u32,
    #[serde(default)]
    pub total_emergency: Option<u32>,
    pub green_lane: Lane,
    pub signals: Vec<SignalEntry>,
    #[serde(default)]
    pub priority_reason: Option<String>,
}

/// Combined payload of a multi-lane or emergency analysis response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LaneAnalysis {
    pub results: Vec<LaneResult>,
    pub signal_decision: SignalDecision,
}

/// Parsed outcome of one analysis submission, tagged by kind.
#[derive(Debug, Clone)]
pub enum AnalysisResult {
    Image(ImageResult),
    Video(VideoResult),
    Lanes(LaneAnalysis),
}

/// A geocoded position, with the free-text address it resolved from when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, address: None }
    }
}

/// A computed shortest path, origin-to-destination order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    pub points: Vec<GeoPoint>,
    pub distance_km: f64,
    pub estimated_time_min: f64,
    pub node_count: u32,
}

/// Size of the loaded road network, shown as an informational badge.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct NetworkSummary {
    pub num_edges: u64,
    pub num_nodes: u64,
}

/// One snapshot of live-feed statistics. Each poll tick replaces the held
/// sample wholesale; samples are never merged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TelemetrySample {
    pub vehicle_count: u32,
    #[serde(default)]
    pub breakdown: Breakdown,
    pub fps: f64,
    pub device: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_field_keys_round_trip() {
        for lane in Lane::ALL {
            assert_eq!(Lane::from_field_key(lane.field_key()), Some(lane));
        }
        assert_eq!(Lane::from_field_key("lane5"), None);
    }

    #[test]
    fn test_lane_wire_name() {
        let lane: Lane = serde_json::from_str("\"North\"").unwrap();
        assert_eq!(lane, Lane::North);
        assert_eq!(lane.field_key(), "lane1");
    }

    #[test]
    fn test_media_category_from_path() {
        assert_eq!(MediaCategory::from_path("a.JPG"), Some(MediaCategory::Image));
        assert_eq!(MediaCategory::from_path("clip.mp4"), Some(MediaCategory::Video));
        assert_eq!(MediaCategory::from_path("notes.txt"), None);
        assert_eq!(MediaCategory::from_path("noextension"), None);
    }

    #[test]
    fn test_signal_status_wire_format() {
        let s: SignalStatus = serde_json::from_str("\"GREEN\"").unwrap();
        assert_eq!(s, SignalStatus::Green);
        let s: SignalStatus = serde_json::from_str("\"RED\"").unwrap();
        assert_eq!(s, SignalStatus::Red);
    }

    #[test]
    fn test_signal_entry_emergency_overlay() {
        let entry: SignalEntry = serde_json::from_value(serde_json::json!({
            "lane": "East",
            "status": "RED",
            "count": 3,
            "has_emergency": true,
            "emergency_count": 1
        }))
        .unwrap();
        assert!(entry.emergency());
        assert_eq!(entry.status, SignalStatus::Red);
    }

    #[test]
    fn test_lane_result_defaults_for_error_entry() {
        // An errored lane arrives without breakdown or result_image.
        let r: LaneResult = serde_json::from_value(serde_json::json!({
            "lane": "South",
            "error": "No image uploaded",
            "count": 0
        }))
        .unwrap();
        assert_eq!(r.error.as_deref(), Some("No image uploaded"));
        assert!(r.breakdown.is_empty());
        assert!(r.result_image.is_none());
    }

    #[test]
    fn test_frames_preview_caps_length() {
        let frames = (0..20)
            .map(|i| FrameSummary {
                frame_number: i,
                vehicle_count: 0,
                frame_image: format!("f{i}.jpg"),
            })
            .collect();
        let v = VideoResult {
            total_frames: 20,
            fps: 30.0,
            processed_frames: 20,
            avg_vehicles_per_frame: 0.0,
            overall_breakdown: Breakdown::new(),
            frames,
        };
        assert_eq!(v.frames_preview(12).len(), 12);
        assert_eq!(v.frames_preview(100).len(), 20);
    }
}
