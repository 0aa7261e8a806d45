//! Map-viewport derivation: center, zoom, and route bounding box.
//!
//! Pure functions; the map surface consumes the output. When a route is
//! present the preferred path is fitting its bounding box, but the
//! center/zoom pair is always derived too because the surface re-initializes
//! keyed on it (see [`Viewport::view_key`]).

use crate::model::GeoPoint;

/// Fallback city center (Bangalore) when nothing is resolved yet.
pub const DEFAULT_CENTER: LatLng = LatLng { lat: 12.9716, lng: 77.5946 };
/// Zoom for the fallback center.
pub const DEFAULT_ZOOM: u8 = 13;
/// Zoom used when centering on a resolved point.
pub const FOCUS_ZOOM: u8 = 12;
/// Ceiling applied when fitting a route's bounds, so short routes don't
/// over-zoom.
pub const MAX_FIT_ZOOM: u8 = 14;
/// Padding, in pixels, around a fitted bounding box.
pub const FIT_PADDING_PX: u32 = 80;

/// A bare latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<&GeoPoint> for LatLng {
    fn from(p: &GeoPoint) -> Self {
        LatLng { lat: p.lat, lng: p.lng }
    }
}

/// Minimal axis-aligned box covering a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    /// Spans the min/max latitude and longitude across `points`.
    /// Returns `None` for fewer than two points — a single point is centered
    /// on, not fitted.
    pub fn spanning(points: &[GeoPoint]) -> Option<LatLngBounds> {
        if points.len() < 2 {
            return None;
        }
        let mut min_lat = f64::INFINITY;
        let mut min_lng = f64::INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        let mut max_lng = f64::NEG_INFINITY;
        for p in points {
            min_lat = min_lat.min(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lat = max_lat.max(p.lat);
            max_lng = max_lng.max(p.lng);
        }
        Some(LatLngBounds {
            south_west: LatLng { lat: min_lat, lng: min_lng },
            north_east: LatLng { lat: max_lat, lng: max_lng },
        })
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }
}

/// Instruction for the map surface: where to look and how.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
    /// When set, the surface fits this box (with [`FIT_PADDING_PX`] and
    /// [`MAX_FIT_ZOOM`]) instead of using center/zoom directly.
    pub bounds: Option<LatLngBounds>,
}

impl Viewport {
    /// Structural identity over center and zoom. The map surface must be
    /// re-keyed (re-initialized) whenever this changes, even when a bounds
    /// fit is the preferred path.
    pub fn view_key(&self) -> String {
        format!("{}-{}-{}", self.center.lat, self.center.lng, self.zoom)
    }
}

/// Derives the viewport from the current routing state.
///
/// Priority: a route with two or more points yields its bounding box;
/// otherwise an explicit `center`, or the resolved `origin`, is focused at
/// [`FOCUS_ZOOM`]; otherwise the fixed [`DEFAULT_CENTER`] at [`DEFAULT_ZOOM`].
pub fn derive_viewport(
    center: Option<LatLng>,
    origin: Option<&GeoPoint>,
    route: Option<&[GeoPoint]>,
) -> Viewport {
    let (center, zoom) = match center.or(origin.map(LatLng::from)) {
        Some(c) => (c, FOCUS_ZOOM),
        None => (DEFAULT_CENTER, DEFAULT_ZOOM),
    };
    let bounds = route.and_then(LatLngBounds::spanning);
    Viewport { center, zoom, bounds }
}
