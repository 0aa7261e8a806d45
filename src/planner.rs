//! Shortest-path planning: two geocode slots feeding a route calculation.

use tracing::{debug, info};

use crate::api::{ApiError, DashboardApi};
use crate::model::{GeoPoint, NetworkSummary, RouteResult};
use crate::viewport::{Viewport, derive_viewport};

/// Which of the planner's two endpoints a geocode targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Origin,
    Destination,
}

/// Client state for the routing view.
///
/// The two slots are independent: resolving or failing one never touches the
/// other. A failed route calculation keeps the previously displayed route.
#[derive(Default)]
pub struct RoutePlanner {
    origin: Option<GeoPoint>,
    destination: Option<GeoPoint>,
    route: Option<RouteResult>,
    error: Option<String>,
    network: Option<NetworkSummary>,
}

impl RoutePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(&self) -> Option<&GeoPoint> {
        self.origin.as_ref()
    }

    pub fn destination(&self) -> Option<&GeoPoint> {
        self.destination.as_ref()
    }

    pub fn route(&self) -> Option<&RouteResult> {
        self.route.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn network(&self) -> Option<NetworkSummary> {
        self.network
    }

    /// Mirrors the calculate button being enabled.
    pub fn can_calculate(&self) -> bool {
        self.origin.is_some() && self.destination.is_some()
    }

    /// Fetches the road-network summary once on mount. Purely informational;
    /// failure is ignored apart from a debug log.
    pub async fn load_network_summary(&mut self, api: &dyn DashboardApi) {
        match api.network_stats().await {
            Ok(summary) => {
                info!(edges = summary.num_edges, nodes = summary.num_nodes, "network loaded");
                self.network = Some(summary);
            }
            Err(err) => debug!(error = %err, "network summary fetch failed, ignoring"),
        }
    }

    /// Resolves `address` into the given slot. Blank input is a no-op.
    /// Failure clears only that slot and sets a user-visible message.
    pub async fn geocode(&mut self, api: &dyn DashboardApi, slot: Slot, address: &str) {
        let address = address.trim();
        if address.is_empty() {
            return;
        }

        let outcome = api.geocode(address).await;
        let target = match slot {
            Slot::Origin => &mut self.origin,
            Slot::Destination => &mut self.destination,
        };
        match outcome {
            Ok(point) => {
                debug!(?slot, lat = point.lat, lng = point.lng, "address resolved");
                *target = Some(point);
                self.error = None;
            }
            Err(ApiError::Server { .. }) => {
                *target = None;
                self.error = Some(format!("Could not find location: {address}"));
            }
            Err(err) => {
                debug!(error = %err, "geocode transport failure");
                *target = None;
                self.error = Some("Geocoding service unavailable".to_string());
            }
        }
    }

    pub async fn geocode_origin(&mut self, api: &dyn DashboardApi, address: &str) {
        self.geocode(api, Slot::Origin, address).await;
    }

    pub async fn geocode_destination(&mut self, api: &dyn DashboardApi, address: &str) {
        self.geocode(api, Slot::Destination, address).await;
    }

    /// Requests the route between the two resolved slots. Idempotent:
    /// re-invocation with unchanged endpoints simply re-issues the call.
    /// On failure the previous route (if any) stays displayed.
    pub async fn calculate_route(&mut self, api: &dyn DashboardApi) {
        let (Some(origin), Some(destination)) = (&self.origin, &self.destination) else {
            self.error = Some("Please set both valid origin and destination".to_string());
            return;
        };

        match api.calculate_route(origin, destination).await {
            Ok(route) => {
                info!(
                    points = route.points.len(),
                    distance_km = route.distance_km,
                    "route calculated"
                );
                self.route = Some(route);
                self.error = None;
            }
            Err(err) => {
                self.error = Some(match err.server_message() {
                    Some(m) => m.to_string(),
                    None => "Routing service unavailable".to_string(),
                });
            }
        }
    }

    /// The viewport for the current state: route bounds when a route exists,
    /// else centered on the origin, else the city default.
    pub fn viewport(&self) -> Viewport {
        derive_viewport(
            None,
            self.origin.as_ref(),
            self.route.as_ref().map(|r| r.points.as_slice()),
        )
    }
}
