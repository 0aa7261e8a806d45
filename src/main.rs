//! CLI entry point for the trafficdash client.
//!
//! Each subcommand mounts exactly one workflow against the backend: image,
//! video, or intersection analysis, shortest-path routing, live telemetry
//! watching, or the network summary.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use trafficdash::api::{DEFAULT_BASE_URL, DashboardApi, HttpDashboardApi};
use trafficdash::model::{AnalysisKind, AnalysisResult, Lane, StagedFile};
use trafficdash::output::{append_sample, print_json};
use trafficdash::planner::RoutePlanner;
use trafficdash::poller::TelemetryPoller;
use trafficdash::session::{AnalysisSession, Phase};
use trafficdash::signal_view::render_decision;

#[derive(Parser)]
#[command(name = "trafficdash")]
#[command(about = "Client for the smart traffic monitoring backend", long_about = None)]
struct Cli {
    /// Backend base URL (falls back to TRAFFICDASH_BASE_URL, then localhost)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single traffic image
    Image {
        /// Path to the image file
        #[arg(value_name = "FILE")]
        file: String,
    },
    /// Analyze a traffic video frame by frame
    Video {
        /// Path to the video file
        #[arg(value_name = "FILE")]
        file: String,
    },
    /// Analyze a four-lane intersection from per-lane images
    Lanes {
        /// Image for the North approach
        #[arg(long)]
        lane1: Option<String>,

        /// Image for the East approach
        #[arg(long)]
        lane2: Option<String>,

        /// Image for the South approach
        #[arg(long)]
        lane3: Option<String>,

        /// Image for the West approach
        #[arg(long)]
        lane4: Option<String>,

        /// Use the emergency-vehicle priority analysis
        #[arg(long, default_value_t = false)]
        emergency: bool,
    },
    /// Calculate the shortest path between two addresses
    Route {
        /// Origin address
        #[arg(long)]
        from: String,

        /// Destination address
        #[arg(long)]
        to: String,
    },
    /// Poll live telemetry at a fixed period
    Watch {
        /// Poll period in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        period_ms: u64,

        /// Number of samples to collect (0 = until Ctrl+C)
        #[arg(short = 'n', long, default_value_t = 10)]
        samples: usize,

        /// Optional CSV file to append samples to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show the loaded road-network summary
    Network,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/trafficdash.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trafficdash.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let base_url = cli
        .base_url
        .or_else(|| std::env::var("TRAFFICDASH_BASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let api = HttpDashboardApi::new(base_url)?;

    match cli.command {
        Commands::Image { file } => analyze_single(&api, AnalysisKind::Image, &file).await?,
        Commands::Video { file } => analyze_single(&api, AnalysisKind::Video, &file).await?,
        Commands::Lanes { lane1, lane2, lane3, lane4, emergency } => {
            let kind = if emergency {
                AnalysisKind::Emergency
            } else {
                AnalysisKind::MultiLane
            };
            let paths = [lane1, lane2, lane3, lane4];
            analyze_lanes(&api, kind, paths).await?;
        }
        Commands::Route { from, to } => plan_route(&api, &from, &to).await?,
        Commands::Watch { period_ms, samples, output } => {
            watch_telemetry(api, period_ms, samples, output).await?;
        }
        Commands::Network => {
            let summary = api.network_stats().await?;
            info!(
                num_edges = summary.num_edges,
                num_nodes = summary.num_nodes,
                "Road network summary"
            );
        }
    }

    Ok(())
}

/// Stages a file from disk, keeping its original name for category checks
/// and multipart filenames.
fn stage_file(path: &str) -> Result<StagedFile> {
    let name = Path::new(path)
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or(path)
        .to_string();
    let bytes = std::fs::read(path)?;
    Ok(StagedFile::new(name, bytes))
}

/// Runs one image or video analysis session to completion.
async fn analyze_single(api: &HttpDashboardApi, kind: AnalysisKind, file: &str) -> Result<()> {
    let mut session = AnalysisSession::new(kind);
    if let Err(err) = session.select(stage_file(file)?) {
        bail!("{err}");
    }

    info!(%kind, file, "Submitting analysis");
    session.run_submit(api).await?;

    match (session.phase(), session.result()) {
        (Phase::Displaying, Some(result)) => report_result(api, result),
        _ => bail!("{}", session.error().unwrap_or("analysis failed")),
    }
}

/// Runs an intersection session over the provided lane images.
async fn analyze_lanes(
    api: &HttpDashboardApi,
    kind: AnalysisKind,
    paths: [Option<String>; 4],
) -> Result<()> {
    let mut session = AnalysisSession::new(kind);
    for (lane, path) in Lane::ALL.into_iter().zip(paths) {
        if let Some(path) = path {
            if let Err(err) = session.select_lane(lane, stage_file(&path)?) {
                bail!("{lane}: {err}");
            }
        }
    }
    if !session.can_submit() {
        bail!("please provide at least one lane image");
    }

    let submitted = session.staged_lanes();
    info!(%kind, lanes = submitted.len(), "Submitting intersection analysis");
    session.run_submit(api).await?;

    let lanes = match session.phase() {
        Phase::Displaying => match session.result() {
            Some(AnalysisResult::Lanes(lanes)) => lanes.clone(),
            _ => bail!("unexpected result shape for {kind} analysis"),
        },
        _ => bail!("{}", session.error().unwrap_or("analysis failed")),
    };

    let rendered = render_decision(&lanes.signal_decision);
    for warning in &rendered.warnings {
        warn!(%warning, "Decision invariant violated");
    }

    info!(
        total_vehicles = rendered.total_vehicles,
        total_emergency = rendered.total_emergency,
        green_lane = %rendered.green_lane,
        "Signal decision"
    );
    if let Some(reason) = &rendered.priority_reason {
        info!(reason = %reason, "Priority decision logic");
    }
    for view in &rendered.lanes {
        info!(
            lane = %view.lane,
            light = ?view.light,
            count = view.count,
            emergency = view.emergency,
            emergency_count = view.emergency_count,
            "Lane signal"
        );
    }
    for result in &lanes.results {
        match &result.error {
            Some(err) => warn!(lane = %result.lane, error = %err, "Lane failed"),
            None => info!(
                lane = %result.lane,
                count = result.count,
                emergency_count = result.emergency_count,
                "Lane result"
            ),
        }
    }

    Ok(())
}

fn report_result(api: &HttpDashboardApi, result: &AnalysisResult) -> Result<()> {
    match result {
        AnalysisResult::Image(image) => {
            info!(vehicle_count = image.vehicle_count, "Detection results");
            print_json(&image.breakdown)?;
        }
        AnalysisResult::Video(video) => {
            info!(
                total_frames = video.total_frames,
                processed_frames = video.processed_frames,
                fps = video.fps,
                avg_vehicles_per_frame = video.avg_vehicles_per_frame,
                "Video analysis results"
            );
            print_json(&video.overall_breakdown)?;
            for frame in video.frames_preview(12) {
                info!(
                    frame = frame.frame_number,
                    vehicles = frame.vehicle_count,
                    url = %api.frame_url(&frame.frame_image),
                    "Sample frame"
                );
            }
        }
        AnalysisResult::Lanes(_) => unreachable!("single analysis never yields lane results"),
    }
    Ok(())
}

/// Geocodes both endpoints, calculates the route, and prints it together
/// with the derived map viewport.
async fn plan_route(api: &HttpDashboardApi, from: &str, to: &str) -> Result<()> {
    let mut planner = RoutePlanner::new();
    planner.load_network_summary(api).await;
    if let Some(network) = planner.network() {
        info!(roads = network.num_edges, "Road network active");
    }

    planner.geocode_origin(api, from).await;
    planner.geocode_destination(api, to).await;
    if !planner.can_calculate() {
        bail!("{}", planner.error().unwrap_or("could not resolve both addresses"));
    }

    planner.calculate_route(api).await;
    let Some(route) = planner.route() else {
        bail!("{}", planner.error().unwrap_or("route calculation failed"));
    };

    info!(
        distance_km = route.distance_km,
        estimated_time_min = route.estimated_time_min,
        steps = route.node_count,
        points = route.points.len(),
        "Route calculated"
    );

    let viewport = planner.viewport();
    info!(
        center_lat = viewport.center.lat,
        center_lng = viewport.center.lng,
        zoom = viewport.zoom,
        view_key = %viewport.view_key(),
        "Map viewport"
    );
    if let Some(bounds) = viewport.bounds {
        info!(
            south_west = %format!("{},{}", bounds.south_west.lat, bounds.south_west.lng),
            north_east = %format!("{},{}", bounds.north_east.lat, bounds.north_east.lng),
            "Fit bounds"
        );
    }

    Ok(())
}

/// Polls telemetry until `samples` are collected or Ctrl+C.
async fn watch_telemetry(
    api: HttpDashboardApi,
    period_ms: u64,
    samples: usize,
    output: Option<String>,
) -> Result<()> {
    let api: Arc<dyn DashboardApi> = Arc::new(api);
    let poller = TelemetryPoller::spawn(api, Duration::from_millis(period_ms));
    let mut rx = poller.subscribe();

    if samples == 0 {
        info!(period_ms, "Watching telemetry. Press Ctrl+C to stop.");
    } else {
        info!(period_ms, samples, "Watching telemetry");
    }

    let mut seen = 0usize;
    loop {
        if samples > 0 && seen >= samples {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping poller");
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(sample) = rx.borrow_and_update().clone() else {
                    continue;
                };
                seen += 1;
                info!(
                    vehicles = sample.vehicle_count,
                    fps = sample.fps,
                    device = %sample.device,
                    timestamp = %sample.timestamp,
                    "Telemetry sample"
                );
                if let Some(path) = &output {
                    append_sample(path, &sample)?;
                }
            }
        }
    }

    poller.join().await;
    Ok(())
}
