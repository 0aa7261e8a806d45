pub mod api;
pub mod model;
pub mod output;
pub mod planner;
pub mod poller;
pub mod session;
pub mod signal_view;
pub mod viewport;
