pub mod behavior;
pub mod core;
pub mod dashboards;
pub mod scores;
