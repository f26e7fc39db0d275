use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Policies;
use crate::store::DataSet;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The only mutable state in the process: the selected fixture path, the
/// injected data set, and the runtime policies. Aggregation stays pure;
/// handlers borrow slices out of here.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub data: Option<DataSet>,
    pub policies: Policies,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            data: None,
            policies: Policies::default(),
        }
    }
}
