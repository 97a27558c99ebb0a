use serde::{Deserialize, Serialize};

/// Raw filter input as it arrives from a frontend. `range` is a preset
/// (`today`, `last7days`, `last30days`, `thismonth`, `alltime`) used when
/// neither `from` nor `to` is given.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StatsParams {
    pub range: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub project: Option<String>,
    pub custom_title: Option<String>,
}
