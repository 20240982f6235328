use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Defaults to 100, clamped to 1..=1000.
    #[param(example = 50)]
    pub limit: Option<i64>,
}
