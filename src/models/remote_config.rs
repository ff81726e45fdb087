use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A project's remote configuration blob and its version.
///
/// `data` is opaque JSON text; it is never parsed on the cache path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConfigEntry {
    #[sqlx(rename = "pid")]
    pub project_id: String,
    pub data: String,
    pub version: i64,
}

impl ConfigEntry {
    pub fn new(project_id: impl Into<String>, version: i64, data: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            data: data.into(),
            version,
        }
    }
}

/// Version marker row used by the reconciler to find configs to propagate.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ConfigVersion {
    #[sqlx(rename = "pid")]
    pub project_id: String,
    pub version: i64,
    pub modified: bool,
}
