//! Key layout for the two cached datasets.
//!
//! Remote config uses two keys per project (`v` version, `d` data). A
//! notification feed uses four keys per project that always share one TTL:
//! `t` active time, `v` views since last drain, `c` click counter hash and
//! `d` rendered feed.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: String,
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new("beacon")
    }
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn config_version(&self, project_id: &str) -> String {
        format!("{}:rc:{}.v", self.prefix, project_id)
    }

    pub fn config_data(&self, project_id: &str) -> String {
        format!("{}:rc:{}.d", self.prefix, project_id)
    }

    pub fn feed_time(&self, project_id: &str) -> String {
        format!("{}:nf:{}.t", self.prefix, project_id)
    }

    pub fn feed_views(&self, project_id: &str) -> String {
        format!("{}:nf:{}.v", self.prefix, project_id)
    }

    pub fn feed_clicks(&self, project_id: &str) -> String {
        format!("{}:nf:{}.c", self.prefix, project_id)
    }

    pub fn feed_data(&self, project_id: &str) -> String {
        format!("{}:nf:{}.d", self.prefix, project_id)
    }

    /// All four feed component keys in order: time, views, clicks, data.
    pub fn feed_components(&self, project_id: &str) -> [String; 4] {
        [
            self.feed_time(project_id),
            self.feed_views(project_id),
            self.feed_clicks(project_id),
            self.feed_data(project_id),
        ]
    }
}
