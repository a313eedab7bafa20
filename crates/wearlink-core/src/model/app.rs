// ── Launchable app descriptors ──

use serde::{Deserialize, Serialize};

/// A launchable activity on the phone: music players and the app drawer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppItem {
    #[serde(rename = "pkgName")]
    pub package_name: String,
    #[serde(rename = "activityName")]
    pub activity_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl AppItem {
    pub fn new(package_name: impl Into<String>, activity_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            activity_name: activity_name.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
