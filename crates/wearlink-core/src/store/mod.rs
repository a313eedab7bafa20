// ── Reactive caches ──
//
// Watch-side state mirrored from the phone, with change notification and
// whole-file JSON persistence.

mod collection;
mod dashboard;
mod media;
mod persist;

pub use dashboard::DashboardStore;
pub use media::MediaStore;

pub const DASHBOARD_FILE: &str = "dashboard.json";
pub const MEDIA_FILE: &str = "media.json";
