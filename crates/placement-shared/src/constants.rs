/// Application name
pub const APP_NAME: &str = "Placement";

/// Default interval between two unread-count polls, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Default page size for the notification dropdown
pub const DEFAULT_NOTIFICATION_PAGE_SIZE: u32 = 10;

/// Hard upper bound accepted for a notification page
pub const MAX_NOTIFICATION_PAGE_SIZE: u32 = 100;

/// Largest count rendered verbatim on a badge; above it the badge reads "99+"
pub const BADGE_CAP: u64 = 99;

/// Prefix of client-generated temporary message ids
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Prefix of ids generated for live frames that arrive without a server id
pub const LIVE_ID_PREFIX: &str = "live-";

/// Path of the live chat channel, relative to the API base URL
pub const LIVE_CHANNEL_PATH: &str = "ws";

/// Default HTTP port of the reference backend
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default HTTP request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
