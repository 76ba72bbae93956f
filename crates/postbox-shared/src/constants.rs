/// Job action: refresh the message list.
pub const ACTION_RICH_PUSH_MESSAGES_UPDATE: &str = "ACTION_RICH_PUSH_MESSAGES_UPDATE";

/// Job action: push pending read/delete state without refetching.
pub const ACTION_SYNC_MESSAGE_STATE: &str = "ACTION_SYNC_MESSAGE_STATE";

/// Job action: create or update the inbox user.
pub const ACTION_RICH_PUSH_USER_UPDATE: &str = "ACTION_RICH_PUSH_USER_UPDATE";

/// Job extra (bool) that bypasses the user update throttle.
pub const EXTRA_FORCEFULLY: &str = "EXTRA_FORCEFULLY";

/// Preference key holding the message list cursor (ms since epoch).
pub const LAST_MESSAGE_REFRESH_TIME: &str = "postbox.user.LAST_MESSAGE_REFRESH_TIME";

/// Preference key holding the last successful user update (ms since epoch).
pub const LAST_UPDATE_TIME: &str = "postbox.user.LAST_UPDATE_TIME";

/// Minimum spacing between non-forced user updates (24 hours).
pub const USER_UPDATE_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// JSON keys of a server message payload
pub const MESSAGE_ID_KEY: &str = "message_id";
pub const MESSAGE_TITLE_KEY: &str = "title";
pub const MESSAGE_SENT_KEY: &str = "message_sent";
pub const MESSAGE_EXPIRY_KEY: &str = "message_expiry";
pub const MESSAGE_UNREAD_KEY: &str = "unread";

/// Media type requested from the message center API
pub const API_ACCEPT_HEADER: &str = "application/vnd.urbanairship+json; version=3;";

/// Header carrying the channel identifier on authenticated calls
pub const CHANNEL_ID_HEADER: &str = "X-UA-Channel-ID";
