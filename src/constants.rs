//! This module contains global constants used across the display and polling modules.

/// The total width of the panel in pixels.
pub const DISPLAY_WIDTH: u32 = 480;
/// The total height of the panel in pixels.
pub const DISPLAY_HEIGHT: u32 = 480;
/// Vertical centre of the panel.
pub const DISPLAY_CY: i32 = (DISPLAY_HEIGHT / 2) as i32;

// Album art card
/// Edge length requested from the renderer or the resize proxy.
pub const ART_SIZE: u32 = 420;
/// Where the decoder starts writing art into the framebuffer.
pub const ART_X_OFFSET: i32 = 30;
pub const ART_Y_OFFSET: i32 = 0;
/// Rounded card mask, stroked in the background colour over the art edges.
pub const ART_MASK_X: i32 = 20;
pub const ART_MASK_Y: i32 = -10;
pub const ART_MASK_SIZE: u32 = 440;
pub const ART_MASK_CORNER_RADIUS: u32 = 15;
pub const ART_MASK_STROKE: u32 = 10;

// Now playing overlay bar
/// Top of the text bar cleared before the overlay is drawn.
pub const OVERLAY_BAR_Y: i32 = 420;
pub const OVERLAY_BAR_HEIGHT: u32 = 60;
pub const OVERLAY_TEXT_X: i32 = 30;
/// Baseline of the large (track title) line.
pub const OVERLAY_PRIMARY_Y: i32 = DISPLAY_CY + 205;
/// Baseline of the small (artist) line.
pub const OVERLAY_SECONDARY_Y: i32 = DISPLAY_CY + 225;

// Clock face
pub const CLOCK_TIME_X: i32 = 20;
pub const CLOCK_TIME_Y: i32 = 240;
/// Magnification applied to the time font (10x20 cells become 80x160).
pub const CLOCK_TIME_SCALE: u32 = 8;
pub const CLOCK_DATE_X: i32 = 40;
pub const CLOCK_DATE_Y: i32 = 360;
pub const CLOCK_DATE_SCALE: u32 = 2;

// Polling
/// Pause between two poll cycles, on top of fetch latency.
pub const POLL_INTERVAL_MS: u64 = 500;
/// Consecutive non-playing polls tolerated before the track cache is dropped.
pub const IDLE_THRESHOLD: u32 = 10;
/// Consecutive failed status polls tolerated before the network is reset.
pub const ERROR_THRESHOLD: u32 = 5;

// Transport
/// Largest status/metadata body accepted from a single read.
pub const MAX_RESPONSE_BYTES: usize = 4096;
pub const CONNECT_TIMEOUT_MS: u64 = 2000;
pub const REQUEST_TIMEOUT_MS: u64 = 5000;
/// Bound on the album art download.
pub const ART_TIMEOUT_SECS: u64 = 15;
/// Bound on a single image decode.
pub const DECODE_TIMEOUT_SECS: u64 = 10;

// Time sync
pub const TIME_SYNC_ATTEMPTS: u32 = 5;
pub const TIME_SYNC_BACKOFF_SECS: u64 = 2;
pub const NTP_PORT: u16 = 123;
pub const NTP_SERVER: &str = "pool.ntp.org";

/// Artist value the renderer reports when it has none; `subtitle` is shown instead.
pub const UNKNOWN_ARTIST: &[&str] = &["unknow", "unknown"];
/// Marker in an art URI asking the renderer for its native size.
pub const ZERO_SIZE_MARKER: &str = "size=0";
pub const RESIZE_PROXY: &str = "https://wsrv.nl/";
