// BinWatch: Hardware & System Configuration
// Target: ESP32 (Xtensa or RISC-V) with an HC-SR04-style sonar in one-pin mode

use std::time::Duration;

use crate::events::BinIdentity;

// ---------------------------------------------------------------------------
// Wi-Fi credentials (override at build time via BINWATCH_WIFI_SSID / _PASS)
// ---------------------------------------------------------------------------
pub const WIFI_SSID: &str = match option_env!("BINWATCH_WIFI_SSID") {
    Some(ssid) => ssid,
    None => "KS",
};
pub const WIFI_PASS: &str = match option_env!("BINWATCH_WIFI_PASS") {
    Some(pass) => pass,
    None => "12345679812",
};

/// Hostname the device announces through its own mDNS responder.
pub const MDNS_HOSTNAME: &str = "esp32";

// ---------------------------------------------------------------------------
// Collector endpoint
// ---------------------------------------------------------------------------
pub const COLLECTOR_HOST: &str = match option_env!("BINWATCH_HOST") {
    Some(host) => host,
    None => "KS.local",
};
pub const COLLECTOR_PORT: u16 = 5000;
pub const BIN_ID: u32 = 1; // only bin #1 is wired to this board

pub const BIN: BinIdentity = BinIdentity {
    bin_id: BIN_ID,
    host: COLLECTOR_HOST,
    port: COLLECTOR_PORT,
};

// ---------------------------------------------------------------------------
// Bin geometry
// ---------------------------------------------------------------------------
pub const BIN_HEIGHT_CM: u16 = 100; // 1 m bin, sensor mounted at the lid

// ---------------------------------------------------------------------------
// Sonar (trigger & echo on the same pin; the GPIO itself is picked in main)
// ---------------------------------------------------------------------------
pub const MAX_DISTANCE_CM: u16 = 400;       // safety cap for the echo timeout
pub const SONAR_HARD_LIMIT_CM: u16 = 500;   // no HC-SR04 ranges beyond this
pub const US_ROUNDTRIP_CM: u32 = 57;        // µs of echo per cm of distance
pub const PINGS_PER_SAMPLE: usize = 5;      // odd, so the median is a real reading
pub const PING_GAP_MS: u64 = 29;            // let the previous echo die out
pub const ECHO_START_TIMEOUT_US: u32 = 5800; // trigger → echo-high upper bound

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const REPORT_PERIOD_MS: u64 = 5000;
pub const LOOP_POLL_MS: u64 = 50;
pub const RECONNECT_POLL_MS: u64 = 500;

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
