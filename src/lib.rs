// BinWatch: Fill-Level Telemetry Library
//
// Everything with decision logic lives here and builds on any host:
//   sampler  - median-of-5 sonar ranging over a `PingChannel`
//   fill     - distance → fullness mapping
//   report   - JSON PATCH delivery with one fallback-by-address retry
//   tasks    - the periodic report loop and its connectivity state machine
// `drivers` binds the seams to ESP-IDF and is only built for the device.

pub mod config;
pub mod events;
pub mod fill;
pub mod report;
pub mod sampler;
pub mod tasks;

#[cfg(target_os = "espidf")]
pub mod drivers;
