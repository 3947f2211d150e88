// BinWatch: ESP-IDF peripheral drivers (device builds only)

pub mod http;
pub mod sonar;
pub mod wifi;
