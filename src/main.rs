// BinWatch: Firmware Entry Point
//
// Boot sequence:
//   1. Initialise logging.
//   2. Take peripherals, the system event loop and the NVS partition.
//   3. Set up the one-pin sonar, the HTTP transport and the Wi-Fi station.
//   4. Associate with the network (blocking, retried forever).
//   5. Report bin fullness every REPORT_PERIOD_MS, forever.

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::time::Duration;

    use esp_idf_hal::gpio::IOPin;
    use esp_idf_hal::prelude::*;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;

    use binwatch::config::*;
    use binwatch::drivers::http::EspHttpTransport;
    use binwatch::drivers::sonar::SinglePinSonar;
    use binwatch::drivers::wifi::WifiLink;
    use binwatch::report::{ReportClient, SystemResolver};
    use binwatch::sampler::RangeSampler;
    use binwatch::tasks::report::{report_task, ReportScheduler, SchedulerTiming};

    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("BinWatch firmware starting (bin {} -> {})", BIN.bin_id, BIN.url());

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ---- Sonar (GPIO15, trigger & echo on one pin) -------------------------
    let sonar = SinglePinSonar::new(peripherals.pins.gpio15.downgrade(), MAX_DISTANCE_CM)?;
    let sampler = RangeSampler::new(sonar, PINGS_PER_SAMPLE, Duration::from_millis(PING_GAP_MS));

    // ---- Collector client --------------------------------------------------
    let client = ReportClient::new(EspHttpTransport::new(HTTP_TIMEOUT), SystemResolver);

    // ---- Wi-Fi -------------------------------------------------------------
    let network = WifiLink::new(peripherals.modem, sysloop, nvs)?;

    let scheduler = ReportScheduler::new(
        BIN,
        BIN_HEIGHT_CM,
        sampler,
        client,
        network,
        SchedulerTiming::default(),
    );

    // Single-threaded firmware: the report loop owns the main task forever.
    report_task(scheduler)
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!(
        "binwatch is ESP32 firmware; build it for an ESP-IDF target (e.g. riscv32imc-esp-espidf)"
    )
}
