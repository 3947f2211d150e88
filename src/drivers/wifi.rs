// BinWatch: Wi-Fi Station Link
//
// Blocking station-mode association plus a best-effort mDNS responder so the
// board shows up as `esp32.local` next to the collector.

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::mdns::EspMdns;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use crate::config::*;
use crate::tasks::report::Network;

pub struct WifiLink<'d> {
    wifi: BlockingWifi<EspWifi<'d>>,
    mdns: Option<EspMdns>,
}

impl<'d> WifiLink<'d> {
    /// Configure and start the station. Association happens in `connect`.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let mut wifi =
            BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), Some(nvs))?, sysloop)?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: WIFI_SSID
                .try_into()
                .map_err(|_| anyhow::anyhow!("SSID '{}' is too long", WIFI_SSID))?,
            password: WIFI_PASS
                .try_into()
                .map_err(|_| anyhow::anyhow!("Wi-Fi password is too long"))?,
            auth_method: AuthMethod::WPA2Personal,
            ..Default::default()
        }))?;
        wifi.start()?;
        log::info!("Wi-Fi station started (SSID '{}')", WIFI_SSID);

        Ok(Self { wifi, mdns: None })
    }

    fn start_mdns(&mut self) {
        if self.mdns.is_some() {
            return;
        }
        let responder = EspMdns::take().and_then(|mut mdns| {
            mdns.set_hostname(MDNS_HOSTNAME)?;
            Ok(mdns)
        });
        match responder {
            Ok(mdns) => {
                log::info!("mDNS responder started as {}.local", MDNS_HOSTNAME);
                self.mdns = Some(mdns);
            }
            Err(e) => log::warn!("mDNS start failed ({}); continuing", e),
        }
    }
}

impl Network for WifiLink<'_> {
    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn connect(&mut self) -> anyhow::Result<()> {
        // A half-open previous attempt makes esp_wifi_connect refuse.
        if let Err(e) = self.wifi.disconnect() {
            log::debug!("Disconnect before reconnect failed: {}", e);
        }
        self.wifi.connect()?;
        self.wifi.wait_netif_up()?;

        let ip_info = self.wifi.wifi().sta_netif().get_ip_info()?;
        log::info!("WiFi connected. IP: {}", ip_info.ip);

        self.start_mdns();
        Ok(())
    }
}
