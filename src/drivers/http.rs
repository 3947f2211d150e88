// BinWatch: HTTP Transport (ESP-IDF client)

use std::time::Duration;

use embedded_svc::http::client::Client;
use embedded_svc::http::Method;
use embedded_svc::io::Write;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

use crate::report::Transport;

/// Opens a fresh connection per request, like a one-shot `begin`/`end`.
pub struct EspHttpTransport {
    timeout: Duration,
}

impl EspHttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Transport for EspHttpTransport {
    fn patch(&mut self, url: &str, body: &[u8]) -> anyhow::Result<u16> {
        let connection = EspHttpConnection::new(&Configuration {
            timeout: Some(self.timeout),
            ..Default::default()
        })?;
        let mut client = Client::wrap(connection);

        let content_length = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("Content-Length", content_length.as_str()),
        ];

        let mut request = client.request(Method::Patch, url, &headers)?;
        request.write_all(body)?;
        request.flush()?;

        let response = request.submit()?;
        Ok(response.status())
    }
}
