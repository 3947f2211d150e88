// BinWatch: One-Pin Sonar Driver
//
// HC-SR04-style ranging with trigger and echo wired to the same GPIO.
// The pin is flipped between output (trigger) and input (echo) with raw
// ESP-IDF calls, since the PinDriver mode is fixed at construction.

use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{AnyIOPin, InputOutput, Pin, PinDriver};

use crate::config::*;
use crate::sampler::PingChannel;

fn now_us() -> i64 {
    unsafe { esp_idf_sys::esp_timer_get_time() }
}

pub struct SinglePinSonar<'d> {
    pin: PinDriver<'d, AnyIOPin, InputOutput>,
    gpio: i32,
    max_echo_us: i64,
}

impl<'d> SinglePinSonar<'d> {
    /// `max_cm` bounds how long an echo may last before it counts as no echo.
    pub fn new(pin: AnyIOPin, max_cm: u16) -> anyhow::Result<Self> {
        let gpio = pin.pin() as i32;
        let mut pin = PinDriver::input_output(pin)?;
        pin.set_low()?;

        let max_cm = max_cm.min(SONAR_HARD_LIMIT_CM);
        let max_echo_us =
            i64::from(max_cm) * i64::from(US_ROUNDTRIP_CM) + i64::from(US_ROUNDTRIP_CM / 2);

        log::info!("Sonar on GPIO{} (max {} cm, echo timeout {} us)", gpio, max_cm, max_echo_us);
        Ok(Self {
            pin,
            gpio,
            max_echo_us,
        })
    }

    fn set_direction(&self, mode: esp_idf_sys::gpio_mode_t) -> anyhow::Result<()> {
        esp_idf_sys::esp!(unsafe { esp_idf_sys::gpio_set_direction(self.gpio, mode) })?;
        Ok(())
    }

    fn try_ping(&mut self) -> anyhow::Result<Option<u32>> {
        // Trigger: settle low, 10 µs high pulse, release.
        self.set_direction(esp_idf_sys::gpio_mode_t_GPIO_MODE_INPUT_OUTPUT)?;
        self.pin.set_low()?;
        Ets::delay_us(4);
        self.pin.set_high()?;
        Ets::delay_us(10);
        self.pin.set_low()?;
        self.set_direction(esp_idf_sys::gpio_mode_t_GPIO_MODE_INPUT)?;

        let triggered = now_us();
        while self.pin.is_low() {
            if now_us() - triggered > i64::from(ECHO_START_TIMEOUT_US) {
                return Ok(None);
            }
        }

        let echo_start = now_us();
        while self.pin.is_high() {
            if now_us() - echo_start > self.max_echo_us {
                return Ok(None);
            }
        }

        Ok(Some((now_us() - echo_start) as u32))
    }
}

impl PingChannel for SinglePinSonar<'_> {
    fn ping(&mut self) -> Option<u32> {
        match self.try_ping() {
            Ok(echo) => echo,
            Err(e) => {
                log::warn!("Sonar GPIO error: {}", e);
                None
            }
        }
    }
}
