// BinWatch: Report Task
//
// The single control loop of the firmware. Keeps the network associated,
// and every REPORT_PERIOD_MS runs one sample → estimate → deliver cycle.
// Everything runs on one thread and every call blocks; a lost network
// stalls the loop until the link comes back.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::*;
use crate::events::{BinIdentity, FillLevel, ReportOutcome};
use crate::fill;
use crate::report::{ReportClient, Resolver, Transport};
use crate::sampler::{PingChannel, RangeSampler};

/// Network association, treated as opaque: connected or not.
pub trait Network {
    fn is_connected(&self) -> bool;

    /// One association attempt. Blocks for as long as the platform needs.
    fn connect(&mut self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Disconnected,
    ConnectedIdle,
    Reporting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    pub period: Duration,
    pub poll: Duration,
    pub reconnect_poll: Duration,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(REPORT_PERIOD_MS),
            poll: Duration::from_millis(LOOP_POLL_MS),
            reconnect_poll: Duration::from_millis(RECONNECT_POLL_MS),
        }
    }
}

pub struct ReportScheduler<P, T, R, N> {
    bin: BinIdentity,
    bin_height_cm: u16,
    sampler: RangeSampler<P>,
    client: ReportClient<T, R>,
    network: N,
    timing: SchedulerTiming,
    state: SchedulerState,
    // Last known fullness; only replaced by a valid reading.
    fullness: FillLevel,
    last_report: Instant,
}

impl<P, T, R, N> ReportScheduler<P, T, R, N>
where
    P: PingChannel,
    T: Transport,
    R: Resolver,
    N: Network,
{
    pub fn new(
        bin: BinIdentity,
        bin_height_cm: u16,
        sampler: RangeSampler<P>,
        client: ReportClient<T, R>,
        network: N,
        timing: SchedulerTiming,
    ) -> Self {
        Self {
            bin,
            bin_height_cm,
            sampler,
            client,
            network,
            timing,
            state: SchedulerState::Disconnected,
            fullness: FillLevel::EMPTY,
            last_report: Instant::now(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn fullness(&self) -> FillLevel {
        self.fullness
    }

    /// Initial association. The first report follows one full period later.
    pub fn start(&mut self, now: Instant) {
        self.ensure_connected();
        self.last_report = now;
    }

    /// Check the link and, if it is down, block until it is back. There is
    /// no attempt cap and no backoff.
    pub fn ensure_connected(&mut self) {
        if self.network.is_connected() {
            if self.state == SchedulerState::Disconnected {
                self.state = SchedulerState::ConnectedIdle;
            }
            return;
        }

        if self.state != SchedulerState::Disconnected {
            log::warn!("Network link lost");
        }
        self.state = SchedulerState::Disconnected;
        log::info!("Connecting to WiFi");

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match self.network.connect() {
                Ok(()) if self.network.is_connected() => break,
                Ok(()) => log::debug!("Association attempt {} pending", attempts),
                Err(e) => log::warn!("Association attempt {} failed: {}", attempts, e),
            }
            if !self.timing.reconnect_poll.is_zero() {
                thread::sleep(self.timing.reconnect_poll);
            }
        }

        log::info!("WiFi connected after {} attempt(s)", attempts);
        self.state = SchedulerState::ConnectedIdle;
    }

    /// Run a report cycle if a full period has passed since the last one.
    pub fn poll(&mut self, now: Instant) -> Option<ReportOutcome> {
        if now.saturating_duration_since(self.last_report) < self.timing.period {
            return None;
        }

        self.state = SchedulerState::Reporting;
        let outcome = self.run_cycle();
        // Stamp with the cycle start so report time does not add drift.
        self.last_report = now;
        self.state = SchedulerState::ConnectedIdle;
        Some(outcome)
    }

    /// One sample → estimate → deliver pass. Success or failure, control
    /// comes back here.
    pub fn run_cycle(&mut self) -> ReportOutcome {
        let distance = self.sampler.measure();

        match fill::estimate(distance, self.bin_height_cm) {
            Some(level) => self.fullness = level,
            None => {
                log::warn!("No echo from sonar (out of range or wiring), keeping last value")
            }
        }

        match distance {
            Some(d) => log::info!(
                "Bin {}: distance={} => fullness={}",
                self.bin.bin_id,
                d,
                self.fullness
            ),
            None => log::info!(
                "Bin {}: distance=none => fullness={}",
                self.bin.bin_id,
                self.fullness
            ),
        }

        let outcome = self.client.deliver(&self.bin, self.fullness);
        if !outcome.is_delivered() {
            log::warn!(
                "Report for bin {} not delivered: {:?}",
                self.bin.bin_id,
                outcome
            );
        }
        outcome
    }

    /// One loop iteration: the link is checked (and restored) before any
    /// sampling or delivery happens.
    pub fn tick(&mut self, now: Instant) -> Option<ReportOutcome> {
        self.ensure_connected();
        self.poll(now)
    }

    /// The perpetual control loop.
    pub fn run(mut self) -> ! {
        loop {
            self.tick(Instant::now());
            thread::sleep(self.timing.poll);
        }
    }

    #[cfg(test)]
    fn client(&self) -> &ReportClient<T, R> {
        &self.client
    }
}

/// Firmware entry for the report loop: associate, then report forever.
pub fn report_task<P, T, R, N>(mut scheduler: ReportScheduler<P, T, R, N>) -> !
where
    P: PingChannel,
    T: Transport,
    R: Resolver,
    N: Network,
{
    log::info!("Report task started");
    scheduler.start(Instant::now());
    scheduler.run()
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::report::tests::{resolves, RecordingTransport, BIN, HOST_URL, IP_URL};
    use crate::sampler::tests::ScriptedChannel;

    /// Order in which the link and the sonar were touched.
    type Journal = Rc<RefCell<Vec<&'static str>>>;

    /// Link that comes up after a number of failed attempts and can be
    /// dropped from the test.
    struct FlakyNetwork {
        up: Cell<bool>,
        fail_first: u32,
        attempts: u32,
        journal: Journal,
    }

    impl FlakyNetwork {
        fn up() -> Self {
            Self {
                up: Cell::new(true),
                fail_first: 0,
                attempts: 0,
                journal: Journal::default(),
            }
        }

        fn down(fail_first: u32) -> Self {
            Self {
                up: Cell::new(false),
                fail_first,
                attempts: 0,
                journal: Journal::default(),
            }
        }
    }

    impl Network for FlakyNetwork {
        fn is_connected(&self) -> bool {
            self.up.get()
        }

        fn connect(&mut self) -> anyhow::Result<()> {
            self.attempts += 1;
            self.journal.borrow_mut().push("connect");
            if self.attempts <= self.fail_first {
                anyhow::bail!("no AP in range");
            }
            self.up.set(true);
            Ok(())
        }
    }

    struct JournaledChannel {
        inner: ScriptedChannel,
        journal: Journal,
    }

    impl PingChannel for JournaledChannel {
        fn ping(&mut self) -> Option<u32> {
            self.journal.borrow_mut().push("ping");
            self.inner.ping()
        }
    }

    const FAST: SchedulerTiming = SchedulerTiming {
        period: Duration::from_millis(5000),
        poll: Duration::ZERO,
        reconnect_poll: Duration::ZERO,
    };

    type TestScheduler = ReportScheduler<
        JournaledChannel,
        RecordingTransport,
        crate::report::tests::FixedResolver,
        FlakyNetwork,
    >;

    fn scheduler(
        channel: ScriptedChannel,
        transport: RecordingTransport,
        network: FlakyNetwork,
    ) -> TestScheduler {
        ReportScheduler::new(
            BIN,
            100,
            RangeSampler::new(
                JournaledChannel {
                    inner: channel,
                    journal: Rc::clone(&network.journal),
                },
                5,
                Duration::ZERO,
            ),
            ReportClient::new(transport, resolves()),
            network,
            FAST,
        )
    }

    fn bodies(s: &TestScheduler) -> Vec<String> {
        s.client().transport().sent.iter().map(|(_, b)| b.clone()).collect()
    }

    #[test]
    fn starts_disconnected_and_blocks_until_associated() {
        let mut s = scheduler(
            ScriptedChannel::from_cm(&[]),
            RecordingTransport::default(),
            FlakyNetwork::down(3),
        );
        assert_eq!(s.state(), SchedulerState::Disconnected);

        s.start(Instant::now());

        assert_eq!(s.state(), SchedulerState::ConnectedIdle);
        assert_eq!(s.network.attempts, 4);
    }

    #[test]
    fn reports_only_after_a_full_period() {
        let mut s = scheduler(
            ScriptedChannel::from_cm(&[70; 5]),
            RecordingTransport::default().reply(HOST_URL, Ok(204)),
            FlakyNetwork::up(),
        );
        let t0 = Instant::now();
        s.start(t0);

        assert_eq!(s.poll(t0 + Duration::from_millis(4999)), None);
        assert_eq!(
            s.poll(t0 + Duration::from_millis(5000)),
            Some(ReportOutcome::Delivered(204))
        );
        assert_eq!(s.fullness(), FillLevel::saturating(30));
        assert_eq!(s.state(), SchedulerState::ConnectedIdle);
        assert_eq!(bodies(&s), vec![r#"{"fullness":30}"#.to_string()]);
    }

    #[test]
    fn next_period_counts_from_cycle_start() {
        let mut s = scheduler(
            ScriptedChannel::from_cm(&[50; 10]),
            RecordingTransport::default()
                .reply(HOST_URL, Ok(204))
                .reply(HOST_URL, Ok(204)),
            FlakyNetwork::up(),
        );
        let t0 = Instant::now();
        s.start(t0);

        let first = t0 + Duration::from_millis(5200);
        assert!(s.poll(first).is_some());
        assert_eq!(s.poll(first + Duration::from_millis(4999)), None);
        assert!(s.poll(first + Duration::from_millis(5000)).is_some());
    }

    #[test]
    fn no_echo_keeps_and_resends_last_value() {
        let mut echoes: Vec<Option<u32>> = vec![Some(58 * US_ROUNDTRIP_CM); 5];
        echoes.extend([None; 5]);
        let mut s = scheduler(
            ScriptedChannel::new(echoes),
            RecordingTransport::default()
                .reply(HOST_URL, Ok(204))
                .reply(HOST_URL, Ok(204)),
            FlakyNetwork::up(),
        );
        s.start(Instant::now());

        assert!(s.run_cycle().is_delivered());
        assert_eq!(s.fullness().percent(), 42);

        assert!(s.run_cycle().is_delivered());
        assert_eq!(s.fullness().percent(), 42);
        assert_eq!(bodies(&s), vec![r#"{"fullness":42}"#.to_string(); 2]);
    }

    #[test]
    fn fallback_delivery_counts_as_success() {
        let mut s = scheduler(
            ScriptedChannel::from_cm(&[100; 5]),
            RecordingTransport::default()
                .reply(HOST_URL, Err("mdns timeout"))
                .reply(IP_URL, Ok(204)),
            FlakyNetwork::up(),
        );
        s.start(Instant::now());

        assert_eq!(s.run_cycle(), ReportOutcome::Delivered(204));
        assert_eq!(s.client().transport().sent.len(), 2);
    }

    #[test]
    fn failed_delivery_returns_to_idle() {
        let mut s = scheduler(
            ScriptedChannel::from_cm(&[10; 5]),
            RecordingTransport::default(),
            FlakyNetwork::up(),
        );
        let t0 = Instant::now();
        s.start(t0);

        assert_eq!(
            s.poll(t0 + Duration::from_secs(6)),
            Some(ReportOutcome::TransportFailed)
        );
        assert_eq!(s.state(), SchedulerState::ConnectedIdle);
        assert_eq!(s.fullness().percent(), 90);
    }

    #[test]
    fn lost_link_is_recovered_before_more_work() {
        let mut s = scheduler(
            ScriptedChannel::from_cm(&[]),
            RecordingTransport::default(),
            FlakyNetwork::up(),
        );
        s.start(Instant::now());
        assert_eq!(s.network.attempts, 0);

        s.network.up.set(false);
        s.network.fail_first = 2;
        s.ensure_connected();

        assert_eq!(s.state(), SchedulerState::ConnectedIdle);
        assert_eq!(s.network.attempts, 3);
    }

    #[test]
    fn due_report_waits_for_the_link_to_return() {
        let mut s = scheduler(
            ScriptedChannel::from_cm(&[40; 5]),
            RecordingTransport::default().reply(HOST_URL, Ok(204)),
            FlakyNetwork::up(),
        );
        let t0 = Instant::now();
        s.start(t0);

        s.network.up.set(false);
        s.network.fail_first = 2;
        let outcome = s.tick(t0 + Duration::from_millis(5000));

        assert_eq!(outcome, Some(ReportOutcome::Delivered(204)));
        assert_eq!(
            *s.network.journal.borrow(),
            vec!["connect", "connect", "connect", "ping", "ping", "ping", "ping", "ping"]
        );
        assert_eq!(s.client().transport().sent.len(), 1);
        assert_eq!(s.state(), SchedulerState::ConnectedIdle);
        assert_eq!(s.fullness().percent(), 60);
    }

    #[test]
    fn tick_before_the_period_only_checks_the_link() {
        let mut s = scheduler(
            ScriptedChannel::from_cm(&[40; 5]),
            RecordingTransport::default(),
            FlakyNetwork::up(),
        );
        let t0 = Instant::now();
        s.start(t0);

        assert_eq!(s.tick(t0 + Duration::from_millis(100)), None);
        assert!(s.network.journal.borrow().is_empty());
        assert!(s.client().transport().sent.is_empty());
    }
}
