//! The tailing loop: one dedicated thread per monitored log.

use std::thread::JoinHandle;
use std::time::Duration;

use killtrack_protocol::DeathEvent;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::event::{Classified, ClassifiedEvent};
use crate::pipeline::LineProcessor;
use crate::shared::{CredentialCell, MonitorFlag};
use crate::source::{LineSource, SourceError};

/// How long to wait when the log has nothing new.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Drives a [`LineSource`] through a [`LineProcessor`] and forwards live
/// reportable events to a [`Dispatcher`].
pub struct TailWorker<D> {
    source: LineSource,
    processor: LineProcessor,
    dispatcher: D,
    monitor: MonitorFlag,
    credential: CredentialCell,
    poll_interval: Duration,
    /// Whether uploads are currently being withheld for lack of a key.
    withholding: bool,
}

impl<D: Dispatcher> TailWorker<D> {
    pub fn new(
        source: LineSource,
        processor: LineProcessor,
        dispatcher: D,
        monitor: MonitorFlag,
        credential: CredentialCell,
    ) -> Self {
        Self {
            source,
            processor,
            dispatcher,
            monitor,
            credential,
            poll_interval: DEFAULT_POLL_INTERVAL,
            withholding: false,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn processor(&self) -> &LineProcessor {
        &self.processor
    }

    /// Replays everything already in the log to rebuild session state.
    ///
    /// Nothing read here reaches the dispatcher. Returns the number of lines
    /// replayed.
    pub fn replay_backlog(&mut self) -> Result<usize, SourceError> {
        let lines = self.source.read_backlog()?;
        let mut events = 0usize;
        for line in &lines {
            if self.processor.process(line, false).is_some() {
                events += 1;
            }
        }
        let state = self.processor.state();
        info!(
            lines = lines.len(),
            events,
            game_mode = state.game_mode(),
            ship = state.active_ship_name(),
            "backlog replayed"
        );
        Ok(lines.len())
    }

    /// Processes every line available right now. Returns how many were read.
    pub fn pump(&mut self) -> Result<usize, SourceError> {
        let mut read = 0usize;
        while let Some(line) = self.source.poll_next()? {
            read += 1;
            if let Some(classified) = self.processor.process(&line, true) {
                self.forward(classified);
            }
        }
        Ok(read)
    }

    /// Polls until the monitor flag is cleared.
    pub fn run(&mut self) {
        info!(path = %self.source.path().display(), "tailing started");
        while self.monitor.is_active() {
            match self.pump() {
                Ok(_) => {}
                Err(e) => warn!(error = %e, "failed to read log"),
            }
            if !self.monitor.is_active() {
                break;
            }
            std::thread::sleep(self.poll_interval);
        }
        info!("tailing stopped");
    }

    fn forward(&mut self, classified: Classified) {
        let Classified {
            event,
            upload_allowed,
        } = classified;
        if !upload_allowed {
            return;
        }

        let zone_ship = match &event {
            ClassifiedEvent::ZoneEnter {
                ship: Some(ship), ..
            } => Some(ship.name.clone()),
            _ => None,
        };
        if !event.is_reportable() && zone_ship.is_none() {
            return;
        }

        if !self.credential.is_present() {
            if !self.withholding {
                warn!("no valid key, withholding uploads");
                self.withholding = true;
            }
            debug!(kind = event.kind(), "event withheld");
            return;
        }
        if self.withholding {
            info!("key available, uploads resumed");
            self.withholding = false;
        }

        match event {
            ClassifiedEvent::Kill(report) => {
                info!(victim = %report.victim, weapon = %report.weapon, "kill");
                self.dispatcher.report_kill(report);
            }
            ClassifiedEvent::Death(report) => {
                info!(killer = %report.killer, weapon = %report.weapon, "death");
                self.dispatcher.report_death(DeathEvent::Killed(report));
            }
            ClassifiedEvent::Suicide(report) => {
                info!(zone = %report.zone, "suicide");
                self.dispatcher.report_death(DeathEvent::Suicide(report));
            }
            _ => {
                if let Some(ship) = zone_ship {
                    self.dispatcher.notify_zone_enter(&ship);
                }
            }
        }
    }
}

impl<D: Dispatcher + 'static> TailWorker<D> {
    /// Moves the worker onto a named thread and runs it there.
    ///
    /// The worker is handed back when the thread finishes.
    pub fn spawn(mut self) -> std::io::Result<JoinHandle<Self>> {
        std::thread::Builder::new()
            .name("log-tail".into())
            .spawn(move || {
                self.run();
                self
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ReportContext;
    use crate::identity::Identity;
    use killtrack_protocol::KillReport;
    use std::io::Write;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    const MODE: &str = "<2024-01-01T00:00:00.000Z> [Notice] <Context Establisher Done> \
        establisher=\"X\" runningTime=1 map=\"megamap\" gamerules=\"EA_FreeFlight\" sessionId=\"s\"";
    const SHIP: &str = "<2024-01-01T00:00:01.000Z> [Notice] <OnEntityEnterZone> \
        -> Entity [AEGS_Gladius_123] [Team]";
    const KILL: &str = "<2024-01-01T00:00:02.000Z> [Notice] <Actor Death> CActor::Kill: \
        'PlayerB' [200001] in zone 'OOC_Stanton_1' killed by 'PlayerA' [100001] using \
        'KLWE_LaserRepeater_S3' [Class unknown] with damage type 'Bullet' from direction x";
    const DEATH: &str = "<2024-01-01T00:00:03.000Z> [Notice] <Actor Death> CActor::Kill: \
        'PlayerA' [100001] in zone 'OOC_Stanton_1' killed by 'PlayerC' [300001] using \
        'KLWE_LaserRepeater_S3' [Class unknown] with damage type 'Bullet' from direction x";

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<String>>>);

    impl Recording {
        fn calls(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Dispatcher for Recording {
        fn report_kill(&mut self, report: KillReport) {
            self.0.lock().unwrap().push(format!("kill:{}", report.victim));
        }

        fn report_death(&mut self, event: DeathEvent) {
            let label = match event {
                DeathEvent::Killed(d) => format!("death:{}", d.killer),
                DeathEvent::Suicide(s) => format!("suicide:{}", s.player),
            };
            self.0.lock().unwrap().push(label);
        }

        fn notify_zone_enter(&mut self, ship: &str) {
            self.0.lock().unwrap().push(format!("zone:{ship}"));
        }
    }

    fn append(path: &Path, lines: &[&str]) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    fn worker(path: &Path, credential: CredentialCell) -> (TailWorker<Recording>, Recording) {
        let recording = Recording::default();
        let processor = LineProcessor::new(
            Identity::new("PlayerA", Some("100001".into())),
            ReportContext::new("0.3.1", false),
        );
        let worker = TailWorker::new(
            LineSource::open(path).unwrap(),
            processor,
            recording.clone(),
            MonitorFlag::new(),
            credential,
        )
        .with_poll_interval(Duration::from_millis(10));
        (worker, recording)
    }

    #[test]
    fn backlog_rebuilds_state_without_dispatching() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        append(tmp.path(), &[MODE, SHIP, KILL, DEATH]);

        let (mut worker, recording) = worker(tmp.path(), CredentialCell::with_key("k"));
        assert_eq!(worker.replay_backlog().unwrap(), 4);

        assert!(recording.calls().is_empty());
        let state = worker.processor().state();
        assert_eq!(state.game_mode(), "EA_FreeFlight");
        assert_eq!(state.active_ship_name(), "AEGS_Gladius");
    }

    #[test]
    fn live_lines_are_dispatched_in_order() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        append(tmp.path(), &[MODE]);

        let (mut worker, recording) = worker(tmp.path(), CredentialCell::with_key("k"));
        worker.replay_backlog().unwrap();

        append(tmp.path(), &[SHIP, KILL, DEATH]);
        assert_eq!(worker.pump().unwrap(), 3);
        assert_eq!(
            recording.calls(),
            ["zone:AEGS_Gladius", "kill:PlayerB", "death:PlayerC"]
        );
    }

    #[test]
    fn missing_key_withholds_but_keeps_state() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let credential = CredentialCell::new();
        let (mut worker, recording) = worker(tmp.path(), credential.clone());
        worker.replay_backlog().unwrap();

        append(tmp.path(), &[MODE, SHIP, KILL]);
        worker.pump().unwrap();
        assert!(recording.calls().is_empty());
        assert_eq!(worker.processor().state().active_ship_name(), "AEGS_Gladius");

        credential.set("k");
        append(tmp.path(), &[KILL]);
        worker.pump().unwrap();
        assert_eq!(recording.calls(), ["kill:PlayerB"]);
    }

    #[test]
    fn spawned_worker_stops_on_flag() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let (worker, recording) = worker(tmp.path(), CredentialCell::with_key("k"));
        let monitor = worker.monitor.clone();

        let handle = worker.spawn().unwrap();
        append(tmp.path(), &[MODE, SHIP, KILL]);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while recording.calls().len() < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        monitor.stop();

        let worker = handle.join().unwrap();
        assert_eq!(recording.calls(), ["zone:AEGS_Gladius", "kill:PlayerB"]);
        assert_eq!(worker.processor().state().game_mode(), "EA_FreeFlight");
    }
}
