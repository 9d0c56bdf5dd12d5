use killtrack_protocol::{DeathEvent, KillReport};

/// Receives live reportable events from the tailing worker.
///
/// Every method is fire-and-forget: implementations must not block the
/// worker on network I/O.
pub trait Dispatcher: Send {
    fn report_kill(&mut self, report: KillReport);

    /// A death at someone else's hands, or a suicide.
    fn report_death(&mut self, event: DeathEvent);

    /// The local player boarded `ship`.
    fn notify_zone_enter(&mut self, ship: &str);
}
