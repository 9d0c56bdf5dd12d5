use killtrack_protocol::{DeathReport, KillReport, SuicideReport};

use crate::state::ActiveShip;

/// What a single log line meant, if anything.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedEvent {
    /// The client announced a new game mode.
    ModeChange { mode: String },
    /// An entity entered a zone. `ship` is set when the zone was a ship and
    /// it became the active ship.
    ZoneEnter {
        zone: String,
        ship: Option<ActiveShip>,
    },
    /// The local player's ship was spawned by the respawn manager.
    ShipSpawn { ship: String },
    /// The active ship (or the local player) was destroyed.
    ShipDestroyed { ship: ActiveShip },
    /// The local player killed someone.
    Kill(KillReport),
    /// The local player was killed.
    Death(DeathReport),
    /// The local player killed themselves.
    Suicide(SuicideReport),
    /// Environment reset: the killer is `unknown`.
    Reset,
    /// Kill line deliberately ignored.
    Excluded(Exclusion),
    /// Kill line that could not be tokenized.
    ParseError { reason: String },
}

impl ClassifiedEvent {
    /// Whether this event is a kill, death or suicide report.
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::Kill(_) | Self::Death(_) | Self::Suicide(_))
    }

    /// Short name for log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModeChange { .. } => "mode_change",
            Self::ZoneEnter { .. } => "zone_enter",
            Self::ShipSpawn { .. } => "ship_spawn",
            Self::ShipDestroyed { .. } => "ship_destroyed",
            Self::Kill(_) => "kill",
            Self::Death(_) => "death",
            Self::Suicide(_) => "suicide",
            Self::Reset => "reset",
            Self::Excluded(_) => "excluded",
            Self::ParseError { .. } => "parse_error",
        }
    }
}

/// Why a kill line was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// The line mentions an NPC or creature archetype.
    IgnoredActor(&'static str),
    /// Simulated crash or self-destruct inside an arena mode.
    ArenaReset,
}

/// A classified line plus whether it may leave the process.
///
/// `upload_allowed` is false for every line read during backlog replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub event: ClassifiedEvent,
    pub upload_allowed: bool,
}

impl Classified {
    /// Whether the event should be handed to the dispatcher.
    pub fn is_uploadable(&self) -> bool {
        self.upload_allowed && self.event.is_reportable()
    }
}
