use serde::{Deserialize, Serialize};

/// Coarse game-mode family attached to kill and death reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillMode {
    /// Arena-style instanced modes (game mode prefixed with `EA_`).
    #[serde(rename = "ac-kill")]
    Arena,
    /// The persistent universe.
    #[serde(rename = "pu-kill")]
    Persistent,
}

impl KillMode {
    /// Prefix shared by every arena game mode.
    pub const ARENA_PREFIX: &'static str = "EA_";

    /// Derives the mode family from a raw game-mode string.
    pub fn from_game_mode(game_mode: &str) -> Self {
        if game_mode.starts_with(Self::ARENA_PREFIX) {
            Self::Arena
        } else {
            Self::Persistent
        }
    }
}

/// The local player killed another player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillReport {
    pub player: String,
    pub victim: String,
    pub time: String,
    pub zone: String,
    pub weapon: String,
    pub damage_type: String,
    pub rsi_profile: String,
    pub game_mode: String,
    pub mode: KillMode,
    pub client_ver: String,
    pub killers_ship: String,
    pub victim_ship: String,
    #[serde(default)]
    pub anonymize_state: bool,
}

/// The local player was killed by someone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathReport {
    pub killer: String,
    pub victim: String,
    pub time: String,
    pub zone: String,
    pub weapon: String,
    pub damage_type: String,
    pub rsi_profile: String,
    pub game_mode: String,
    pub mode: KillMode,
    pub killers_ship: String,
    pub victim_ship: String,
}

/// The local player killed themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuicideReport {
    pub player: String,
    pub time: String,
    pub zone: String,
}

/// Body posted to the death endpoint.
///
/// Serialized untagged: the service tells the two shapes apart by field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeathEvent {
    Killed(DeathReport),
    Suicide(SuicideReport),
}

impl DeathEvent {
    /// Timestamp of the event as it appeared in the log.
    pub fn time(&self) -> &str {
        match self {
            Self::Killed(d) => &d.time,
            Self::Suicide(s) => &s.time,
        }
    }
}
