//! Session state and the line handlers that mutate it.
//!
//! All token positions are fixed by the client's log format; every lookup
//! that can miss degrades to "no change" instead of failing the line.

use std::collections::HashMap;

use killtrack_protocol::constants::NOT_APPLICABLE;
use tracing::{debug, info, trace};

use crate::event::ClassifiedEvent;
use crate::identity::Identity;
use crate::ships;

/// Game mode before any mode line has been seen.
pub const DEFAULT_GAME_MODE: &str = "Nothing";

/// The persistent-universe idle mode; entering it drops ship state.
pub const IDLE_GAME_MODE: &str = "SC_Default";

pub(crate) const MODE_MARKER: &str = "<Context Establisher Done>";
pub(crate) const SPAWN_MARKER: &str = "OnVehicleSpawned";
pub(crate) const VEHICLE_DESTRUCTION_MARKER: &str = "<Vehicle Destruction>";
pub(crate) const CLIENT_DEAD_MARKER: &str = "<local client>: Entering control state dead";
pub(crate) const ZONE_ENTER_MARKER: &str = "OnEntityEnterZone";
pub(crate) const JUMP_DRIVE_MARKER: &str = "<Jump Drive State Changed>";

/// Token holding `key="MODE"` on a mode line.
const MODE_TOKEN: usize = 8;

/// Token holding `[SHIP]` on a respawn-manager spawn line.
const SPAWN_TOKEN: usize = 5;

/// Characters stripped from both ends of a zone token.
const ZONE_TRIM: &[char] = &['[', ']', '\'', '('];

/// Where the zone token starts on a zone-transition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoneAnchor {
    Entity,
    JumpDrive,
}

impl ZoneAnchor {
    fn marker(self) -> &'static str {
        match self {
            Self::Entity => "-> Entity ",
            Self::JumpDrive => "adam: ",
        }
    }
}

/// The ship the local player currently occupies.
///
/// `id` is `None` only when the ship came from a spawn line, which does not
/// carry an instance id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveShip {
    pub name: String,
    pub id: Option<String>,
}

impl ActiveShip {
    /// Instance id, or `"N/A"` when unknown.
    pub fn id_or_na(&self) -> &str {
        self.id.as_deref().unwrap_or(NOT_APPLICABLE)
    }
}

/// Mutable state for one monitoring session.
///
/// Owned by the tailing worker; classification only reads it.
#[derive(Debug, Clone)]
pub struct SessionState {
    game_mode: String,
    active_ship: Option<ActiveShip>,
    zone_by_entity: HashMap<String, String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            game_mode: DEFAULT_GAME_MODE.to_string(),
            active_ship: None,
            zone_by_entity: HashMap::new(),
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn game_mode(&self) -> &str {
        &self.game_mode
    }

    pub fn active_ship(&self) -> Option<&ActiveShip> {
        self.active_ship.as_ref()
    }

    /// Active ship name, or `"N/A"`.
    pub fn active_ship_name(&self) -> &str {
        self.active_ship
            .as_ref()
            .map_or(NOT_APPLICABLE, |s| s.name.as_str())
    }

    /// Active ship instance id, or `"N/A"`.
    pub fn active_ship_id(&self) -> &str {
        self.active_ship
            .as_ref()
            .map_or(NOT_APPLICABLE, ActiveShip::id_or_na)
    }

    /// Last zone code recorded for an entity id.
    pub fn zone_for_entity(&self, entity_id: &str) -> Option<&str> {
        self.zone_by_entity.get(entity_id).map(String::as_str)
    }

    /// Number of entities with a recorded zone.
    pub fn tracked_entities(&self) -> usize {
        self.zone_by_entity.len()
    }

    /// Routes a line to the handler for its family.
    ///
    /// Returns the state event the line produced, or `None` when the line is
    /// not state-bearing or changed nothing.
    pub fn apply_line(&mut self, line: &str, identity: &Identity) -> Option<ClassifiedEvent> {
        if line.contains(MODE_MARKER) {
            self.apply_mode_line(line)
        } else if line.contains(SPAWN_MARKER) {
            self.apply_spawn_line(line, identity)
        } else if line.contains(VEHICLE_DESTRUCTION_MARKER) || line.contains(CLIENT_DEAD_MARKER) {
            self.apply_destroy_line(line)
        } else if line.contains(ZONE_ENTER_MARKER) {
            self.apply_zone_enter(line, ZoneAnchor::Entity)
        } else if line.contains(JUMP_DRIVE_MARKER) {
            self.apply_zone_enter(line, ZoneAnchor::JumpDrive)
        } else {
            None
        }
    }

    /// Handles a `<Context Establisher Done>` line.
    pub fn apply_mode_line(&mut self, line: &str) -> Option<ClassifiedEvent> {
        let Some(mode) = line
            .split_whitespace()
            .nth(MODE_TOKEN)
            .and_then(|token| token.split_once('='))
            .map(|(_, value)| value.trim_matches('"'))
            .filter(|mode| !mode.is_empty())
        else {
            debug!(line, "mode line without a mode token");
            return None;
        };

        let changed = mode != self.game_mode;
        if changed {
            info!(from = %self.game_mode, to = mode, "game mode changed");
            self.game_mode = mode.to_string();
        }

        if self.game_mode == IDLE_GAME_MODE
            && let Some(ship) = self.active_ship.take()
        {
            debug!(ship = %ship.name, "idle mode cleared active ship");
        }

        changed.then(|| ClassifiedEvent::ModeChange {
            mode: self.game_mode.clone(),
        })
    }

    fn apply_zone_enter(&mut self, line: &str, anchor: ZoneAnchor) -> Option<ClassifiedEvent> {
        let marker = anchor.marker();
        let Some(start) = line.find(marker) else {
            if let Some(ship) = self.active_ship.take() {
                debug!(ship = %ship.name, ?anchor, "zone line without anchor cleared active ship");
            }
            return None;
        };

        self.record_entity_zone(line);

        let zone = line[start + marker.len()..]
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_matches(ZONE_TRIM);
        if zone.is_empty() {
            return None;
        }

        let ship = ships::split_ship_token(zone).map(|(name, id)| ActiveShip {
            name: name.to_string(),
            id: Some(id.to_string()),
        });
        if let Some(ship) = &ship {
            info!(ship = %ship.name, id = ship.id_or_na(), "active ship changed");
            self.active_ship = Some(ship.clone());
        } else {
            trace!(zone, "entered non-ship zone");
        }

        Some(ClassifiedEvent::ZoneEnter {
            zone: zone.to_string(),
            ship,
        })
    }

    /// Records `Entity [<digits>]` → zone code when the line names both.
    fn record_entity_zone(&mut self, line: &str) {
        let (Some(zone), Some(entity)) = (
            bracketed_after(line, " Zone ["),
            bracketed_after(line, "Entity ["),
        ) else {
            return;
        };
        if entity.is_empty() || !entity.bytes().all(|b| b.is_ascii_digit()) {
            return;
        }

        let zone = zone.trim_matches(ZONE_TRIM);
        if zone.is_empty() {
            return;
        }
        let code = strip_instance_id(zone);
        trace!(entity, zone = code, "recorded entity zone");
        self.zone_by_entity
            .insert(entity.to_string(), code.to_string());
    }

    /// Handles a respawn-manager `OnVehicleSpawned` line for the local player.
    pub fn apply_spawn_line(&mut self, line: &str, identity: &Identity) -> Option<ClassifiedEvent> {
        if self.game_mode == IDLE_GAME_MODE || !identity.geid_in(line) {
            return None;
        }

        let name = line
            .split_whitespace()
            .nth(SPAWN_TOKEN)?
            .trim_start_matches('[')
            .trim_end_matches(']');
        if name.is_empty() {
            return None;
        }

        let id = self.active_ship.take().and_then(|ship| ship.id);
        info!(ship = name, "ship spawned");
        self.active_ship = Some(ActiveShip {
            name: name.to_string(),
            id,
        });

        Some(ClassifiedEvent::ShipSpawn {
            ship: name.to_string(),
        })
    }

    /// Handles a vehicle-destruction or client-death line.
    ///
    /// A vehicle destruction only counts when it mentions the active ship
    /// (by id, or by name when the id is unknown). Clearing an already-empty
    /// ship state is a no-op.
    pub fn apply_destroy_line(&mut self, line: &str) -> Option<ClassifiedEvent> {
        let ship = self.active_ship.as_ref()?;
        let ours = line.contains(CLIENT_DEAD_MARKER)
            || match &ship.id {
                Some(id) => line.contains(id.as_str()),
                None => line.contains(ship.name.as_str()),
            };
        if !ours {
            trace!("destruction of another vehicle");
            return None;
        }

        let ship = self.active_ship.take()?;
        info!(ship = %ship.name, id = ship.id_or_na(), "ship destroyed");
        Some(ClassifiedEvent::ShipDestroyed { ship })
    }
}

/// Text between `marker` and the next `]`.
fn bracketed_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let start = line.find(marker)? + marker.len();
    let rest = &line[start..];
    let end = rest.find(']')?;
    Some(&rest[..end])
}

/// Drops a trailing `_<digits>` instance id, if present.
fn strip_instance_id(zone: &str) -> &str {
    match zone.rsplit_once('_') {
        Some((code, id)) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => code,
        _ => zone,
    }
}
