//! Kill-line classification.
//!
//! Classification is pure: it reads [`SessionState`] and [`Identity`] and
//! never performs I/O or mutates anything.

use killtrack_protocol::constants::{NOT_APPLICABLE, profile_url};
use killtrack_protocol::{DeathReport, KillMode, KillReport, SuicideReport};

use crate::event::{Classified, ClassifiedEvent, Exclusion};
use crate::identity::Identity;
use crate::ships;
use crate::state::SessionState;

/// Marker present on every actor-death line.
pub const KILL_MARKER: &str = "CActor::Kill";

/// Actor names that mark NPC and creature kills. Matched case-insensitively.
pub const IGNORED_ACTORS: &[&str] = &["PU_Pilots", "NPC_Archetypes", "PU_Human", "kopion", "marok"];

/// Arena modes fought on foot; the killer has no ship there.
pub const FIRST_PERSON_MODES: &[&str] = &[
    "EA_FPSKillConfirmed",
    "EA_FPSGunGame",
    "EA_TeamElimination",
    "EA_Elimination",
    "EA_GunRush",
];

/// Substrings that mark a simulated reset inside an arena mode.
const ARENA_RESET_MARKERS: &[&str] = &["Crash", "SelfDestruct"];

/// Killer name the client logs for environment deaths.
const UNKNOWN_KILLER: &str = "unknown";

/// Per-session values copied into outbound kill reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportContext {
    pub client_version: String,
    pub anonymize: bool,
}

impl ReportContext {
    pub fn new(client_version: impl Into<String>, anonymize: bool) -> Self {
        Self {
            client_version: client_version.into(),
            anonymize,
        }
    }
}

/// Fields pulled out of a kill line by position.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct KillLine<'a> {
    time: &'a str,
    victim: &'a str,
    victim_id: &'a str,
    zone: &'a str,
    killer: &'a str,
    weapon: &'a str,
    damage_type: &'a str,
}

impl<'a> KillLine<'a> {
    const MIN_TOKENS: usize = 22;

    pub(crate) fn parse(line: &'a str) -> Result<Self, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < Self::MIN_TOKENS {
            return Err(format!(
                "kill line has {} tokens, expected at least {}",
                tokens.len(),
                Self::MIN_TOKENS
            ));
        }

        let quoted = |i: usize| -> &'a str { tokens[i].trim_matches('\'') };
        Ok(Self {
            time: tokens[0].trim_start_matches('<').trim_end_matches('>'),
            victim: quoted(5),
            victim_id: tokens[6].trim_start_matches('[').trim_end_matches(']'),
            zone: quoted(9),
            killer: quoted(12),
            weapon: quoted(15),
            damage_type: quoted(21),
        })
    }

    /// Whether `handle` is exactly the victim or the killer.
    pub(crate) fn involves(&self, handle: &str) -> bool {
        self.victim == handle || self.killer == handle
    }
}

/// Classifies one kill-tagged line against the current session.
///
/// `upload_allowed` is carried through untouched; it is false during backlog
/// replay.
pub fn classify(
    line: &str,
    state: &SessionState,
    identity: &Identity,
    ctx: &ReportContext,
    upload_allowed: bool,
) -> Classified {
    Classified {
        event: classify_kill(line, state, identity, ctx),
        upload_allowed,
    }
}

fn classify_kill(
    line: &str,
    state: &SessionState,
    identity: &Identity,
    ctx: &ReportContext,
) -> ClassifiedEvent {
    if let Some(exclusion) = exclusion(line, state.game_mode()) {
        return ClassifiedEvent::Excluded(exclusion);
    }

    let kill = match KillLine::parse(line) {
        Ok(kill) => kill,
        Err(reason) => return ClassifiedEvent::ParseError { reason },
    };

    let game_mode = state.game_mode();
    let mode = KillMode::from_game_mode(game_mode);
    let zone_is_ship = ships::is_ship_code(kill.zone);
    let report_zone = if zone_is_ship {
        NOT_APPLICABLE
    } else {
        kill.zone
    };

    if kill.victim == kill.killer {
        return ClassifiedEvent::Suicide(SuicideReport {
            player: identity.handle().to_string(),
            time: kill.time.to_string(),
            zone: kill.zone.to_string(),
        });
    }

    let killer_unknown = kill.killer.eq_ignore_ascii_case(UNKNOWN_KILLER);

    if kill.victim == identity.handle() && !killer_unknown {
        let ship = state.active_ship_name();
        return ClassifiedEvent::Death(DeathReport {
            killer: kill.killer.to_string(),
            victim: identity.handle().to_string(),
            time: kill.time.to_string(),
            zone: report_zone.to_string(),
            weapon: kill.weapon.to_string(),
            damage_type: kill.damage_type.to_string(),
            rsi_profile: profile_url(kill.killer),
            game_mode: game_mode.to_string(),
            mode,
            killers_ship: ship.to_string(),
            victim_ship: ship.to_string(),
        });
    }

    if killer_unknown {
        return ClassifiedEvent::Reset;
    }

    let killers_ship = if FIRST_PERSON_MODES.iter().any(|m| *m == game_mode) {
        NOT_APPLICABLE
    } else {
        state.active_ship_name()
    };
    let victim_ship = zone_is_ship
        .then(|| ships::ship_name(kill.zone).unwrap_or(kill.zone))
        .or_else(|| {
            state
                .zone_for_entity(kill.victim_id)
                .filter(|zone| ships::is_ship_code(zone))
        })
        .unwrap_or(NOT_APPLICABLE);

    ClassifiedEvent::Kill(KillReport {
        player: identity.handle().to_string(),
        victim: kill.victim.to_string(),
        time: kill.time.to_string(),
        zone: report_zone.to_string(),
        weapon: kill.weapon.to_string(),
        damage_type: kill.damage_type.to_string(),
        rsi_profile: profile_url(kill.victim),
        game_mode: game_mode.to_string(),
        mode,
        client_ver: ctx.client_version.clone(),
        killers_ship: killers_ship.to_string(),
        victim_ship: victim_ship.to_string(),
        anonymize_state: ctx.anonymize,
    })
}

fn exclusion(line: &str, game_mode: &str) -> Option<Exclusion> {
    let lower = line.to_ascii_lowercase();
    if let Some(actor) = IGNORED_ACTORS
        .iter()
        .copied()
        .find(|actor| lower.contains(&actor.to_ascii_lowercase()))
    {
        return Some(Exclusion::IgnoredActor(actor));
    }

    let arena = KillMode::from_game_mode(game_mode) == KillMode::Arena;
    if arena && ARENA_RESET_MARKERS.iter().any(|m| line.contains(m)) {
        return Some(Exclusion::ArenaReset);
    }

    None
}
