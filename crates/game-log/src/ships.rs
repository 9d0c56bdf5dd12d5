//! Manufacturer codes used to tell ship zones apart from locations.
//!
//! Ship instances show up in the log as `<MFR>_<Model>_<instance id>`, e.g.
//! `AEGS_Avenger_40012`. A zone token is a ship iff it starts with one of
//! the codes below.

/// Known manufacturer / ship-line prefixes.
pub const SHIP_CODES: &[&str] = &[
    "DRAK", "ORIG", "AEGS", "ANVL", "CRUS", "BANU", "MISC", "KRIG", "XNAA", "ARGO", "VNCL", "ESPR",
    "RSI", "CNOU", "GRIN", "TMBL", "GAMA",
];

/// Whether `token` names a ship instance.
pub fn is_ship_code(token: &str) -> bool {
    SHIP_CODES.iter().any(|code| token.starts_with(code))
}

/// Splits a ship token into `(name, instance id)` at the last underscore.
///
/// Returns `None` for tokens that are not ship codes or carry no underscore.
pub fn split_ship_token(token: &str) -> Option<(&str, &str)> {
    if !is_ship_code(token) {
        return None;
    }
    token
        .rsplit_once('_')
        .filter(|(name, id)| !name.is_empty() && !id.is_empty())
}

/// Returns the name portion of a ship token (everything before the last
/// underscore), or `None` when the token is not a ship.
pub fn ship_name(token: &str) -> Option<&str> {
    split_ship_token(token).map(|(name, _)| name)
}
