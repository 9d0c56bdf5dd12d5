//! Local player identity, recovered from the login lines of the log.

use std::path::Path;

/// Marker on the line announcing a successful login.
const LOGIN_MARKER: &str = "<Legacy login response> [CIG-net] User Login Success";

/// Prefix of the handle field on the login line.
const HANDLE_PREFIX: &str = "Handle[";

/// Marker on the line carrying the active character's GEID.
const CHARACTER_MARKER: &str = "AccountLoginCharacterStatus_Character";

/// Whitespace token holding the GEID on the character status line.
const GEID_TOKEN: usize = 11;

/// Errors from identity resolution.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("player handle not found in log")]
    HandleNotFound,
}

/// The local player: display handle plus (optionally) the session GEID.
///
/// Immutable once tailing starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    handle: String,
    geid: Option<String>,
}

impl Identity {
    /// Creates an identity. An empty GEID is treated as unknown.
    pub fn new(handle: impl Into<String>, geid: Option<String>) -> Self {
        Self {
            handle: handle.into(),
            geid: geid.filter(|g| !g.is_empty()),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn geid(&self) -> Option<&str> {
        self.geid.as_deref()
    }

    /// Whether the local GEID appears in `line`. Always false when unknown.
    pub(crate) fn geid_in(&self, line: &str) -> bool {
        self.geid.as_deref().is_some_and(|g| line.contains(g))
    }
}

/// Reads the whole log at `path` and resolves the local identity.
///
/// Undecodable bytes are replaced, never rejected.
pub fn resolve_identity(path: &Path) -> Result<Identity, IdentityError> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    resolve_from_lines(text.lines())
}

/// Resolves the identity from already-decoded lines.
///
/// The first login line wins for the handle and the first character status
/// line wins for the GEID. A missing GEID is not an error.
pub fn resolve_from_lines<'a, I>(lines: I) -> Result<Identity, IdentityError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut handle = None;
    let mut geid = None;

    for line in lines {
        if handle.is_none() && line.contains(LOGIN_MARKER) {
            handle = parse_handle(line);
        }
        if geid.is_none() && line.contains(CHARACTER_MARKER) {
            geid = line.split_whitespace().nth(GEID_TOKEN);
        }
        if handle.is_some() && geid.is_some() {
            break;
        }
    }

    let handle = handle.ok_or(IdentityError::HandleNotFound)?;
    if geid.is_none() {
        tracing::warn!(handle, "character GEID not found; ship spawns will be ignored");
    }

    Ok(Identity::new(handle, geid.map(str::to_string)))
}

fn parse_handle(line: &str) -> Option<&str> {
    let start = line.find(HANDLE_PREFIX)? + HANDLE_PREFIX.len();
    let token = line[start..].split_whitespace().next()?;
    let handle = token.strip_suffix(']').unwrap_or(token);
    (!handle.is_empty()).then_some(handle)
}
