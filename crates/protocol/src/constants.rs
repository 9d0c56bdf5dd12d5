/// Placeholder the service expects for any field with no meaningful value.
pub const NOT_APPLICABLE: &str = "N/A";

/// Base URL for public player profiles; the handle is appended.
pub const PROFILE_URL_BASE: &str = "https://robertsspaceindustries.com/citizens/";

/// Endpoint receiving [`KillReport`](crate::KillReport) payloads.
pub const REPORT_KILL_PATH: &str = "/reportKill";

/// Endpoint receiving [`DeathEvent`](crate::DeathEvent) payloads.
pub const REPORT_DEATH_PATH: &str = "/reportDeath";

/// Endpoint that accepts a bearer key and answers 200/201 when it is valid.
pub const VALIDATE_KEY_PATH: &str = "/validateKey";

/// Builds the profile URL for a player handle.
pub fn profile_url(handle: &str) -> String {
    format!("{PROFILE_URL_BASE}{handle}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_appends_handle() {
        assert_eq!(
            profile_url("PlayerB"),
            "https://robertsspaceindustries.com/citizens/PlayerB"
        );
    }
}
