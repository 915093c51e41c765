use sysinfo::System;

const ALERTS_KEY: &str = "HOSTWATCH_ALERTS_KEY";

/// Base64 AES-256 key for alert secrets. Unset or blank means read-only secrets.
pub fn get_alerts_key() -> Option<String> {
    non_blank_env(ALERTS_KEY)
}

const ADMIN_TOKEN: &str = "HOSTWATCH_ADMIN_TOKEN";

pub fn get_admin_token() -> Option<String> {
    non_blank_env(ADMIN_TOKEN)
}

const VIEWER_TOKEN: &str = "HOSTWATCH_VIEWER_TOKEN";

pub fn get_viewer_token() -> Option<String> {
    non_blank_env(VIEWER_TOKEN)
}

const HOSTNAME: &str = "HOSTWATCH_HOSTNAME";

const DEFAULT_HOSTNAME: &str = "unknown-host";

/// Host name used in alert messages: the override, then the system name.
pub fn resolve_hostname() -> String {
    non_blank_env(HOSTNAME)
        .or_else(System::host_name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string())
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
