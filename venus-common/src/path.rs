//! Object path and bus name helpers.
//!
//! Victron-style services publish every item at its own object path, e.g.
//! `/Settings/Temperature/BrassMonkey/DeviceInstance`, and claim a well-known
//! name of the form `com.victronenergy.<class>.<slug>`.

use crate::error::{Error, Result};

/// Root of the settings tree on the settings service.
pub const SETTINGS_ROOT: &str = "/Settings";

/// Well-known name of the settings service.
pub const SETTINGS_SERVICE: &str = "com.victronenergy.settings";

/// Join an object path and a relative item name.
///
/// # Example
/// ```
/// use venus_common::path::join;
///
/// assert_eq!(join("/Settings/Temperature", "CustomName"), "/Settings/Temperature/CustomName");
/// assert_eq!(join("/", "Connected"), "/Connected");
/// ```
pub fn join(base: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if base == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), name)
    }
}

/// Check that a string is a valid D-Bus object path.
pub fn validate_object_path(path: &str) -> Result<()> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') {
        return Err(Error::Path(format!(
            "'{}' must start with '/' and must not end with '/'",
            path
        )));
    }
    for element in path[1..].split('/') {
        if element.is_empty() {
            return Err(Error::Path(format!("'{}' contains an empty element", path)));
        }
        if !element
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Path(format!(
                "'{}' may only contain [A-Za-z0-9_] between slashes",
                path
            )));
        }
    }
    Ok(())
}

/// Check that a string is a valid well-known bus name.
pub fn validate_service_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 255 {
        return Err(Error::Path(format!("bus name '{}' has an invalid length", name)));
    }
    let elements: Vec<&str> = name.split('.').collect();
    if elements.len() < 2 {
        return Err(Error::Path(format!(
            "bus name '{}' needs at least two elements",
            name
        )));
    }
    for element in elements {
        let mut chars = element.chars();
        let valid_first = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '-');
        if !valid_first
            || !element
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::Path(format!(
                "bus name '{}' has an invalid element '{}'",
                name, element
            )));
        }
    }
    Ok(())
}

/// Split a settings path into the `(group, name)` pair expected by
/// `com.victronenergy.Settings.AddSetting`.
///
/// # Example
/// ```
/// use venus_common::path::split_settings_path;
///
/// let (group, name) = split_settings_path("/Settings/Temperature/BrassMonkey/ProductId").unwrap();
/// assert_eq!(group, "Temperature/BrassMonkey");
/// assert_eq!(name, "ProductId");
/// ```
pub fn split_settings_path(path: &str) -> Result<(String, String)> {
    let relative = path
        .strip_prefix(SETTINGS_ROOT)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| {
            Error::Path(format!("'{}' is not below {}", path, SETTINGS_ROOT))
        })?;

    match relative.rsplit_once('/') {
        Some((group, name)) if !group.is_empty() && !name.is_empty() => {
            Ok((group.to_string(), name.to_string()))
        }
        _ => Err(Error::Path(format!(
            "'{}' needs a group and a name below {}",
            path, SETTINGS_ROOT
        ))),
    }
}
