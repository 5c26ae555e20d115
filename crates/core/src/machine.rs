//! Stable machine identity

use std::fs;

use uuid::Uuid;

/// Files holding the OS install identity, in lookup order
const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Identity of this install, used as the room membership key.
///
/// Falls back to a random id when the OS exposes none; such an id is only
/// stable for the life of the process.
pub fn machine_id() -> String {
    for path in MACHINE_ID_PATHS {
        if let Ok(contents) = fs::read_to_string(path) {
            let id = contents.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }

    tracing::warn!("No machine-id found, using a random identity");
    Uuid::new_v4().simple().to_string()
}
