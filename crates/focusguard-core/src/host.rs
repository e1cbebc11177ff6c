//! Host collaborator traits.
//!
//! The engine treats the account layer, the permission consent flow, the
//! app inventory, and monitor process supervision as external concerns
//! behind these seams; the CLI crate supplies the Linux implementations.

use crate::error::PermissionError;
use crate::session::AppId;

/// The signed-in account, if any. Used only to validate that a restored
/// session belongs to the current user.
pub trait AccountInfo {
    fn read_user_id(&self) -> Option<String>;
}

/// Which permission a check or request concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    ForegroundQuery,
    Overlay,
}

/// Platform permission checks. The engine surfaces missing permissions to
/// the UI; the consent flow itself lives on the host side.
pub trait PermissionGate {
    fn has_foreground_query_permission(&self) -> bool;
    fn has_overlay_permission(&self) -> bool;

    /// Kick off the platform consent flow; returns immediately.
    fn request_permission(&self, kind: PermissionKind);

    /// First missing permission, in the order enforcement needs them.
    fn missing(&self) -> Option<PermissionError> {
        if !self.has_foreground_query_permission() {
            Some(PermissionError::ForegroundQueryMissing)
        } else if !self.has_overlay_permission() {
            Some(PermissionError::OverlayMissing)
        } else {
            None
        }
    }
}

/// An installable application as shown in the picker.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InstalledApp {
    pub id: AppId,
    pub display_name: String,
}

/// Enumerates applications the user can add to a block set.
pub trait AppInventory {
    fn list_installable_apps(&self) -> Vec<InstalledApp>;
}

/// Starts and stops the monitor's host process.
///
/// Stopping is cooperative: the authoritative stop signal is clearing the
/// session store slot, which the monitor notices on its next sample. This
/// trait only hurries that along.
pub trait MonitorControl {
    fn start(&self) -> Result<(), std::io::Error>;
    fn stop(&self) -> Result<(), std::io::Error>;
    fn is_running(&self) -> bool;
}
