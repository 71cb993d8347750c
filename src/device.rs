//! Device-identity queries: validation/display information about the
//! storage backing a workload's target path.
//!
//! Drive enumeration is left to the embedding application, but
//! device-identity queries are an inbound interface this crate defines, so
//! it is a trait here with a default OS-backed implementation rather than
//! left unimplemented. Callers that need richer platform-specific detail
//! (vendor/model over NVMe passthrough, SMART data, etc.) substitute their
//! own implementation.

use std::path::Path;

/// Details about the drive backing a path, where they can be determined.
/// Every field is best-effort; `None` means "could not be determined," not
/// "does not apply."
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DriveDetails {
    pub bus_type: Option<String>,
    pub logical_sector_size: Option<u64>,
    pub physical_sector_size: Option<u64>,
    pub free_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub vendor: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
    pub removable: Option<bool>,
    pub command_queuing: Option<bool>,
}

/// Queries about the storage device backing a benchmark target path.
pub trait DeviceIdentity {
    /// Logical and physical sector size, in bytes.
    fn sector_size(&self, path: &Path) -> Option<(u64, u64)>;

    /// Best-effort drive details for display purposes.
    fn drive_details(&self, path: &Path) -> Option<DriveDetails>;
}

/// The default, OS-backed implementation, built on the same probing this
/// crate's file preparer already does.
#[derive(Debug, Default)]
pub struct OsDeviceIdentity;

impl DeviceIdentity for OsDeviceIdentity {
    fn sector_size(&self, path: &Path) -> Option<(u64, u64)> {
        crate::prepare::sector_sizes(path).ok()
    }

    fn drive_details(&self, path: &Path) -> Option<DriveDetails> {
        let (logical, physical) = self.sector_size(path)?;
        let mut details = DriveDetails {
            logical_sector_size: Some(logical),
            physical_sector_size: Some(physical),
            ..Default::default()
        };

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let c_path = std::ffi::CString::new(path.as_os_str().to_string_lossy().as_bytes()).ok()?;
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc == 0 {
            details.total_bytes = Some(stat.f_blocks as u64 * stat.f_frsize as u64);
            details.free_bytes = Some(stat.f_bavail as u64 * stat.f_frsize as u64);
        }

        Some(details)
    }
}
