use crate::activity::{ActivityDump, HostPlatform};
use crate::adb::{ACommand, Transport, prop};
use crate::error::{Error, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;

/// Status ADB reports for a device that accepts commands.
pub const READY: &str = "device";

/// An attached device, as listed by `adb devices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub serial: String,
    pub status: String,
}

impl Device {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == READY
    }
}

/// Attached devices in the order ADB reports them.
///
/// Devices that aren't ready (e.g. "unauthorized") are kept,
/// so the operator sees them; later queries against them fail normally.
/// A listing failure (ADB server down, no `adb` binary) means no device
/// can be found and is reported as [`Error::NoDeviceFound`].
pub fn list_devices<T: Transport + ?Sized>(transport: &T) -> Result<Vec<Device>> {
    let devices: Vec<Device> = ACommand::new(transport)
        .devices()
        .map_err(|e| Error::NoDeviceFound(format!("cannot list devices: {e}")))?
        .into_iter()
        .map(|(serial, status)| Device { serial, status })
        .collect();
    for d in devices.iter().filter(|d| !d.is_ready()) {
        warn!("Device {} is {}", d.serial, d.status);
    }
    debug!("Attached devices: {devices:?}");
    Ok(devices)
}

/// What the report says about the device under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_name: String,
    /// Foreground package, empty if nothing was resumed.
    pub package_name: String,
    /// e.g. `android 14`
    pub system_version: String,
}

/// Gathers [`DeviceInfo`] for one device and pulls its result file.
#[derive(Debug)]
pub struct Collector<'t, T: Transport + ?Sized> {
    transport: &'t T,
    host: HostPlatform,
}

impl<'t, T: Transport + ?Sized> Collector<'t, T> {
    #[must_use]
    pub const fn new(transport: &'t T, host: HostPlatform) -> Self {
        Self { transport, host }
    }

    /// Pull `remote_artifact` to `local_artifact`, then query the device.
    ///
    /// On any failure the local artifact is removed before returning
    /// [`Error::DeviceUnreachable`].
    pub fn collect(
        &self,
        serial: &str,
        remote_artifact: &str,
        local_artifact: &Path,
    ) -> Result<DeviceInfo> {
        self.try_collect(serial, remote_artifact, local_artifact)
            .map_err(|reason| {
                discard(local_artifact);
                Error::DeviceUnreachable {
                    serial: serial.to_string(),
                    reason,
                }
            })
    }

    fn try_collect(
        &self,
        serial: &str,
        remote_artifact: &str,
        local_artifact: &Path,
    ) -> Result<DeviceInfo, String> {
        let adb = || ACommand::new(self.transport);

        adb().pull(serial, remote_artifact, local_artifact)?;

        let sdk_raw = adb().shell(serial).getprop(prop::SDK)?;
        let sdk: u32 = sdk_raw
            .trim()
            .parse()
            .map_err(|e| format!("unexpected SDK level {sdk_raw:?}: {e}"))?;

        let dump = ActivityDump::for_sdk(sdk, self.host);
        let package_name = dump.package_name(&adb().shell(serial).dumpsys(dump.service())?);
        if package_name.is_empty() {
            warn!("{serial}: no foreground activity found via {}", dump.marker());
        }

        let device_name = adb().shell(serial).getprop(prop::MODEL)?.trim().to_string();
        let release = adb().shell(serial).getprop(prop::RELEASE)?.trim().to_string();

        let info = DeviceInfo {
            device_id: serial.trim().to_string(),
            device_name,
            package_name,
            system_version: format!("android {release}"),
        };
        info!("Collected {info:?} (SDK {sdk})");
        Ok(info)
    }
}

fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!("Removed partial artifact {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove {}: {e}", path.display()),
    }
}
