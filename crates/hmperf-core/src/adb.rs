#![deny(clippy::unwrap_used)]

//! Everything "intrinsic" of ADB lives here.
//!
//! `*Command` types are thin wrappers around a [`Transport`],
//! which in turn is either `adb_client` or the system ADB CLI.
//! That implies:
//! - no "magic"
//! - no chaining ("piping") of device commands through a host shell
//! - arguments travel as separate tokens, never as a concatenated string
//!
//! The set of operations is deliberately narrow:
//! list devices, pull, push, `chmod`, run a binary, `getprop` and `dumpsys`.
//! If a new ADB feature is ever needed,
//! extend these APIs rather than reaching for a `Command`-like escape hatch.
//!
//! ## Backend Selection
//!
//! - **Builtin** (`adb_client`): Pure Rust implementation, no external dependencies
//! - **System**: Uses the system-installed `adb` binary
//!
//! For comprehensive info about ADB,
//! [see this](https://android.googlesource.com/platform/packages/modules/adb/+/refs/heads/master/docs/)

use adb_client::{ADBDeviceExt, ADBServer};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Convert ADB output bytes to a trimmed UTF-8 string.
/// Uses lossy conversion to prevent panics on non-UTF8 output from certain OEMs.
#[must_use]
pub fn to_trimmed_utf8(v: &[u8]) -> String {
    String::from_utf8_lossy(v).trim_end().to_string()
}

/// Primitive device operations every backend must provide.
///
/// Errors are human-readable strings;
/// callers convert them into [`crate::Error`] at the narrowest call site.
pub trait Transport {
    /// Attached devices as `(serial, status)`, in the order ADB reports them.
    fn devices(&self) -> Result<Vec<(String, String)>, String>;

    /// Run `args` on the device's default shell and return trimmed stdout.
    fn shell(&self, serial: &str, args: &[&str]) -> Result<String, String>;

    /// Copy a device file to the host.
    fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<(), String>;

    /// Copy a host file to a full device path (not a directory).
    fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<(), String>;
}

/// ADB backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdbBackend {
    /// Built-in ADB implementation via `adb_client` crate.
    /// Only needs a running ADB server, not the `adb` binary.
    #[default]
    Builtin,
    /// Uses the system-installed `adb` binary.
    /// Requires `adb` to be available in PATH.
    System,
}

impl std::fmt::Display for AdbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin => write!(f, "Builtin"),
            Self::System => write!(f, "System (adb)"),
        }
    }
}

impl Transport for AdbBackend {
    fn devices(&self) -> Result<Vec<(String, String)>, String> {
        match self {
            Self::Builtin => builtin::devices(),
            Self::System => system::devices(),
        }
    }

    fn shell(&self, serial: &str, args: &[&str]) -> Result<String, String> {
        if args.is_empty() {
            return Err("Empty shell command".into());
        }
        info!("Ran command: adb -s {serial} shell {}", args.join(" "));
        match self {
            Self::Builtin => builtin::shell(serial, args),
            Self::System => system::shell(serial, args),
        }
    }

    fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<(), String> {
        info!("Ran command: adb -s {serial} pull {remote} {}", local.display());
        match self {
            Self::Builtin => builtin::pull(serial, remote, local),
            Self::System => system::pull(serial, remote, local),
        }
    }

    fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<(), String> {
        info!("Ran command: adb -s {serial} push {} {remote}", local.display());
        match self {
            Self::Builtin => builtin::push(serial, local, remote),
            Self::System => system::push(serial, local, remote),
        }
    }
}

// ========== Builtin backend implementation (adb_client) ==========

mod builtin {
    use super::{ADBDeviceExt, ADBServer, Cursor, File, Path, error};

    pub(super) fn devices() -> Result<Vec<(String, String)>, String> {
        let mut server = ADBServer::default();
        server
            .devices()
            .map(|device_list| {
                device_list
                    .into_iter()
                    .map(|dev| (dev.identifier, dev.state.to_string()))
                    .collect()
            })
            .map_err(|e| {
                error!("ADB: {e}");
                format!("Cannot connect to ADB server: {e}")
            })
    }

    fn connect(
        server: &mut ADBServer,
        serial: &str,
    ) -> Result<adb_client::ADBServerDevice, String> {
        server
            .get_device_by_name(serial)
            .map_err(|e| format!("Cannot connect to device '{serial}': {e}"))
    }

    pub(super) fn shell(serial: &str, args: &[&str]) -> Result<String, String> {
        let mut server = ADBServer::default();
        let mut device = connect(&mut server, serial)?;

        let mut buffer = Vec::new();
        device
            .shell_command(args, &mut Cursor::new(&mut buffer))
            .map_err(|e| {
                error!("ADB shell command failed: {e}");
                format!("Shell command failed: {e}")
            })?;

        Ok(super::to_trimmed_utf8(&buffer))
    }

    pub(super) fn pull(serial: &str, remote: &str, local: &Path) -> Result<(), String> {
        let mut server = ADBServer::default();
        let mut device = connect(&mut server, serial)?;
        let mut file = File::create(local)
            .map_err(|e| format!("Cannot create {}: {e}", local.display()))?;
        device.pull(&remote, &mut file).map_err(|e| {
            error!("ADB pull failed: {e}");
            format!("Cannot pull {remote}: {e}")
        })
    }

    pub(super) fn push(serial: &str, local: &Path, remote: &str) -> Result<(), String> {
        let mut server = ADBServer::default();
        let mut device = connect(&mut server, serial)?;
        let mut file =
            File::open(local).map_err(|e| format!("Cannot open {}: {e}", local.display()))?;
        device.push(&mut file, &remote).map_err(|e| {
            error!("ADB push failed: {e}");
            format!("Cannot push {}: {e}", local.display())
        })
    }
}

// ========== System backend implementation (adb binary) ==========

mod system {
    use super::{Path, error, to_trimmed_utf8};
    #[cfg(target_os = "windows")]
    use std::os::windows::process::CommandExt;

    fn adb(serial: Option<&str>) -> std::process::Command {
        let mut cmd = std::process::Command::new("adb");
        if let Some(serial) = serial {
            cmd.args(["-s", serial]);
        }
        cmd
    }

    pub(super) fn devices() -> Result<Vec<(String, String)>, String> {
        let mut cmd = adb(None);
        cmd.arg("devices");
        Ok(parse_devices(&run(cmd)?))
    }

    pub(super) fn shell(serial: &str, args: &[&str]) -> Result<String, String> {
        let mut cmd = adb(Some(serial));
        cmd.arg("shell").args(args);
        run(cmd)
    }

    pub(super) fn pull(serial: &str, remote: &str, local: &Path) -> Result<(), String> {
        let mut cmd = adb(Some(serial));
        cmd.arg("pull").arg(remote).arg(local);
        run(cmd).map(drop)
    }

    pub(super) fn push(serial: &str, local: &Path, remote: &str) -> Result<(), String> {
        let mut cmd = adb(Some(serial));
        cmd.arg("push").arg(local).arg(remote);
        run(cmd).map(drop)
    }

    /// `adb devices` output minus the header and the trailing blank line.
    pub(super) fn parse_devices(out: &str) -> Vec<(String, String)> {
        out.lines()
            .skip(1) // header
            .filter_map(|line| {
                let (serial, status) = line.split_once('\t')?;
                Some((serial.trim().to_string(), status.trim().to_string()))
            })
            .collect()
    }

    fn run(mut cmd: std::process::Command) -> Result<String, String> {
        #[cfg(target_os = "windows")]
        let cmd = cmd.creation_flags(0x0800_0000); // do not open a cmd window

        let output = cmd.output().map_err(|e| {
            error!("ADB: {e}");
            "Cannot run ADB, likely not found".to_string()
        })?;

        let stdout = to_trimmed_utf8(&output.stdout);
        if output.status.success() {
            Ok(stdout)
        } else {
            // ADB sometimes outputs errors to stdout instead of stderr
            Err(if stdout.is_empty() {
                to_trimmed_utf8(&output.stderr)
            } else {
                stdout
            })
        }
    }
}

/// Well-known `getprop` keys.
pub mod prop {
    pub const MODEL: &str = "ro.product.model";
    pub const SDK: &str = "ro.build.version.sdk";
    pub const RELEASE: &str = "ro.build.version.release";
}

/// Builder object for an Android Debug Bridge command,
/// using the new-type pattern over a borrowed [`Transport`].
///
/// [More info here](https://developer.android.com/tools/adb)
#[derive(Debug)]
pub struct ACommand<'t, T: Transport + ?Sized>(&'t T);

impl<'t, T: Transport + ?Sized> ACommand<'t, T> {
    #[must_use]
    pub const fn new(transport: &'t T) -> Self {
        Self(transport)
    }

    /// `shell` sub-command builder, bound to one device.
    #[must_use]
    pub const fn shell<'s>(self, device_serial: &'s str) -> ShellCommand<'t, 's, T> {
        ShellCommand {
            transport: self.0,
            serial: device_serial,
        }
    }

    /// Header-less list of attached devices (as serials) and their statuses.
    ///
    /// Status can be (but not limited to):
    /// - "unauthorized"
    /// - "offline"
    /// - "device"
    pub fn devices(self) -> Result<Vec<(String, String)>, String> {
        self.0.devices()
    }

    pub fn pull(self, device_serial: &str, remote: &str, local: &Path) -> Result<(), String> {
        self.0.pull(device_serial, remote, local)
    }

    pub fn push(self, device_serial: &str, local: &Path, remote: &str) -> Result<(), String> {
        self.0.push(device_serial, local, remote)
    }
}

/// Builder object for a command that runs on the device's default `sh`.
#[derive(Debug)]
pub struct ShellCommand<'t, 's, T: Transport + ?Sized> {
    transport: &'t T,
    serial: &'s str,
}

impl<T: Transport + ?Sized> ShellCommand<'_, '_, T> {
    /// Query a device property value, by its key.
    /// Values can be of any type, so to avoid lossy conversions we return strs.
    pub fn getprop(self, key: &str) -> Result<String, String> {
        self.transport.shell(self.serial, &["getprop", key])
    }

    /// `dumpsys <service>`, unfiltered.
    pub fn dumpsys(self, service: &str) -> Result<String, String> {
        self.transport.shell(self.serial, &["dumpsys", service])
    }

    /// `chmod <mode> <path>`
    pub fn chmod(self, mode: &str, path: &str) -> Result<String, String> {
        self.transport.shell(self.serial, &["chmod", mode, path])
    }

    /// Run an executable already present on the device.
    pub fn exec(self, binary: &str, args: &[&str]) -> Result<String, String> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(binary);
        argv.extend_from_slice(args);
        self.transport.shell(self.serial, &argv)
    }
}

/// Scriptable [`Transport`] that records every call.
#[cfg(test)]
pub(crate) mod fake {
    use super::{Path, Transport};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Devices,
        Shell(String, Vec<String>),
        Pull(String, String),
        Push(String, String),
    }

    #[derive(Debug, Default)]
    pub(crate) struct FakeTransport {
        pub devices: Vec<(String, String)>,
        /// Returned instead of `devices` when set, e.g. ADB server down.
        pub devices_error: Option<String>,
        /// Keyed by the space-joined shell argv.
        pub shell_out: HashMap<String, Result<String, String>>,
        /// Written to the local path on a successful pull.
        pub pulled: Option<Vec<u8>>,
        pub pull_error: Option<String>,
        pub calls: RefCell<Vec<Call>>,
    }

    impl FakeTransport {
        pub(crate) fn with_devices(serials: &[&str]) -> Self {
            Self {
                devices: serials
                    .iter()
                    .map(|s| ((*s).to_string(), "device".to_string()))
                    .collect(),
                ..Self::default()
            }
        }

        pub(crate) fn respond(mut self, argv: &str, out: &str) -> Self {
            self.shell_out.insert(argv.to_string(), Ok(out.to_string()));
            self
        }

        pub(crate) fn fail(mut self, argv: &str, err: &str) -> Self {
            self.shell_out.insert(argv.to_string(), Err(err.to_string()));
            self
        }

        pub(crate) fn shell_calls(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|c| match c {
                    Call::Shell(_, argv) => Some(argv.join(" ")),
                    _ => None,
                })
                .collect()
        }
    }

    impl Transport for FakeTransport {
        fn devices(&self) -> Result<Vec<(String, String)>, String> {
            self.calls.borrow_mut().push(Call::Devices);
            match &self.devices_error {
                Some(err) => Err(err.clone()),
                None => Ok(self.devices.clone()),
            }
        }

        fn shell(&self, serial: &str, args: &[&str]) -> Result<String, String> {
            let argv: Vec<String> = args.iter().map(ToString::to_string).collect();
            let key = argv.join(" ");
            self.calls
                .borrow_mut()
                .push(Call::Shell(serial.to_string(), argv));
            self.shell_out
                .get(&key)
                .cloned()
                .unwrap_or_else(|| Ok(String::new()))
        }

        fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<(), String> {
            self.calls
                .borrow_mut()
                .push(Call::Pull(serial.to_string(), remote.to_string()));
            if let Some(err) = &self.pull_error {
                return Err(err.clone());
            }
            std::fs::write(local, self.pulled.as_deref().unwrap_or(b"hmp"))
                .map_err(|e| e.to_string())
        }

        fn push(&self, serial: &str, _local: &Path, remote: &str) -> Result<(), String> {
            self.calls
                .borrow_mut()
                .push(Call::Push(serial.to_string(), remote.to_string()));
            Ok(())
        }
    }
}
