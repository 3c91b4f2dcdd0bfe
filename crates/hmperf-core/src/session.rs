//! Top-level flows: start a run on the device(s), report a run.
//!
//! Each flow resolves its target devices first, then handles them
//! one at a time. Starting a run fans out over every attached device;
//! reporting a run insists on exactly one.

use crate::activity::HostPlatform;
use crate::adb::{ACommand, Transport};
use crate::config::Config;
use crate::credentials::{KeyProvider, read_token};
use crate::device::{Collector, Device, list_devices};
use crate::error::{Error, Result};
use crate::net;
use crate::report::{ReportPayload, UploadOutcome, Uploader};
use log::{debug, info, warn};
use std::path::PathBuf;
use ureq::Agent;

/// How many discovered devices a flow may act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fanout {
    /// Exactly one, anything else needs an explicit id.
    Single,
    /// Every attached device, in listing order.
    All,
}

#[derive(Debug)]
enum State {
    ResolveTarget,
    CollectAndUpload(Vec<String>),
    Done,
}

/// Pick target serials.
///
/// An explicit id is used as-is and `discover` is never called.
pub fn resolve_targets(
    explicit: Option<&str>,
    fanout: Fanout,
    discover: impl FnOnce() -> Result<Vec<Device>>,
) -> Result<Vec<String>> {
    if let Some(serial) = explicit {
        return Ok(vec![serial.trim().to_string()]);
    }
    let serials: Vec<String> = discover()?.into_iter().map(|d| d.serial).collect();
    match (serials.len(), fanout) {
        (0, _) => Err(Error::NoDeviceFound("adb lists no devices".into())),
        (1, _) | (_, Fanout::All) => Ok(serials),
        (_, Fanout::Single) => Err(Error::AmbiguousDevice(serials)),
    }
}

/// Supplies the free-text test scenario for a report.
pub type RemarksSource<'r> = dyn FnMut() -> Result<String> + 'r;

pub struct Session<'a, T: Transport + ?Sized> {
    config: &'a Config,
    transport: &'a T,
    agent: Agent,
    host: HostPlatform,
}

impl<'a, T: Transport + ?Sized> Session<'a, T> {
    #[must_use]
    pub fn new(config: &'a Config, transport: &'a T) -> Self {
        Self {
            config,
            transport,
            agent: net::agent(config.http_timeout()),
            host: HostPlatform::current(),
        }
    }

    #[must_use]
    pub const fn with_host(mut self, host: HostPlatform) -> Self {
        self.host = host;
        self
    }

    fn token(&self) -> Result<String> {
        read_token(&self.config.token_path())
    }

    fn tester_name<'t>(&'t self, token: &'t str) -> &'t str {
        self.config.tester_name.as_deref().unwrap_or(token)
    }

    fn drive<R>(
        &self,
        explicit: Option<&str>,
        fanout: Fanout,
        mut per_device: impl FnMut(&str) -> Result<R>,
    ) -> Result<Vec<R>> {
        let mut state = State::ResolveTarget;
        let mut results = Vec::new();
        loop {
            debug!("Session: {state:?}");
            state = match state {
                State::ResolveTarget => State::CollectAndUpload(resolve_targets(
                    explicit,
                    fanout,
                    || list_devices(self.transport),
                )?),
                State::CollectAndUpload(targets) => {
                    for serial in &targets {
                        info!("Current device: {serial}");
                        results.push(per_device(serial)?);
                    }
                    State::Done
                }
                State::Done => return Ok(results),
            };
        }
    }

    /// Attached devices and their statuses.
    pub fn devices(&self) -> Result<Vec<Device>> {
        list_devices(self.transport)
    }

    /// Fetch and store the public key only.
    pub fn refresh_key(&self) -> Result<PathBuf> {
        let token = self.token()?;
        KeyProvider::new(&self.agent, &self.config.pubkey_url)
            .refresh(&token, &self.config.pubkey_path())
            .ok_or_else(|| Error::KeyFetchFailed("see log for details".into()))
    }

    /// Push the collector and key to each target and launch it.
    ///
    /// Returns the serials the collector was started on.
    pub fn start(&self, explicit: Option<&str>) -> Result<Vec<String>> {
        let token = self.token()?;
        self.drive(explicit, Fanout::All, |serial| {
            self.start_on(serial, &token)?;
            Ok(serial.to_string())
        })
    }

    fn start_on(&self, serial: &str, token: &str) -> Result<()> {
        let cfg = self.config;
        let key = cfg.pubkey_path();
        if KeyProvider::new(&self.agent, &cfg.pubkey_url)
            .refresh(token, &key)
            .is_none()
        {
            if !key.is_file() {
                return Err(Error::KeyFetchFailed(format!(
                    "no public key at {}",
                    key.display()
                )));
            }
            warn!("Using the previous key at {}", key.display());
        }

        let collector = cfg.remote(&cfg.collector);
        let remote_key = cfg.remote_pubkey();
        let unreachable = |reason: String| Error::DeviceUnreachable {
            serial: serial.to_string(),
            reason,
        };
        let adb = || ACommand::new(self.transport);

        adb()
            .push(serial, &cfg.collector_path(), &collector)
            .map_err(unreachable)?;
        adb()
            .shell(serial)
            .chmod("777", &collector)
            .map_err(unreachable)?;
        adb().push(serial, &key, &remote_key).map_err(unreachable)?;
        adb()
            .shell(serial)
            .chmod("777", &remote_key)
            .map_err(unreachable)?;

        info!("Starting performance test on {serial}");
        std::thread::sleep(cfg.start_delay());
        // Output and exit status belong to the collector.
        match adb().shell(serial).exec(&collector, &["-pem", remote_key.as_str()]) {
            Ok(out) if !out.is_empty() => info!("{collector}: {out}"),
            Ok(_) => {}
            Err(e) => warn!("{collector} on {serial}: {e}"),
        }
        Ok(())
    }

    /// Report the run of exactly one device.
    ///
    /// The token is read before any device or network access.
    pub fn upload(
        &self,
        explicit: Option<&str>,
        remarks: &mut RemarksSource<'_>,
    ) -> Result<UploadOutcome> {
        let token = self.token()?;
        let cfg = self.config;
        let artifact = cfg.artifact_path();
        let collector = Collector::new(self.transport, self.host);
        let uploader = Uploader::new(&self.agent, &cfg.upload_url);

        let mut outcomes = self.drive(explicit, Fanout::Single, |serial| {
            let info = collector.collect(serial, &cfg.remote(&cfg.artifact), &artifact)?;
            let scenario = remarks()?;
            let payload = ReportPayload::android(
                &info,
                self.tester_name(&token),
                &token,
                &scenario,
                chrono::Utc::now().timestamp(),
            );
            Ok(uploader.upload(&payload, &artifact))
        })?;
        outcomes
            .pop()
            .ok_or_else(|| Error::NoDeviceFound("no report collected".into()))
    }

    /// Report a desktop run; there is no device to query.
    pub fn upload_desktop(&self, remarks: &mut RemarksSource<'_>) -> Result<UploadOutcome> {
        let token = self.token()?;
        let scenario = remarks()?;
        let payload = ReportPayload::desktop(
            self.tester_name(&token),
            &token,
            &scenario,
            chrono::Utc::now().timestamp(),
        );
        Ok(Uploader::new(&self.agent, &self.config.upload_url)
            .upload(&payload, &self.config.artifact_path()))
    }
}
