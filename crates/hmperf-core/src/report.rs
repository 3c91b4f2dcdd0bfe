//! Report payload and its upload to the perf service.

use crate::device::DeviceInfo;
use crate::error::Error;
use log::{error, info, warn};
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;
use ureq::Agent;
use ureq::unversioned::multipart::Form;

/// Kind of test, as numbered by the perf service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TestType {
    Performance = 2,
}

impl Serialize for TestType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemOs {
    Android,
    Windows,
}

/// Desktop runs have no device to query.
pub mod desktop {
    pub const DEVICE_ID: &str = "haimayun";
    pub const DEVICE_NAME: &str = "windows";
    pub const PACKAGE_NAME: &str = "x86.test";
    pub const SYSTEM_VERSION: &str = "windows";
}

/// Form fields sent alongside the artifact, under the service's wire names.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ReportPayload {
    #[serde(rename = "testerName")]
    pub tester_name: String,
    #[serde(rename = "testType")]
    pub test_type: TestType,
    /// Seconds since the epoch.
    #[serde(rename = "testTimes")]
    pub test_time: i64,
    #[serde(rename = "devicesId")]
    pub device_id: String,
    #[serde(rename = "devicesNname")]
    pub device_name: String,
    #[serde(rename = "packageName")]
    pub package_name: String,
    #[serde(rename = "systemVersion")]
    pub system_version: String,
    pub system_os: SystemOs,
    pub remarks: String,
    pub token: String,
}

impl std::fmt::Debug for ReportPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportPayload")
            .field("tester_name", &"<redacted>")
            .field("test_type", &self.test_type)
            .field("test_time", &self.test_time)
            .field("device_id", &self.device_id)
            .field("device_name", &self.device_name)
            .field("package_name", &self.package_name)
            .field("system_version", &self.system_version)
            .field("system_os", &self.system_os)
            .field("remarks", &self.remarks)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ReportPayload {
    #[must_use]
    pub fn android(
        info: &DeviceInfo,
        tester_name: &str,
        token: &str,
        remarks: &str,
        test_time: i64,
    ) -> Self {
        Self {
            tester_name: tester_name.to_string(),
            test_type: TestType::Performance,
            test_time,
            device_id: info.device_id.clone(),
            device_name: info.device_name.clone(),
            package_name: info.package_name.clone(),
            system_version: info.system_version.clone(),
            system_os: SystemOs::Android,
            remarks: remarks.to_string(),
            token: token.to_string(),
        }
    }

    #[must_use]
    pub fn desktop(tester_name: &str, token: &str, remarks: &str, test_time: i64) -> Self {
        Self {
            tester_name: tester_name.to_string(),
            test_type: TestType::Performance,
            test_time,
            device_id: desktop::DEVICE_ID.into(),
            device_name: desktop::DEVICE_NAME.into(),
            package_name: desktop::PACKAGE_NAME.into(),
            system_version: desktop::SYSTEM_VERSION.into(),
            system_os: SystemOs::Windows,
            remarks: remarks.to_string(),
            token: token.to_string(),
        }
    }

    /// `(name, value)` pairs, numbers rendered as decimal text.
    #[must_use]
    pub fn fields(&self) -> Vec<(String, String)> {
        let Ok(serde_json::Value::Object(map)) = serde_json::to_value(self) else {
            return Vec::new();
        };
        map.into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect()
    }
}

/// What the perf service made of an upload.
#[derive(Debug)]
pub enum UploadOutcome {
    Success,
    Failure {
        /// [`Error::UploadRejected`] or [`Error::MalformedServerResponse`].
        error: Error,
        /// Raw response body, empty if none arrived.
        body: String,
    },
}

impl UploadOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Interpret a response body. Only `errmsg == "success"` counts.
    #[must_use]
    pub fn from_body(body: String) -> Self {
        #[derive(Deserialize)]
        struct Reply {
            errmsg: String,
        }
        match serde_json::from_str::<Reply>(&body) {
            Ok(reply) if reply.errmsg == "success" => Self::Success,
            Ok(reply) => Self::Failure {
                error: Error::UploadRejected(reply.errmsg),
                body,
            },
            Err(e) => Self::Failure {
                error: Error::MalformedServerResponse(e.to_string()),
                body,
            },
        }
    }
}

/// Posts reports to the perf service, one attempt each.
#[derive(Debug)]
pub struct Uploader<'a> {
    agent: &'a Agent,
    url: &'a str,
}

impl<'a> Uploader<'a> {
    #[must_use]
    pub const fn new(agent: &'a Agent, url: &'a str) -> Self {
        Self { agent, url }
    }

    /// Submit `payload` with the file at `artifact`.
    ///
    /// The artifact is deleted if and only if the service reports success.
    pub fn upload(&self, payload: &ReportPayload, artifact: &Path) -> UploadOutcome {
        info!("Uploading {} with {payload:?}", artifact.display());
        let outcome = self.submit(payload, artifact);
        match &outcome {
            UploadOutcome::Success => match std::fs::remove_file(artifact) {
                Ok(()) => info!("Upload accepted, removed {}", artifact.display()),
                Err(e) => warn!("Upload accepted but cannot remove {}: {e}", artifact.display()),
            },
            UploadOutcome::Failure { error, body } => {
                error!("{error}; response: {body}");
                info!("Keeping {} for a later retry", artifact.display());
            }
        }
        outcome
    }

    fn submit(&self, payload: &ReportPayload, artifact: &Path) -> UploadOutcome {
        let rejected = |msg: String| UploadOutcome::Failure {
            error: Error::UploadRejected(msg),
            body: String::new(),
        };

        let fields = payload.fields();
        let form = fields
            .iter()
            .fold(Form::new(), |form, (k, v)| form.text(k, v));
        // Streamed from disk; the part is named after the artifact file.
        let form = match form.file("file", artifact) {
            Ok(form) => form,
            Err(e) => return rejected(format!("cannot read {}: {e}", artifact.display())),
        };

        let mut response = match self.agent.post(self.url).send(form) {
            Ok(response) => response,
            Err(e) => return rejected(e.to_string()),
        };
        match response.body_mut().read_to_string() {
            Ok(text) => UploadOutcome::from_body(text),
            Err(e) => UploadOutcome::Failure {
                error: Error::MalformedServerResponse(e.to_string()),
                body: String::new(),
            },
        }
    }
}
