//! Operator-facing messages.
//!
//! Write errors (e.g. a closed pipe when piping to `head`) are ignored:
//! the message is informational and the exit code still carries the result.

use hmperf_core::Error;
use hmperf_core::report::UploadOutcome;
use std::io::Write;

pub fn status(msg: &str) {
    let _ = writeln!(std::io::stdout(), "{msg}");
}

pub fn warning(msg: &str) {
    let _ = writeln!(std::io::stderr(), "warning: {msg}");
}

pub fn failure(err: &Error) {
    let _ = writeln!(std::io::stderr(), "error: {err}");
}

/// Print how an upload went, including the raw server reply on failure.
/// Returns whether it succeeded.
pub fn upload_outcome(outcome: &UploadOutcome) -> bool {
    report_upload(&mut std::io::stdout(), &mut std::io::stderr(), outcome)
}

fn report_upload(out: &mut impl Write, err: &mut impl Write, outcome: &UploadOutcome) -> bool {
    match outcome {
        UploadOutcome::Success => {
            let _ = writeln!(out, "Upload succeeded");
            true
        }
        UploadOutcome::Failure { error, body } => {
            let _ = writeln!(err, "error: {error}");
            if !body.is_empty() {
                let _ = writeln!(err, "server replied: {body}");
            }
            let _ = writeln!(out, "Upload failed, the result file was kept for a retry");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printed(outcome: &UploadOutcome) -> (bool, String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let ok = report_upload(&mut out, &mut err, outcome);
        (
            ok,
            String::from_utf8(out).expect("utf-8"),
            String::from_utf8(err).expect("utf-8"),
        )
    }

    #[test]
    fn rejected_upload_shows_server_reply() {
        let (ok, out, err) = printed(&UploadOutcome::Failure {
            error: Error::UploadRejected("duplicate report".into()),
            body: r#"{"errmsg":"duplicate report"}"#.into(),
        });
        assert!(!ok);
        assert_eq!(
            err,
            "error: upload rejected: duplicate report\nserver replied: {\"errmsg\":\"duplicate report\"}\n"
        );
        assert!(out.contains("kept for a retry"));
    }

    #[test]
    fn unreachable_service_has_no_reply_line() {
        let (ok, _, err) = printed(&UploadOutcome::Failure {
            error: Error::UploadRejected("connection refused".into()),
            body: String::new(),
        });
        assert!(!ok);
        assert!(!err.contains("server replied"));
    }

    #[test]
    fn success_goes_to_stdout() {
        let (ok, out, err) = printed(&UploadOutcome::Success);
        assert!(ok);
        assert_eq!(out, "Upload succeeded\n");
        assert!(err.is_empty());
    }
}
