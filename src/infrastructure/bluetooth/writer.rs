//! Write delivery disciplines
//!
//! Two ways to push a payload over an established session. Confirmed writes
//! wait out a settle delay, then require an acknowledgement within 800 ms;
//! any failure falls back to the unconfirmed discipline. Unconfirmed writes
//! submit up to four times with doubling backoff and treat silence inside
//! the grace window as delivered, since many device stacks never report
//! write-without-response completions.

use crate::error::LinkError;
use crate::infrastructure::bluetooth::gatt::{GattBackend, GattStatus, WriteKind};
use crate::infrastructure::bluetooth::session::LiveSession;
use crate::infrastructure::logging::DiagnosticLog;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Devices need quiescence after connect and discovery before the first
/// reliable write sticks.
const SETTLE_DELAY: Duration = Duration::from_millis(150);
/// How long a confirmed write waits for its acknowledgement.
const ACK_TIMEOUT: Duration = Duration::from_millis(800);
/// How long an unconfirmed write listens for an optional completion.
const COMPLETION_GRACE: Duration = Duration::from_millis(500);
/// Submission ceiling for the unconfirmed discipline.
const MAX_SUBMISSIONS: u32 = 4;
const BACKOFF_START: Duration = Duration::from_millis(80);
const BACKOFF_CAP: Duration = Duration::from_millis(400);

/// Delivers `payload` over the live session with the requested discipline.
pub(crate) async fn deliver<B: GattBackend>(
    backend: &mut B,
    session: &mut LiveSession,
    payload: &[u8],
    kind: WriteKind,
    diag: &DiagnosticLog,
) -> Result<(), LinkError> {
    match kind {
        WriteKind::Confirmed => {
            sleep(SETTLE_DELAY).await;
            match write_confirmed(backend, session, payload).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    diag.append(
                        "ble",
                        format!("confirmed write failed ({err}), falling back to unconfirmed"),
                    );
                    write_unconfirmed(backend, session, payload, diag).await
                }
            }
        }
        WriteKind::Unconfirmed => write_unconfirmed(backend, session, payload, diag).await,
    }
}

async fn write_confirmed<B: GattBackend>(
    backend: &mut B,
    session: &mut LiveSession,
    payload: &[u8],
) -> Result<(), LinkError> {
    backend.submit_write(payload, WriteKind::Confirmed).await?;
    match timeout(ACK_TIMEOUT, session.next_write_ack()).await {
        Ok(Some(GattStatus::Success)) => {
            debug!("confirmed write of {} bytes acknowledged", payload.len());
            Ok(())
        }
        Ok(Some(status)) => Err(LinkError::WriteRejected(format!(
            "acknowledgement status {status:?}"
        ))),
        Ok(None) => Err(LinkError::ConnectFailed(
            "link lost while awaiting acknowledgement".to_string(),
        )),
        Err(_) => Err(LinkError::WriteTimeout(ACK_TIMEOUT.as_millis() as u64)),
    }
}

async fn write_unconfirmed<B: GattBackend>(
    backend: &mut B,
    session: &mut LiveSession,
    payload: &[u8],
    diag: &DiagnosticLog,
) -> Result<(), LinkError> {
    let mut backoff = BACKOFF_START;
    let mut last_error = LinkError::WriteRejected("no submission attempted".to_string());
    for attempt in 1..=MAX_SUBMISSIONS {
        if attempt > 1 {
            sleep(backoff).await;
            backoff = (backoff * 2).min(BACKOFF_CAP);
        }
        match write_unconfirmed_once(backend, session, payload).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                diag.append(
                    "ble",
                    format!("unconfirmed write attempt {attempt}/{MAX_SUBMISSIONS} failed: {err}"),
                );
                last_error = err;
            }
        }
    }
    Err(last_error)
}

async fn write_unconfirmed_once<B: GattBackend>(
    backend: &mut B,
    session: &mut LiveSession,
    payload: &[u8],
) -> Result<(), LinkError> {
    backend.submit_write(payload, WriteKind::Unconfirmed).await?;
    // Completions are optional here: silence inside the grace window counts
    // as delivered, an explicit failure triggers a retry.
    match timeout(COMPLETION_GRACE, session.next_write_ack()).await {
        Ok(Some(GattStatus::Success)) => Ok(()),
        Ok(Some(status)) => Err(LinkError::WriteRejected(format!(
            "completion status {status:?}"
        ))),
        Ok(None) => Err(LinkError::ConnectFailed(
            "link lost after submission".to_string(),
        )),
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::gatt::BleTarget;
    use crate::infrastructure::bluetooth::mock::{ConnectOutcome, MockBackend, WriteOutcome};
    use crate::infrastructure::bluetooth::protocol;
    use crate::infrastructure::bluetooth::session::BleSessionManager;
    use tokio::time::Instant;

    fn target() -> BleTarget {
        protocol::linear_target("AA:BB:CC:DD:EE:FF")
    }

    fn ready_manager(mock: &MockBackend) -> BleSessionManager {
        mock.script_connects(&[ConnectOutcome::Ready]);
        BleSessionManager::spawn(mock.clone(), DiagnosticLog::new())
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_write_settles_then_acknowledges() {
        let mock = MockBackend::new();
        mock.script_writes(&[WriteOutcome::AckSuccess]);
        let manager = ready_manager(&mock);

        let started = Instant::now();
        manager
            .write(target(), b"payload".to_vec(), WriteKind::Confirmed)
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(150));

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].kind, WriteKind::Confirmed);
        assert_eq!(writes[0].payload, b"payload");
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_timeout_falls_back_to_unconfirmed() {
        let mock = MockBackend::new();
        mock.script_writes(&[WriteOutcome::Silent, WriteOutcome::AckSuccess]);
        let diag = DiagnosticLog::new();
        mock.script_connects(&[ConnectOutcome::Ready]);
        let manager = BleSessionManager::spawn(mock.clone(), diag.clone());

        let started = Instant::now();
        manager
            .write(target(), b"x".to_vec(), WriteKind::Confirmed)
            .await
            .unwrap();

        // 150 ms settle, 800 ms silent acknowledgement window, instant retry.
        assert_eq!(started.elapsed(), Duration::from_millis(950));
        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].kind, WriteKind::Confirmed);
        assert_eq!(writes[1].kind, WriteKind::Unconfirmed);
        assert!(diag
            .snapshot()
            .iter()
            .any(|line| line.contains("falling back")));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_confirmed_submission_falls_back_immediately() {
        let mock = MockBackend::new();
        mock.script_writes(&[WriteOutcome::Rejected, WriteOutcome::AckSuccess]);
        let manager = ready_manager(&mock);

        let started = Instant::now();
        manager
            .write(target(), b"x".to_vec(), WriteKind::Confirmed)
            .await
            .unwrap();

        // No acknowledgement wait when the submission itself is refused.
        assert_eq!(started.elapsed(), Duration::from_millis(150));
        assert_eq!(mock.writes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_backoff_doubles_between_attempts() {
        let mock = MockBackend::new();
        mock.script_writes(&[
            WriteOutcome::Rejected,
            WriteOutcome::Rejected,
            WriteOutcome::Rejected,
            WriteOutcome::Rejected,
        ]);
        let manager = ready_manager(&mock);

        let started = Instant::now();
        let err = manager
            .write(target(), b"x".to_vec(), WriteKind::Unconfirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::WriteRejected(_)));
        assert_eq!(started.elapsed(), Duration::from_millis(560));

        let writes = mock.writes();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[1].at - writes[0].at, Duration::from_millis(80));
        assert_eq!(writes[2].at - writes[1].at, Duration::from_millis(160));
        assert_eq!(writes[3].at - writes[2].at, Duration::from_millis(320));
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_silence_counts_as_delivered() {
        let mock = MockBackend::new();
        mock.script_writes(&[WriteOutcome::Silent]);
        let manager = ready_manager(&mock);

        let started = Instant::now();
        manager
            .write(target(), b"x".to_vec(), WriteKind::Unconfirmed)
            .await
            .unwrap();

        // One grace window, no retries.
        assert_eq!(started.elapsed(), Duration::from_millis(500));
        assert_eq!(mock.writes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_explicit_failure_is_retried() {
        let mock = MockBackend::new();
        mock.script_writes(&[WriteOutcome::AckFailure, WriteOutcome::AckSuccess]);
        let manager = ready_manager(&mock);

        let started = Instant::now();
        manager
            .write(target(), b"x".to_vec(), WriteKind::Unconfirmed)
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(80));
        assert_eq!(mock.writes().len(), 2);
    }
}
