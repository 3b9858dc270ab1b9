use crate::gate::{GateHardware, GateTiming, close_when_clear};
use crate::remote::RemoteCoordinator;
use crate::state::{GateEvent, GatePhase, GateState};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Exit gate with the code/approval handshake.
///
/// Once a car has waited for the detection window, an exit code is fetched
/// for the driver and the service is polled every tick until it approves the
/// exit. The gate never opens on detection alone.
pub struct ExitGate {
    state: GateState,
    hardware: GateHardware,
    timing: GateTiming,
    approval_timeout: Option<Duration>,
    awaiting_approval: bool,
    awaiting_since: Option<Instant>,
    exit_code: Option<String>,
}

impl ExitGate {
    pub fn new(
        mut hardware: GateHardware,
        timing: GateTiming,
        approval_timeout: Option<Duration>,
    ) -> Self {
        hardware.close(&timing);
        Self {
            state: GateState::default(),
            hardware,
            timing,
            approval_timeout,
            awaiting_approval: false,
            awaiting_since: None,
            exit_code: None,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn phase(&self) -> GatePhase {
        self.state.phase()
    }

    pub fn is_awaiting_approval(&self) -> bool {
        self.awaiting_approval
    }

    /// Code currently shown to the driver while approval is pending.
    pub fn exit_code(&self) -> Option<&str> {
        self.exit_code.as_deref()
    }

    pub fn last_reading(&self) -> Option<u16> {
        self.hardware.last_reading()
    }

    pub fn check<R>(&mut self, remote: &mut R, now: Instant) -> Vec<GateEvent>
    where
        R: RemoteCoordinator + ?Sized,
    {
        let mut events = Vec::new();
        match self.hardware.sense(self.timing.detection_threshold) {
            Some(true) => {
                let waited = self.state.track_detection(now);
                if !self.state.is_open
                    && !self.awaiting_approval
                    && waited >= self.timing.gate_wait
                {
                    events.extend(self.issue_exit_code(remote, now));
                }
            }
            Some(false) => {
                events.extend(close_when_clear(
                    &mut self.state,
                    &mut self.hardware,
                    &self.timing,
                    now,
                ));
            }
            None => {}
        }

        if self.awaiting_approval {
            events.extend(self.await_approval(remote, now));
        }
        events
    }

    fn issue_exit_code<R>(&mut self, remote: &mut R, now: Instant) -> Option<GateEvent>
    where
        R: RemoteCoordinator + ?Sized,
    {
        if !remote.is_link_up() {
            debug!("Exit code request deferred, coordination link down");
            return None;
        }

        match remote.request_exit_code() {
            Ok(code) => {
                info!(exit_code = %code, "Exit code issued, waiting for approval");
                self.exit_code = Some(code);
                self.awaiting_approval = true;
                self.awaiting_since = Some(now);
                Some(GateEvent::ExitCodeIssued)
            }
            Err(err) => {
                warn!(kind = ?err.kind(), error = %err, "Exit code request failed, retrying next tick");
                None
            }
        }
    }

    fn await_approval<R>(&mut self, remote: &mut R, now: Instant) -> Option<GateEvent>
    where
        R: RemoteCoordinator + ?Sized,
    {
        if let (Some(limit), Some(since)) = (self.approval_timeout, self.awaiting_since)
            && now.saturating_duration_since(since) >= limit
        {
            warn!(
                timeout_ms = limit.as_millis(),
                "Exit approval timed out, abandoning request"
            );
            self.abandon_approval();
            return Some(GateEvent::ApprovalExpired);
        }

        if !remote.is_link_up() {
            return None;
        }

        match remote.poll_exit_approval() {
            Ok(true) => {
                info!("Exit approved");
                self.hardware.open(&self.timing);
                self.state.mark_open();
                self.awaiting_approval = false;
                self.awaiting_since = None;
                self.exit_code = None;
                Some(GateEvent::Opened)
            }
            Ok(false) => {
                debug!("Exit not yet approved");
                None
            }
            Err(err) => {
                warn!(kind = ?err.kind(), error = %err, "Exit approval poll failed");
                None
            }
        }
    }

    fn abandon_approval(&mut self) {
        self.awaiting_approval = false;
        self.awaiting_since = None;
        self.exit_code = None;
        // A car still waiting must sit through a full window before a new code.
        self.state.detect_start = None;
    }
}
