use crate::remote::{RemoteCoordinator, RemoteError, VehicleClass};
use crate::state::{EntryAssignment, SlotEvent};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockReply<T> {
    Ok(T),
    Fail,
    Malformed,
    /// Connection refused; also takes the link down.
    LinkLost,
}

impl<T> MockReply<T> {
    fn into_result(self) -> Result<T, RemoteError> {
        match self {
            MockReply::Ok(value) => Ok(value),
            MockReply::Fail => Err(RemoteError::Http(500, "mock failure".to_string())),
            MockReply::Malformed => Err(RemoteError::Malformed("mock malformed".to_string())),
            MockReply::LinkLost => Err(RemoteError::Connect(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            ))),
        }
    }
}

/// Coordinator that answers from per-call scripts and records every call.
///
/// An exhausted script keeps answering with its fallback value.
#[derive(Debug)]
pub struct ScriptedCoordinator {
    assignments: VecDeque<MockReply<EntryAssignment>>,
    exit_codes: VecDeque<MockReply<String>>,
    approvals: VecDeque<MockReply<bool>>,
    notify_replies: VecDeque<MockReply<u16>>,
    link_up: bool,
    reconnect_succeeds: bool,
    pub notified: Vec<SlotEvent>,
    pub entry_requests: Vec<VehicleClass>,
    pub exit_code_requests: usize,
    pub approval_polls: usize,
    pub reconnect_attempts: usize,
}

impl ScriptedCoordinator {
    pub fn new() -> Self {
        Self {
            assignments: VecDeque::new(),
            exit_codes: VecDeque::new(),
            approvals: VecDeque::new(),
            notify_replies: VecDeque::new(),
            link_up: true,
            reconnect_succeeds: true,
            notified: Vec::new(),
            entry_requests: Vec::new(),
            exit_code_requests: 0,
            approval_polls: 0,
            reconnect_attempts: 0,
        }
    }

    pub fn with_assignments(mut self, replies: Vec<MockReply<EntryAssignment>>) -> Self {
        self.assignments = replies.into();
        self
    }

    pub fn with_exit_codes(mut self, replies: Vec<MockReply<String>>) -> Self {
        self.exit_codes = replies.into();
        self
    }

    pub fn with_approvals(mut self, replies: Vec<MockReply<bool>>) -> Self {
        self.approvals = replies.into();
        self
    }

    pub fn with_notify_replies(mut self, replies: Vec<MockReply<u16>>) -> Self {
        self.notify_replies = replies.into();
        self
    }

    pub fn set_link_up(&mut self, up: bool) {
        self.link_up = up;
    }

    pub fn set_reconnect_succeeds(&mut self, succeeds: bool) {
        self.reconnect_succeeds = succeeds;
    }
}

impl ScriptedCoordinator {
    fn answer<T>(&mut self, reply: MockReply<T>) -> Result<T, RemoteError> {
        let result = reply.into_result();
        if let Err(err) = &result
            && err.is_link_loss()
        {
            self.link_up = false;
        }
        result
    }
}

impl Default for ScriptedCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteCoordinator for ScriptedCoordinator {
    fn notify_slot_event(&mut self, event: SlotEvent) -> Result<u16, RemoteError> {
        self.notified.push(event);
        let reply = self.notify_replies.pop_front().unwrap_or(MockReply::Ok(200));
        self.answer(reply)
    }

    fn request_entry_assignment(
        &mut self,
        class: VehicleClass,
    ) -> Result<EntryAssignment, RemoteError> {
        self.entry_requests.push(class);
        let reply = self.assignments.pop_front().unwrap_or(MockReply::Ok(EntryAssignment {
            slot: 1,
            passkey: 1000,
        }));
        self.answer(reply)
    }

    fn request_exit_code(&mut self) -> Result<String, RemoteError> {
        self.exit_code_requests += 1;
        let reply = self
            .exit_codes
            .pop_front()
            .unwrap_or_else(|| MockReply::Ok("0000".to_string()));
        self.answer(reply)
    }

    fn poll_exit_approval(&mut self) -> Result<bool, RemoteError> {
        self.approval_polls += 1;
        let reply = self.approvals.pop_front().unwrap_or(MockReply::Ok(false));
        self.answer(reply)
    }

    fn is_link_up(&self) -> bool {
        self.link_up
    }

    fn reconnect(&mut self) -> bool {
        self.reconnect_attempts += 1;
        if self.reconnect_succeeds {
            self.link_up = true;
        }
        self.link_up
    }
}
