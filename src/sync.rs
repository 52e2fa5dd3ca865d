use serde::Serialize;
use tracing::{debug, warn};

use crate::types::RecordId;

/// Where the local copy stands relative to the remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    Clean,
    LocalDirty,
    SyncingOut,
    SyncingIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    LocalEdit,
    PushStarted,
    PushSucceeded(RecordId),
    PushFailed,
    RemoteChanged(RecordId),
    ReloadFinished(Option<RecordId>),
    ReloadFailed,
}

/// What the caller has to do after feeding an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    None,
    Push,
    Reload,
    IgnoreEcho,
    Ignore,
    Rejected,
}

/// Transition table. `known` is the id of the last record this session
/// wrote or loaded; a notification carrying it is our own echo.
pub fn transition(state: SyncState, event: &SyncEvent, known: Option<&RecordId>) -> (SyncState, SyncAction) {
    use SyncAction as A;
    use SyncEvent as E;
    use SyncState as S;

    if let E::RemoteChanged(id) = event {
        if known == Some(id) {
            return (state, A::IgnoreEcho);
        }
    }

    match (state, event) {
        (S::Clean | S::LocalDirty, E::LocalEdit) => (S::LocalDirty, A::Push),
        (S::LocalDirty, E::PushStarted) => (S::SyncingOut, A::None),
        (S::SyncingOut, E::PushSucceeded(_)) => (S::Clean, A::None),
        (S::SyncingOut, E::PushFailed) => (S::LocalDirty, A::None),
        (S::Clean | S::LocalDirty, E::RemoteChanged(_)) => (S::SyncingIn, A::Reload),
        // Our write lands after theirs, so ours wins.
        (S::SyncingOut, E::RemoteChanged(_)) => (S::SyncingOut, A::Ignore),
        // The reload in flight already fetches the newest record.
        (S::SyncingIn, E::RemoteChanged(_)) => (S::SyncingIn, A::Ignore),
        (_, E::ReloadFinished(_)) => (S::Clean, A::None),
        (S::SyncingIn, E::ReloadFailed) => (S::Clean, A::None),
        (state, _) => (state, A::Rejected),
    }
}

#[derive(Debug, Clone)]
pub struct SyncMachine {
    state: SyncState,
    known: Option<RecordId>,
}

impl Default for SyncMachine {
    fn default() -> Self {
        SyncMachine {
            state: SyncState::Clean,
            known: None,
        }
    }
}

impl SyncMachine {
    pub fn new() -> Self {
        SyncMachine::default()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn known_record(&self) -> Option<&RecordId> {
        self.known.as_ref()
    }

    pub fn apply(&mut self, event: SyncEvent) -> SyncAction {
        let (next, action) = transition(self.state, &event, self.known.as_ref());
        match action {
            SyncAction::Rejected => {
                warn!("sync: ignoring {event:?} while {:?}", self.state);
                return action;
            }
            SyncAction::IgnoreEcho => debug!("sync: echo of {event:?} suppressed"),
            _ => {}
        }
        match event {
            SyncEvent::PushSucceeded(id) => self.known = Some(id),
            SyncEvent::ReloadFinished(id) => self.known = id,
            _ => {}
        }
        self.state = next;
        action
    }
}
