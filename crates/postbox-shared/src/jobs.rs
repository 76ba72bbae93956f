//! Job descriptors exchanged with the dispatcher.
//!
//! A job is a string action plus a JSON map of extras, the same shape the
//! platform job scheduler hands to the inbox.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    ACTION_RICH_PUSH_MESSAGES_UPDATE, ACTION_RICH_PUSH_USER_UPDATE, ACTION_SYNC_MESSAGE_STATE,
    EXTRA_FORCEFULLY,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobInfo {
    pub action: String,
    #[serde(default)]
    pub extras: Map<String, Value>,
}

impl JobInfo {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extras.insert(key.to_string(), value.into());
        self
    }

    /// Boolean extra, `default` when missing or not a bool.
    pub fn bool_extra(&self, key: &str, default: bool) -> bool {
        self.extras
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }
}

/// The job scheduler only ever hears "finished"; retry decisions are driven
/// by the sync outcome instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    Finished,
}

/// Typed form of the three inbox job actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    UpdateMessages,
    UpdateUser { forcefully: bool },
    SyncState,
}

impl SyncAction {
    pub fn from_job(job: &JobInfo) -> Option<Self> {
        match job.action.as_str() {
            ACTION_RICH_PUSH_MESSAGES_UPDATE => Some(Self::UpdateMessages),
            ACTION_RICH_PUSH_USER_UPDATE => Some(Self::UpdateUser {
                forcefully: job.bool_extra(EXTRA_FORCEFULLY, false),
            }),
            ACTION_SYNC_MESSAGE_STATE => Some(Self::SyncState),
            _ => None,
        }
    }

    /// Queue an action belongs to; at most one job per class runs at a time.
    pub fn class(self) -> ActionClass {
        match self {
            Self::UpdateMessages => ActionClass::Messages,
            Self::UpdateUser { .. } => ActionClass::User,
            Self::SyncState => ActionClass::State,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::UpdateMessages => ACTION_RICH_PUSH_MESSAGES_UPDATE,
            Self::UpdateUser { .. } => ACTION_RICH_PUSH_USER_UPDATE,
            Self::SyncState => ACTION_SYNC_MESSAGE_STATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionClass {
    Messages,
    User,
    State,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_update_reads_forcefully_extra() {
        let job = JobInfo::new(ACTION_RICH_PUSH_USER_UPDATE).with_extra(EXTRA_FORCEFULLY, true);
        assert_eq!(
            SyncAction::from_job(&job),
            Some(SyncAction::UpdateUser { forcefully: true })
        );

        let job = JobInfo::new(ACTION_RICH_PUSH_USER_UPDATE);
        assert_eq!(
            SyncAction::from_job(&job),
            Some(SyncAction::UpdateUser { forcefully: false })
        );
    }

    #[test]
    fn non_bool_extra_falls_back_to_default() {
        let job = JobInfo::new(ACTION_RICH_PUSH_USER_UPDATE).with_extra(EXTRA_FORCEFULLY, "yes");
        assert!(!job.bool_extra(EXTRA_FORCEFULLY, false));
    }

    #[test]
    fn unknown_action_is_none() {
        assert_eq!(SyncAction::from_job(&JobInfo::new("ACTION_NOPE")), None);
    }
}
