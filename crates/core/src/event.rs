// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport-neutral events emitted by the supervisor (§4.8, §6, Design Note
//! in §9: "a message channel carrying a tagged union of the four event
//! shapes" in place of the original's ad hoc publish/subscribe).

use crate::id::{InstanceId, ProcessId};
use crate::pattern::{Category, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEventFields {
    pub category: Category,
    pub severity: Severity,
    pub message: String,
    pub hash: String,
    pub is_new_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ProcessStarted {
        process_id: ProcessId,
        instance_id: InstanceId,
        pid: u32,
        command: String,
        timestamp: DateTime<Utc>,
    },
    ProcessStopped {
        process_id: ProcessId,
        instance_id: InstanceId,
        exit_code: Option<i32>,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    ProcessCrashed {
        process_id: ProcessId,
        instance_id: InstanceId,
        exit_code: Option<i32>,
        signal: Option<String>,
        will_restart: bool,
        timestamp: DateTime<Utc>,
    },
    ErrorDetected {
        process_id: ProcessId,
        instance_id: InstanceId,
        error: ErrorEventFields,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn instance_id(&self) -> &InstanceId {
        match self {
            Event::ProcessStarted { instance_id, .. }
            | Event::ProcessStopped { instance_id, .. }
            | Event::ProcessCrashed { instance_id, .. }
            | Event::ErrorDetected { instance_id, .. } => instance_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_a_type_tag() {
        let event = Event::ProcessStarted {
            process_id: ProcessId::new("web"),
            instance_id: InstanceId::new("inst-1"),
            pid: 42,
            command: "npm run dev".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["type"], "process_started");
        assert_eq!(json["pid"], 42);
    }

    #[test]
    fn instance_id_accessor_covers_all_variants() {
        let iid = InstanceId::new("inst-1");
        let events = vec![
            Event::ProcessStarted {
                process_id: ProcessId::new("p"),
                instance_id: iid.clone(),
                pid: 1,
                command: "x".to_string(),
                timestamp: Utc::now(),
            },
            Event::ProcessStopped {
                process_id: ProcessId::new("p"),
                instance_id: iid.clone(),
                exit_code: Some(0),
                reason: "exit".to_string(),
                timestamp: Utc::now(),
            },
        ];
        for e in events {
            assert_eq!(e.instance_id(), &iid);
        }
    }
}
