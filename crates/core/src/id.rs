// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes.
//!
//! `ProcessId` and `InstanceId` are opaque, caller-supplied strings — the
//! supervisor never mints one, it only carries whatever the caller passed in
//! when constructing a [`crate::ProcessDescriptor`].

crate::define_string_id! {
    /// Identifies the logical process being supervised (e.g. a project or
    /// task name). Stable across restarts of the same child.
    pub struct ProcessId;
}

crate::define_string_id! {
    /// Identifies one supervised run. Errors and rolling-log content are
    /// scoped to an `InstanceId`; a new instance typically means a fresh
    /// rolling-log file and error history.
    pub struct InstanceId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display() {
        let id = ProcessId::new("web-app");
        assert_eq!(id.to_string(), "web-app");
        assert_eq!(id.as_str(), "web-app");
    }

    #[test]
    fn from_str_and_string_agree() {
        let a = InstanceId::from("inst-1".to_string());
        let b: InstanceId = "inst-1".into();
        assert_eq!(a, b);
    }
}
