//! Native → cloud job state mapping.

use connector_core::{CloudJobState, DeviceActionCause, JobStateCause, UserActionCause};

/// Job state as reported by the native print subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeJobState {
    Pending,
    Held,
    Processing,
    Stopped,
    Canceled,
    Aborted,
    Completed,
}

/// The cloud-facing state a native state maps to, with its accompanying
/// cause where the mapping names one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedState {
    pub cloud_state: CloudJobState,
    pub cause: Option<JobStateCause>,
}

/// Map a native job state to the cloud state + cause pair.
pub fn map_job_state(native: NativeJobState) -> MappedState {
    match native {
        NativeJobState::Pending | NativeJobState::Held | NativeJobState::Processing => {
            MappedState {
                cloud_state: CloudJobState::InProgress,
                cause: None,
            }
        }
        NativeJobState::Stopped => MappedState {
            cloud_state: CloudJobState::Stopped,
            cause: Some(JobStateCause::DeviceAction(DeviceActionCause::Other)),
        },
        NativeJobState::Canceled => MappedState {
            cloud_state: CloudJobState::Aborted,
            cause: Some(JobStateCause::UserAction(UserActionCause::Canceled)),
        },
        NativeJobState::Aborted => MappedState {
            cloud_state: CloudJobState::Aborted,
            cause: Some(JobStateCause::DeviceAction(DeviceActionCause::PrintFailure)),
        },
        NativeJobState::Completed => MappedState {
            cloud_state: CloudJobState::Done,
            cause: None,
        },
    }
}

/// Terminal cloud states after which the job pipeline releases the submit
/// queue permit and deletes the temp file.
pub fn is_terminal(state: CloudJobState) -> bool {
    matches!(state, CloudJobState::Done | CloudJobState::Aborted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_progress_states_carry_no_cause() {
        for native in [
            NativeJobState::Pending,
            NativeJobState::Held,
            NativeJobState::Processing,
        ] {
            let mapped = map_job_state(native);
            assert_eq!(mapped.cloud_state, CloudJobState::InProgress);
            assert_eq!(mapped.cause, None);
        }
    }

    #[test]
    fn stopped_maps_to_device_action_other() {
        let mapped = map_job_state(NativeJobState::Stopped);
        assert_eq!(mapped.cloud_state, CloudJobState::Stopped);
        assert_eq!(
            mapped.cause,
            Some(JobStateCause::DeviceAction(DeviceActionCause::Other))
        );
    }

    #[test]
    fn canceled_maps_to_aborted_user_action() {
        let mapped = map_job_state(NativeJobState::Canceled);
        assert_eq!(mapped.cloud_state, CloudJobState::Aborted);
        assert_eq!(
            mapped.cause,
            Some(JobStateCause::UserAction(UserActionCause::Canceled))
        );
        assert!(is_terminal(mapped.cloud_state));
    }

    #[test]
    fn aborted_maps_to_aborted_device_print_failure() {
        let mapped = map_job_state(NativeJobState::Aborted);
        assert_eq!(mapped.cloud_state, CloudJobState::Aborted);
        assert_eq!(
            mapped.cause,
            Some(JobStateCause::DeviceAction(DeviceActionCause::PrintFailure))
        );
    }

    #[test]
    fn completed_maps_to_done() {
        let mapped = map_job_state(NativeJobState::Completed);
        assert_eq!(mapped.cloud_state, CloudJobState::Done);
        assert!(is_terminal(mapped.cloud_state));
    }

    #[test]
    fn cancelled_wire_spelling_has_two_ls() {
        let serialized = serde_json::to_string(&UserActionCause::Canceled).unwrap();
        assert_eq!(serialized, "\"CANCELLED\"");
    }
}
