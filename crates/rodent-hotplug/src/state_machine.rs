use rodent_domain::DiskState;

use crate::event::Action;

/// Every externally visible disk state change goes through here first;
/// transitions outside this table are rejected.
pub fn is_permitted(from: DiskState, to: DiskState) -> bool {
    use DiskState::*;
    let allowed: &[DiskState] = match from {
        Unknown => &[Discovered, Offline],
        Discovered => &[Validating, Offline, Quarantined],
        Validating => &[Available, Degraded, Faulted, Quarantined, Offline],
        Available => &[Degraded, Faulted, Quarantined, Offline, Online],
        Online => &[Available, Degraded, Faulted, Quarantined, Removing],
        Degraded => &[Available, Faulted, Quarantined, Offline],
        Faulted => &[Quarantined, Offline, Retired],
        Quarantined => &[Available, Offline, Retired],
        Removing => &[Offline, Retired],
        Offline => &[Discovered, Retired],
        Retired => &[],
        Unauthorized => &[Discovered, Offline],
    };
    allowed.contains(&to)
}

/// Attempts `from -> to`; `Ok` only if the transition is in the permitted
/// table.
pub fn transition(from: DiskState, to: DiskState) -> Result<DiskState, TransitionError> {
    if from == to {
        return Ok(to);
    }
    if is_permitted(from, to) {
        Ok(to)
    } else {
        Err(TransitionError { from, to })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid disk state transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: DiskState,
    pub to: DiskState,
}

/// The automatic state implied by a hotplug action, if any. `change` never
/// implies a transition on its own; it only triggers re-evaluation by the
/// caller.
pub fn action_implied_state(action: Action, current: DiskState) -> Option<DiskState> {
    match action {
        Action::Add if matches!(current, DiskState::Unknown | DiskState::Offline) => Some(DiskState::Discovered),
        Action::Remove => Some(DiskState::Offline),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permitted_transition_succeeds() {
        assert_eq!(
            transition(DiskState::Discovered, DiskState::Validating),
            Ok(DiskState::Validating)
        );
    }

    #[test]
    fn same_state_is_a_no_op_success() {
        assert_eq!(transition(DiskState::Online, DiskState::Online), Ok(DiskState::Online));
    }

    #[test]
    fn unlisted_transition_is_rejected() {
        assert!(transition(DiskState::Retired, DiskState::Online).is_err());
        assert!(transition(DiskState::Discovered, DiskState::Online).is_err());
    }

    #[test]
    fn retired_is_terminal() {
        for state in [
            DiskState::Unknown,
            DiskState::Discovered,
            DiskState::Validating,
            DiskState::Available,
            DiskState::Online,
            DiskState::Degraded,
            DiskState::Faulted,
            DiskState::Quarantined,
            DiskState::Removing,
            DiskState::Offline,
            DiskState::Retired,
            DiskState::Unauthorized,
        ] {
            assert!(!is_permitted(DiskState::Retired, state));
        }
    }

    #[test]
    fn add_on_unknown_or_offline_implies_discovered() {
        assert_eq!(
            action_implied_state(Action::Add, DiskState::Unknown),
            Some(DiskState::Discovered)
        );
        assert_eq!(
            action_implied_state(Action::Add, DiskState::Offline),
            Some(DiskState::Discovered)
        );
        assert_eq!(action_implied_state(Action::Add, DiskState::Online), None);
    }

    #[test]
    fn remove_always_implies_offline() {
        assert_eq!(action_implied_state(Action::Remove, DiskState::Online), Some(DiskState::Offline));
    }

    #[test]
    fn change_never_implies_a_transition() {
        assert_eq!(action_implied_state(Action::Change, DiskState::Online), None);
    }
}
