use crate::domain::SemesterStatusRecord;

/// Whether mutating actions are allowed for the semester `requested`.
///
/// Anything not known to be locked permits writes. The globally active
/// semester is always writable, whatever its state.
pub fn is_writable(record: Option<&SemesterStatusRecord>, requested: Option<&str>) -> bool {
    let Some(requested) = requested.filter(|it| !it.trim().is_empty()) else {
        return true;
    };
    let Some(record) = record else {
        return true;
    };
    if let Some(active) = record.identity {
        if active.matches_key(requested) {
            return true;
        }
    }
    record
        .state
        .map(|state| state.permits_writes())
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LifecycleState, Ordinal, SemesterIdentity};

    const ALL_STATES: [LifecycleState; 5] = [
        LifecycleState::Active,
        LifecycleState::Closing,
        LifecycleState::LockedSoft,
        LifecycleState::LockedHard,
        LifecycleState::Archived,
    ];

    fn active() -> SemesterIdentity {
        SemesterIdentity::new(Ordinal::First, 2025)
    }

    fn record(state: LifecycleState) -> SemesterStatusRecord {
        SemesterStatusRecord::new(Some(active()), Some(state))
    }

    #[test]
    fn truth_table() {
        for state in ALL_STATES {
            let record = record(state);
            // The active semester stays writable in every state.
            assert!(is_writable(Some(&record), Some("1-2025")), "{}", state);

            let other = is_writable(Some(&record), Some("2-2024"));
            let expected = matches!(state, LifecycleState::Active | LifecycleState::Closing);
            assert_eq!(other, expected, "{}", state);

            assert!(is_writable(None, Some("1-2025")));
            assert!(is_writable(None, Some("2-2024")));
        }
    }

    #[test]
    fn nothing_selected_is_writable() {
        let record = record(LifecycleState::Archived);
        assert!(is_writable(Some(&record), None));
        assert!(is_writable(Some(&record), Some("")));
    }

    #[test]
    fn active_semester_locked_soft_is_writable() {
        let record = record(LifecycleState::LockedSoft);
        assert!(is_writable(Some(&record), Some("1-2025")));
    }

    #[test]
    fn older_archived_semester_is_read_only() {
        let record = record(LifecycleState::Archived);
        assert!(!is_writable(Some(&record), Some("2-2024")));
    }

    #[test]
    fn legacy_key_matches_active_semester() {
        let record = record(LifecycleState::LockedHard);
        assert!(is_writable(Some(&record), Some("hoc_ky_1-2025")));
        assert!(!is_writable(Some(&record), Some("hoc_ky_2-2024")));
    }

    #[test]
    fn partial_records_fail_open() {
        let no_state = SemesterStatusRecord::new(Some(active()), None);
        assert!(is_writable(Some(&no_state), Some("2-2024")));

        let no_identity = SemesterStatusRecord::new(None, Some(LifecycleState::LockedHard));
        assert!(!is_writable(Some(&no_identity), Some("1-2025")));

        let unknown = SemesterStatusRecord::new(None, Some(LifecycleState::Unknown));
        assert!(is_writable(Some(&unknown), Some("2-2024")));

        assert!(is_writable(Some(&SemesterStatusRecord::default()), Some("x")));
    }
}
