use proptest::prelude::*;
use quorum_vault::{AuthorizationLedger, EventKind, EventLog, LedgerError};
use solana_program::{entrypoint::ProgramResult, pubkey::Pubkey};

fn approvers(n: usize) -> Vec<Pubkey> {
    (0..n).map(|_| Pubkey::new_unique()).collect()
}

fn noop(_: &Pubkey, _: u64, _: &[u8]) -> ProgramResult {
    Ok(())
}

/// Approver count with a threshold in `1..=count`.
fn quorum_shape() -> impl Strategy<Value = (usize, u8)> {
    (1usize..=16).prop_flat_map(|n| (Just(n), 1..=n as u8))
}

proptest! {
    #[test]
    fn valid_configuration_round_trips((n, threshold) in quorum_shape()) {
        let keys = approvers(n);
        let ledger = AuthorizationLedger::new(keys.clone(), threshold, EventLog::new()).unwrap();
        prop_assert_eq!(ledger.approvers(), keys.as_slice());
        prop_assert_eq!(ledger.threshold(), threshold);
    }

    #[test]
    fn threshold_above_count_is_rejected(n in 1usize..=16, extra in 1u8..=8) {
        let result = AuthorizationLedger::new(approvers(n), n as u8 + extra, EventLog::new());
        prop_assert!(matches!(result, Err(LedgerError::InvalidConfiguration(_))));
    }

    #[test]
    fn duplicate_approver_is_rejected(n in 2usize..=16, dup in any::<prop::sample::Index>()) {
        let mut keys = approvers(n);
        let i = dup.index(n - 1);
        keys[n - 1] = keys[i];
        let result = AuthorizationLedger::new(keys, 1, EventLog::new());
        prop_assert!(matches!(result, Err(LedgerError::InvalidConfiguration(_))));
    }

    /// Executes iff the number of distinct approvers reached the threshold.
    #[test]
    fn execution_follows_approval_count(
        (n, threshold) in quorum_shape(),
        approving in prop::collection::vec(any::<bool>(), 16),
    ) {
        let keys = approvers(n);
        let mut ledger = AuthorizationLedger::new(keys.clone(), threshold, EventLog::new()).unwrap();
        let index = ledger.propose(&keys[0], Pubkey::new_unique(), 0, vec![]).unwrap();

        let mut count = 0u8;
        for (key, approve) in keys.iter().zip(&approving) {
            if *approve {
                ledger.approve(key, index).unwrap();
                count += 1;
            }
        }
        prop_assert_eq!(ledger.get_action(index).unwrap().approval_count, count);

        let result = ledger.execute(&keys[0], index, &mut noop);
        if count >= threshold {
            prop_assert_eq!(result, Ok(()));
            prop_assert!(ledger.get_action(index).unwrap().executed);
            prop_assert_eq!(ledger.approve(&keys[0], index), Err(LedgerError::AlreadyExecuted));
        } else {
            prop_assert_eq!(result, Err(LedgerError::InsufficientApprovals));
            prop_assert!(!ledger.get_action(index).unwrap().executed);
        }
    }

    /// Interleaved approve/revoke keeps the counter equal to the set bits.
    #[test]
    fn counter_matches_approval_bits(ops in prop::collection::vec((0usize..4, any::<bool>()), 0..40)) {
        let keys = approvers(4);
        let mut ledger = AuthorizationLedger::new(keys.clone(), 4, EventLog::new()).unwrap();
        ledger.propose(&keys[0], Pubkey::new_unique(), 0, vec![]).unwrap();

        for (who, approve) in ops {
            let before = ledger.is_approved_by(0, &keys[who]);
            let result = if approve {
                ledger.approve(&keys[who], 0)
            } else {
                ledger.revoke(&keys[who], 0)
            };
            match (approve, before) {
                (true, true) => {
                    prop_assert_eq!(result, Err(LedgerError::AlreadyApproved));
                }
                (false, false) => {
                    prop_assert_eq!(result, Err(LedgerError::NotApproved));
                }
                _ => {
                    prop_assert_eq!(result, Ok(()));
                }
            }
            prop_assert_eq!(ledger.is_approved_by(0, &keys[who]), approve);
        }

        let set = keys.iter().filter(|k| ledger.is_approved_by(0, k)).count();
        prop_assert_eq!(ledger.get_action(0).unwrap().approval_count as usize, set);
    }

    #[test]
    fn indices_are_sequential(proposals in 1usize..20) {
        let keys = approvers(2);
        let mut ledger = AuthorizationLedger::new(keys.clone(), 1, EventLog::new()).unwrap();
        for expected in 0..proposals {
            let index = ledger.propose(&keys[expected % 2], Pubkey::new_unique(), 0, vec![]).unwrap();
            prop_assert_eq!(index, expected as u64);
        }
        prop_assert_eq!(ledger.action_count(), proposals as u64);
        let proposed = ledger
            .sink()
            .events()
            .iter()
            .filter(|e| e.kind() == EventKind::Proposed)
            .count();
        prop_assert_eq!(proposed, proposals);
    }
}
