//! Thread-safe handle over an [`AuthorizationLedger`].
//!
//! Mutations take the write lock and queries share the read lock, so no
//! caller ever observes half of an operation. The lock is released while the
//! executor runs: an executor may call back into the same ledger, and the
//! `executed` flag committed beforehand rejects any nested attempt to run the
//! same action again.

use std::sync::Arc;

use parking_lot::RwLock;
use solana_program::pubkey::Pubkey;

use crate::{
    error::LedgerError,
    events::{EventLog, EventSink},
    executor::ActionExecutor,
    ledger::AuthorizationLedger,
    state::{Action, LedgerSnapshot},
};

pub struct SharedLedger<S = EventLog> {
    inner: Arc<RwLock<AuthorizationLedger<S>>>,
}

impl<S> Clone for SharedLedger<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: EventSink> SharedLedger<S> {
    pub fn new(ledger: AuthorizationLedger<S>) -> Self {
        Self { inner: Arc::new(RwLock::new(ledger)) }
    }

    pub fn propose(
        &self,
        caller: &Pubkey,
        target: Pubkey,
        value: u64,
        payload: Vec<u8>,
    ) -> Result<u64, LedgerError> {
        self.inner.write().propose(caller, target, value, payload)
    }

    pub fn approve(&self, caller: &Pubkey, index: u64) -> Result<(), LedgerError> {
        self.inner.write().approve(caller, index)
    }

    pub fn revoke(&self, caller: &Pubkey, index: u64) -> Result<(), LedgerError> {
        self.inner.write().revoke(caller, index)
    }

    pub fn execute<E: ActionExecutor + ?Sized>(
        &self,
        caller: &Pubkey,
        index: u64,
        executor: &mut E,
    ) -> Result<(), LedgerError> {
        let action = self.inner.write().claim_execution(caller, index)?;
        let outcome = executor.perform(&action.target, action.value, &action.payload);
        self.inner.write().complete_execution(caller, index, outcome)
    }

    pub fn receive(&self, sender: &Pubkey, amount: u64) -> Result<u64, LedgerError> {
        self.inner.write().receive(sender, amount)
    }

    pub fn approvers(&self) -> Vec<Pubkey> {
        self.inner.read().approvers().to_vec()
    }

    pub fn action_count(&self) -> u64 {
        self.inner.read().action_count()
    }

    pub fn get_action(&self, index: u64) -> Result<Action, LedgerError> {
        self.inner.read().get_action(index)
    }

    pub fn is_approved_by(&self, index: u64, identity: &Pubkey) -> bool {
        self.inner.read().is_approved_by(index, identity)
    }

    pub fn balance(&self) -> u64 {
        self.inner.read().balance()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.read().snapshot()
    }

    /// Runs `f` against a consistent view of the ledger.
    pub fn read<R>(&self, f: impl FnOnce(&AuthorizationLedger<S>) -> R) -> R {
        let guard = self.inner.read();
        f(&*guard)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use solana_program::entrypoint::ProgramResult;

    use super::*;
    use crate::events::{EventKind, LedgerEvent};

    fn shared(n: usize, threshold: u8) -> (Vec<Pubkey>, SharedLedger) {
        let approvers: Vec<Pubkey> = (0..n).map(|_| Pubkey::new_unique()).collect();
        let ledger = AuthorizationLedger::new(approvers.clone(), threshold, EventLog::new()).unwrap();
        (approvers, SharedLedger::new(ledger))
    }

    #[test]
    fn concurrent_approvals_are_all_counted() {
        let (approvers, ledger) = shared(8, 8);
        ledger.propose(&approvers[0], Pubkey::new_unique(), 0, vec![]).unwrap();

        let handles: Vec<_> = approvers
            .iter()
            .map(|key| {
                let ledger = ledger.clone();
                let key = *key;
                thread::spawn(move || ledger.approve(&key, 0))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(ledger.get_action(0).unwrap().approval_count, 8);
        ledger.read(|l| assert_eq!(l.sink().len(), 9));
    }

    #[test]
    fn concurrent_execute_runs_once() {
        let (approvers, ledger) = shared(3, 2);
        ledger.propose(&approvers[0], Pubkey::new_unique(), 0, vec![]).unwrap();
        ledger.approve(&approvers[0], 0).unwrap();
        ledger.approve(&approvers[1], 0).unwrap();

        let handles: Vec<_> = approvers
            .iter()
            .map(|key| {
                let ledger = ledger.clone();
                let key = *key;
                thread::spawn(move || {
                    let mut exec = |_: &Pubkey, _: u64, _: &[u8]| -> ProgramResult { Ok(()) };
                    ledger.execute(&key, 0, &mut exec)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == LedgerError::AlreadyExecuted));
    }

    #[test]
    fn reentrant_executor_cannot_double_execute() {
        let (approvers, ledger) = shared(3, 2);
        ledger.propose(&approvers[0], Pubkey::new_unique(), 0, vec![]).unwrap();
        ledger.approve(&approvers[0], 0).unwrap();
        ledger.approve(&approvers[1], 0).unwrap();

        let inner = ledger.clone();
        let caller = approvers[2];
        let mut nested = Vec::new();
        let mut exec = |_: &Pubkey, _: u64, _: &[u8]| -> ProgramResult {
            let mut noop = |_: &Pubkey, _: u64, _: &[u8]| -> ProgramResult { Ok(()) };
            nested.push(inner.execute(&caller, 0, &mut noop));
            nested.push(inner.approve(&caller, 0));
            Ok(())
        };
        ledger.execute(&approvers[0], 0, &mut exec).unwrap();

        assert_eq!(
            nested,
            vec![Err(LedgerError::AlreadyExecuted), Err(LedgerError::AlreadyExecuted)]
        );
        ledger.read(|l| {
            let executed = l
                .sink()
                .events()
                .iter()
                .filter(|e| e.kind() == EventKind::Executed)
                .count();
            assert_eq!(executed, 1);
            assert_eq!(
                l.sink().last(),
                Some(&LedgerEvent::Executed { executor: approvers[0], index: 0 })
            );
        });
    }
}
