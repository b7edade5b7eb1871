//! In-memory authorization ledger.
//!
//! Holds the approver set, the append-only action log and the held balance,
//! and applies the proposal / approval / revocation / execution rules.
//! Every operation either applies completely or leaves the ledger unchanged.
//! The one exception is a failed executor call: `executed` stays set, so a
//! failed action cannot be retried. An action whose value exceeds the held
//! balance is refused before it is claimed.

use std::collections::HashMap;

use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};


use crate::{
    error::LedgerError,
    events::{EventLog, EventSink, LedgerEvent},
    executor::ActionExecutor,
    state::{Action, LedgerSnapshot, Quorum},
};

pub struct AuthorizationLedger<S = EventLog> {
    quorum: Quorum,
    members: HashMap<Pubkey, usize>,
    actions: Vec<Action>,
    balance: u64,
    sink: S,
}

impl<S: EventSink> AuthorizationLedger<S> {
    pub fn new(approvers: Vec<Pubkey>, threshold: u8, sink: S) -> Result<Self, LedgerError> {
        let quorum = Quorum::new(approvers, threshold)?;
        Ok(Self::from_parts(quorum, Vec::new(), 0, sink))
    }

    /// Rebuilds a ledger from persisted state.
    pub fn restore(snapshot: LedgerSnapshot, sink: S) -> Result<Self, LedgerError> {
        let slots = snapshot.quorum.approvers().len();
        for action in &snapshot.actions {
            let counted = action.approvals.iter().filter(|b| **b).count();
            if action.approvals.len() != slots || counted != action.approval_count as usize {
                return Err(LedgerError::InvalidConfiguration("inconsistent approval set"));
            }
        }
        Ok(Self::from_parts(snapshot.quorum, snapshot.actions, snapshot.balance, sink))
    }

    fn from_parts(quorum: Quorum, actions: Vec<Action>, balance: u64, sink: S) -> Self {
        let members = quorum
            .approvers()
            .iter()
            .enumerate()
            .map(|(slot, key)| (*key, slot))
            .collect();
        Self { quorum, members, actions, balance, sink }
    }

    fn authorize(&self, caller: &Pubkey) -> Result<usize, LedgerError> {
        self.members.get(caller).copied().ok_or(LedgerError::Unauthorized)
    }

    /// Common precondition of approve / revoke / execute: caller is an
    /// approver, the action exists and has not been executed.
    fn pending_action(
        &mut self,
        caller: &Pubkey,
        index: u64,
    ) -> Result<(usize, &mut Action), LedgerError> {
        let slot = self.authorize(caller)?;
        let action = usize::try_from(index)
            .ok()
            .and_then(|i| self.actions.get_mut(i))
            .ok_or(LedgerError::NotFound)?;
        action.ensure_pending()?;
        Ok((slot, action))
    }

    fn action(&self, index: u64) -> Option<&Action> {
        usize::try_from(index).ok().and_then(|i| self.actions.get(i))
    }

    pub fn propose(
        &mut self,
        caller: &Pubkey,
        target: Pubkey,
        value: u64,
        payload: Vec<u8>,
    ) -> Result<u64, LedgerError> {
        self.authorize(caller)?;
        let index = self.actions.len() as u64;
        let slots = self.quorum.approvers().len();
        self.actions.push(Action::new(*caller, target, value, payload.clone(), slots));
        self.sink.emit(LedgerEvent::Proposed { proposer: *caller, index, target, value, payload });
        Ok(index)
    }

    pub fn approve(&mut self, caller: &Pubkey, index: u64) -> Result<(), LedgerError> {
        let (slot, action) = self.pending_action(caller, index)?;
        action.approve(slot)?;
        self.sink.emit(LedgerEvent::Approved { approver: *caller, index });
        Ok(())
    }

    pub fn revoke(&mut self, caller: &Pubkey, index: u64) -> Result<(), LedgerError> {
        let (slot, action) = self.pending_action(caller, index)?;
        action.revoke(slot)?;
        self.sink.emit(LedgerEvent::Revoked { approver: *caller, index });
        Ok(())
    }

    /// Runs an approved action through `executor`.
    ///
    /// `executed` is committed before the executor is called and is kept on
    /// executor failure.
    pub fn execute<E: ActionExecutor + ?Sized>(
        &mut self,
        caller: &Pubkey,
        index: u64,
        executor: &mut E,
    ) -> Result<(), LedgerError> {
        let action = self.claim_execution(caller, index)?;
        let outcome = executor.perform(&action.target, action.value, &action.payload);
        self.complete_execution(caller, index, outcome)
    }

    /// First half of [`execute`](Self::execute): checks the quorum and the
    /// held balance, marks the action executed and reserves its value.
    /// Returns a copy of the claimed action.
    pub(crate) fn claim_execution(
        &mut self,
        caller: &Pubkey,
        index: u64,
    ) -> Result<Action, LedgerError> {
        let threshold = self.quorum.threshold();
        let balance = self.balance;
        let (_, action) = self.pending_action(caller, index)?;
        if action.approval_count >= threshold && action.value > balance {
            msg!("Action {} needs {} but the ledger holds {}", index, action.value, balance);
            return Err(LedgerError::ExecutionFailed(ProgramError::InsufficientFunds));
        }
        action.claim(threshold)?;
        let claimed = action.clone();
        self.balance = balance - claimed.value;
        Ok(claimed)
    }

    /// Second half of [`execute`](Self::execute): records the executor outcome
    /// for an action claimed by `claim_execution`. A failure returns the
    /// reserved value to the balance.
    pub(crate) fn complete_execution(
        &mut self,
        caller: &Pubkey,
        index: u64,
        outcome: ProgramResult,
    ) -> Result<(), LedgerError> {
        self.authorize(caller)?;
        let value = match self.action(index) {
            Some(action) if action.executed => action.value,
            _ => return Err(LedgerError::NotFound),
        };
        if let Err(err) = outcome {
            msg!("Execution of action {} failed: {}", index, err);
            self.balance = self.balance.saturating_add(value);
            return Err(LedgerError::ExecutionFailed(err));
        }
        self.sink.emit(LedgerEvent::Executed { executor: *caller, index });
        Ok(())
    }

    /// Passive value reception. Open to any sender; returns the new balance.
    pub fn receive(&mut self, sender: &Pubkey, amount: u64) -> Result<u64, LedgerError> {
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        self.balance = balance;
        self.sink.emit(LedgerEvent::Received { sender: *sender, amount, balance });
        Ok(balance)
    }

    pub fn approvers(&self) -> &[Pubkey] {
        self.quorum.approvers()
    }

    pub fn threshold(&self) -> u8 {
        self.quorum.threshold()
    }

    pub fn is_approver(&self, key: &Pubkey) -> bool {
        self.members.contains_key(key)
    }

    pub fn action_count(&self) -> u64 {
        self.actions.len() as u64
    }

    pub fn get_action(&self, index: u64) -> Result<Action, LedgerError> {
        self.action(index).cloned().ok_or(LedgerError::NotFound)
    }

    /// False for unknown actions and non-approvers.
    pub fn is_approved_by(&self, index: u64, identity: &Pubkey) -> bool {
        match (self.action(index), self.members.get(identity)) {
            (Some(action), Some(slot)) => action.is_approved_by(*slot),
            _ => false,
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            quorum: self.quorum.clone(),
            actions: self.actions.clone(),
            balance: self.balance,
        }
    }
}
