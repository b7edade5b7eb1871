//! State-change notifications.
//!
//! Every successful mutation emits exactly one [`LedgerEvent`], in the order
//! the mutations are applied.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Proposed,
    Approved,
    Revoked,
    Executed,
    Received,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Proposed {
        proposer: Pubkey,
        index: u64,
        target: Pubkey,
        value: u64,
        payload: Vec<u8>,
    },
    Approved {
        approver: Pubkey,
        index: u64,
    },
    Revoked {
        approver: Pubkey,
        index: u64,
    },
    Executed {
        executor: Pubkey,
        index: u64,
    },
    Received {
        sender: Pubkey,
        amount: u64,
        balance: u64,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::Proposed { .. } => EventKind::Proposed,
            LedgerEvent::Approved { .. } => EventKind::Approved,
            LedgerEvent::Revoked { .. } => EventKind::Revoked,
            LedgerEvent::Executed { .. } => EventKind::Executed,
            LedgerEvent::Received { .. } => EventKind::Received,
        }
    }

    /// Identity that caused the event.
    pub fn actor(&self) -> &Pubkey {
        match self {
            LedgerEvent::Proposed { proposer, .. } => proposer,
            LedgerEvent::Approved { approver, .. } | LedgerEvent::Revoked { approver, .. } => {
                approver
            }
            LedgerEvent::Executed { executor, .. } => executor,
            LedgerEvent::Received { sender, .. } => sender,
        }
    }

    pub fn action_index(&self) -> Option<u64> {
        match self {
            LedgerEvent::Proposed { index, .. }
            | LedgerEvent::Approved { index, .. }
            | LedgerEvent::Revoked { index, .. }
            | LedgerEvent::Executed { index, .. } => Some(*index),
            LedgerEvent::Received { .. } => None,
        }
    }
}

pub trait EventSink {
    fn emit(&mut self, event: LedgerEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: LedgerEvent) {
        (**self).emit(event)
    }
}

/// In-order record of emitted events.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&LedgerEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }
}

/// Writes events to the program log: a readable line via `msg!` and the
/// borsh encoding via `sol_log_data` for indexers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgramLog;

impl EventSink for ProgramLog {
    fn emit(&mut self, event: LedgerEvent) {
        match &event {
            LedgerEvent::Proposed { proposer, index, target, value, payload } => msg!(
                "Proposed: index={} proposer={} target={} value={} payload_len={}",
                index,
                proposer,
                target,
                value,
                payload.len()
            ),
            LedgerEvent::Approved { approver, index } => {
                msg!("Approved: index={} approver={}", index, approver)
            }
            LedgerEvent::Revoked { approver, index } => {
                msg!("Revoked: index={} approver={}", index, approver)
            }
            LedgerEvent::Executed { executor, index } => {
                msg!("Executed: index={} executor={}", index, executor)
            }
            LedgerEvent::Received { sender, amount, balance } => {
                msg!("Received: sender={} amount={} balance={}", sender, amount, balance)
            }
        }
        if let Ok(data) = borsh::to_vec(&event) {
            sol_log_data(&[&data]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_follow_variant() {
        let who = Pubkey::new_unique();
        let approved = LedgerEvent::Approved { approver: who, index: 4 };
        assert_eq!(approved.kind(), EventKind::Approved);
        assert_eq!(approved.actor(), &who);
        assert_eq!(approved.action_index(), Some(4));

        let received = LedgerEvent::Received { sender: who, amount: 1, balance: 1 };
        assert_eq!(received.kind(), EventKind::Received);
        assert_eq!(received.action_index(), None);
    }

    fn emit_pair<S: EventSink>(mut sink: S, who: Pubkey) {
        sink.emit(LedgerEvent::Approved { approver: who, index: 0 });
        sink.emit(LedgerEvent::Revoked { approver: who, index: 0 });
    }

    #[test]
    fn log_preserves_order() {
        let who = Pubkey::new_unique();
        let mut log = EventLog::new();
        emit_pair(&mut log, who);
        let kinds: Vec<_> = log.events().iter().map(LedgerEvent::kind).collect();
        assert_eq!(kinds, vec![EventKind::Approved, EventKind::Revoked]);
    }

    #[test]
    fn encoded_event_decodes() {
        let event = LedgerEvent::Executed { executor: Pubkey::new_unique(), index: 9 };
        let data = borsh::to_vec(&event).unwrap();
        assert_eq!(LedgerEvent::try_from_slice(&data).unwrap(), event);
    }
}
