use std::io::{Read, Write};

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::LedgerError;

/// Seed prefix of the ledger PDA: `["ledger", authority]`.
pub const LEDGER_SEED: &[u8] = b"ledger";
/// Seed prefix of the vault PDA: `["vault", ledger]`.
pub const VAULT_SEED: &[u8] = b"vault";
/// Seed prefix of an action PDA: `["action", ledger, index_le]`.
pub const ACTION_SEED: &[u8] = b"action";

/// Upper bound on the approver set, fixed by the width of the approval counter.
pub const MAX_APPROVERS: usize = u8::MAX as usize;

/// Approver set and threshold. Immutable once built.
///
/// Every way of obtaining a `Quorum` (construction and borsh decoding) goes
/// through [`Quorum::new`], so a held value always satisfies
/// `1 <= threshold <= approvers.len()` with unique, non-default keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quorum {
    approvers: Vec<Pubkey>,
    threshold: u8,
}

impl Quorum {
    pub fn new(approvers: Vec<Pubkey>, threshold: u8) -> Result<Self, LedgerError> {
        if approvers.is_empty() {
            return Err(LedgerError::InvalidConfiguration("approver set is empty"));
        }
        if approvers.len() > MAX_APPROVERS {
            return Err(LedgerError::InvalidConfiguration("too many approvers"));
        }
        if threshold == 0 || threshold as usize > approvers.len() {
            return Err(LedgerError::InvalidConfiguration("threshold out of range"));
        }
        for (i, key) in approvers.iter().enumerate() {
            if *key == Pubkey::default() {
                return Err(LedgerError::InvalidConfiguration("invalid approver identity"));
            }
            if approvers[..i].contains(key) {
                return Err(LedgerError::InvalidConfiguration("duplicate approver"));
            }
        }
        Ok(Self { approvers, threshold })
    }

    pub fn approvers(&self) -> &[Pubkey] {
        &self.approvers
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Approver slot of `key`, if it is a member.
    pub fn position(&self, key: &Pubkey) -> Option<usize> {
        self.approvers.iter().position(|k| k == key)
    }

    /// Guard evaluated first by every mutating operation.
    pub fn authorize(&self, caller: &Pubkey) -> Result<usize, LedgerError> {
        self.position(caller).ok_or(LedgerError::Unauthorized)
    }
}

impl BorshSerialize for Quorum {
    fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.approvers.serialize(writer)?;
        self.threshold.serialize(writer)
    }
}

impl BorshDeserialize for Quorum {
    fn deserialize_reader<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let approvers = Vec::<Pubkey>::deserialize_reader(reader)?;
        let threshold = u8::deserialize_reader(reader)?;
        Quorum::new(approvers, threshold)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}

/// One proposed unit of work. Never deleted; `executed` only goes false -> true.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub proposer: Pubkey,
    pub target: Pubkey,
    pub value: u64,
    pub payload: Vec<u8>,
    pub executed: bool,
    pub approval_count: u8,
    /// Approval bit per approver slot.
    pub approvals: Vec<bool>,
}

impl Action {
    pub fn new(proposer: Pubkey, target: Pubkey, value: u64, payload: Vec<u8>, slots: usize) -> Self {
        Self {
            proposer,
            target,
            value,
            payload,
            executed: false,
            approval_count: 0,
            approvals: vec![false; slots],
        }
    }

    pub fn is_approved_by(&self, slot: usize) -> bool {
        self.approvals.get(slot).copied().unwrap_or(false)
    }

    pub fn ensure_pending(&self) -> Result<(), LedgerError> {
        if self.executed {
            return Err(LedgerError::AlreadyExecuted);
        }
        Ok(())
    }

    pub fn approve(&mut self, slot: usize) -> Result<(), LedgerError> {
        self.ensure_pending()?;
        if self.is_approved_by(slot) {
            return Err(LedgerError::AlreadyApproved);
        }
        let bit = self.approvals.get_mut(slot).ok_or(LedgerError::Unauthorized)?;
        *bit = true;
        self.approval_count += 1;
        Ok(())
    }

    pub fn revoke(&mut self, slot: usize) -> Result<(), LedgerError> {
        self.ensure_pending()?;
        if !self.is_approved_by(slot) {
            return Err(LedgerError::NotApproved);
        }
        self.approvals[slot] = false;
        self.approval_count -= 1;
        Ok(())
    }

    /// Flips `executed` once the quorum is met. Must be committed before the
    /// executor runs.
    pub fn claim(&mut self, threshold: u8) -> Result<(), LedgerError> {
        self.ensure_pending()?;
        if self.approval_count < threshold {
            return Err(LedgerError::InsufficientApprovals);
        }
        self.executed = true;
        Ok(())
    }
}

/// On-chain ledger account.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerAccount {
    pub authority: Pubkey,
    pub bump: u8,
    pub vault_bump: u8,
    pub quorum: Quorum,
    pub action_count: u64,
}

/// Account data owned by the program: a kind byte followed by the borsh body.
pub trait ProgramAccount: BorshSerialize + BorshDeserialize {
    const KIND: u8;

    fn pack_account(&self) -> Result<Vec<u8>, ProgramError> {
        let mut data = vec![Self::KIND];
        self.serialize(&mut data)?;
        Ok(data)
    }

    fn unpack_account(data: &[u8]) -> Result<Self, ProgramError> {
        match data.split_first() {
            Some((kind, body)) if *kind == Self::KIND => Ok(Self::try_from_slice(body)?),
            _ => Err(ProgramError::InvalidAccountData),
        }
    }
}

impl ProgramAccount for LedgerAccount {
    const KIND: u8 = 1;
}

impl ProgramAccount for Action {
    const KIND: u8 = 2;
}

/// Everything needed to rebuild an in-memory ledger.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub quorum: Quorum,
    pub actions: Vec<Action>,
    pub balance: u64,
}

pub fn find_ledger_address(program_id: &Pubkey, authority: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[LEDGER_SEED, authority.as_ref()], program_id)
}

pub fn find_vault_address(program_id: &Pubkey, ledger: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, ledger.as_ref()], program_id)
}

pub fn find_action_address(program_id: &Pubkey, ledger: &Pubkey, index: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[ACTION_SEED, ledger.as_ref(), &index.to_le_bytes()],
        program_id,
    )
}
