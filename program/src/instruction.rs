use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use crate::{
    error::LedgerError,
    state::{find_action_address, find_ledger_address, find_vault_address},
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum LedgerInstruction {
    /// Create a new ledger account.
    /// Accounts:
    /// 0. [signer, writable] authority (pays for the account)
    /// 1. [writable] ledger (PDA)
    /// 2. [] system_program
    InitializeLedger {
        /// Ordered, unique approver keys.
        approvers: Vec<Pubkey>,
        /// Approvals required to execute.
        threshold: u8,
    },

    /// Append an action to the ledger's log.
    /// Accounts:
    /// 0. [signer, writable] proposer (pays for the action account)
    /// 1. [writable] ledger
    /// 2. [writable] action (PDA for the next index)
    /// 3. [] system_program
    ProposeAction {
        /// Recipient of `value`; program invoked with `payload` when non-empty.
        target: Pubkey,
        value: u64,
        payload: Vec<u8>,
    },

    /// Approve an existing action.
    /// Accounts:
    /// 0. [signer] approver
    /// 1. [] ledger
    /// 2. [writable] action
    ApproveAction { index: u64 },

    /// Withdraw an earlier approval.
    /// Accounts:
    /// 0. [signer] approver
    /// 1. [] ledger
    /// 2. [writable] action
    RevokeApproval { index: u64 },

    /// Execute an action once approvals are satisfied.
    /// Accounts:
    /// 0. [signer] executor
    /// 1. [] ledger
    /// 2. [writable] action
    /// 3. [writable] vault (PDA)
    /// 4. [] system_program
    /// 5.. accounts forwarded to the action (target first)
    ExecuteAction { index: u64 },

    /// Move lamports into the vault. Open to anyone.
    /// Accounts:
    /// 0. [signer, writable] sender
    /// 1. [] ledger
    /// 2. [writable] vault (PDA)
    /// 3. [] system_program
    Deposit { amount: u64 },
}

impl LedgerInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, LedgerError> {
        Self::try_from_slice(input).map_err(|_| LedgerError::InvalidInstruction)
    }

    fn into_instruction(self, program_id: &Pubkey, accounts: Vec<AccountMeta>) -> Instruction {
        Instruction::new_with_borsh(*program_id, &self, accounts)
    }
}

pub fn initialize_ledger(
    program_id: &Pubkey,
    authority: &Pubkey,
    approvers: Vec<Pubkey>,
    threshold: u8,
) -> Instruction {
    let (ledger, _) = find_ledger_address(program_id, authority);
    LedgerInstruction::InitializeLedger { approvers, threshold }.into_instruction(
        program_id,
        vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new(ledger, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// `index` must be the ledger's current action count.
pub fn propose_action(
    program_id: &Pubkey,
    ledger: &Pubkey,
    proposer: &Pubkey,
    index: u64,
    target: Pubkey,
    value: u64,
    payload: Vec<u8>,
) -> Instruction {
    let (action, _) = find_action_address(program_id, ledger, index);
    LedgerInstruction::ProposeAction { target, value, payload }.into_instruction(
        program_id,
        vec![
            AccountMeta::new(*proposer, true),
            AccountMeta::new(*ledger, false),
            AccountMeta::new(action, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

pub fn approve_action(program_id: &Pubkey, ledger: &Pubkey, approver: &Pubkey, index: u64) -> Instruction {
    let (action, _) = find_action_address(program_id, ledger, index);
    LedgerInstruction::ApproveAction { index }.into_instruction(
        program_id,
        vec![
            AccountMeta::new_readonly(*approver, true),
            AccountMeta::new_readonly(*ledger, false),
            AccountMeta::new(action, false),
        ],
    )
}

pub fn revoke_approval(program_id: &Pubkey, ledger: &Pubkey, approver: &Pubkey, index: u64) -> Instruction {
    let (action, _) = find_action_address(program_id, ledger, index);
    LedgerInstruction::RevokeApproval { index }.into_instruction(
        program_id,
        vec![
            AccountMeta::new_readonly(*approver, true),
            AccountMeta::new_readonly(*ledger, false),
            AccountMeta::new(action, false),
        ],
    )
}

/// `forwarded` is passed through to the action; it must contain the target.
pub fn execute_action(
    program_id: &Pubkey,
    ledger: &Pubkey,
    executor: &Pubkey,
    index: u64,
    forwarded: Vec<AccountMeta>,
) -> Instruction {
    let (action, _) = find_action_address(program_id, ledger, index);
    let (vault, _) = find_vault_address(program_id, ledger);
    let mut accounts = vec![
        AccountMeta::new_readonly(*executor, true),
        AccountMeta::new_readonly(*ledger, false),
        AccountMeta::new(action, false),
        AccountMeta::new(vault, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    accounts.extend(forwarded);
    LedgerInstruction::ExecuteAction { index }.into_instruction(program_id, accounts)
}

pub fn deposit(program_id: &Pubkey, ledger: &Pubkey, sender: &Pubkey, amount: u64) -> Instruction {
    let (vault, _) = find_vault_address(program_id, ledger);
    LedgerInstruction::Deposit { amount }.into_instruction(
        program_id,
        vec![
            AccountMeta::new(*sender, true),
            AccountMeta::new_readonly(*ledger, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}
