use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{rent::Rent, Sysvar},
};

use crate::{
    error::LedgerError,
    events::{EventSink, LedgerEvent, ProgramLog},
    executor::{ActionExecutor, VaultExecutor},
    instruction::LedgerInstruction,
    state::{
        Action, LedgerAccount, ProgramAccount, Quorum, ACTION_SEED, LEDGER_SEED, VAULT_SEED,
    },
};

pub struct Processor;

impl Processor {
    pub fn process(program_id: &Pubkey, accounts: &[AccountInfo], input: &[u8]) -> ProgramResult {
        let ix = LedgerInstruction::unpack(input)?;

        match ix {
            LedgerInstruction::InitializeLedger { approvers, threshold } => {
                Self::process_initialize_ledger(program_id, accounts, approvers, threshold)
            }
            LedgerInstruction::ProposeAction { target, value, payload } => {
                Self::process_propose(program_id, accounts, target, value, payload)
            }
            LedgerInstruction::ApproveAction { index } => {
                Self::process_approve(program_id, accounts, index)
            }
            LedgerInstruction::RevokeApproval { index } => {
                Self::process_revoke(program_id, accounts, index)
            }
            LedgerInstruction::ExecuteAction { index } => {
                Self::process_execute(program_id, accounts, index)
            }
            LedgerInstruction::Deposit { amount } => {
                Self::process_deposit(program_id, accounts, amount)
            }
        }
    }

    fn process_initialize_ledger(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        approvers: Vec<Pubkey>,
        threshold: u8,
    ) -> ProgramResult {
        let acc_iter = &mut accounts.iter();
        let authority = next_account_info(acc_iter)?;
        let ledger_ai = next_account_info(acc_iter)?;
        let system_program = next_account_info(acc_iter)?;

        if !authority.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        let quorum = Quorum::new(approvers, threshold).map_err(|e| {
            msg!("Rejected ledger configuration: {}", e);
            e
        })?;

        // Create ledger PDA account (seed: ["ledger", authority])
        let (pda, bump) =
            Pubkey::find_program_address(&[LEDGER_SEED, authority.key.as_ref()], program_id);
        if pda != *ledger_ai.key {
            return Err(ProgramError::InvalidSeeds);
        }
        let (_, vault_bump) =
            Pubkey::find_program_address(&[VAULT_SEED, ledger_ai.key.as_ref()], program_id);

        let ledger = LedgerAccount {
            authority: *authority.key,
            bump,
            vault_bump,
            quorum,
            action_count: 0,
        };
        let data = ledger.pack_account()?;
        let rent = Rent::get()?;
        let lamports = rent.minimum_balance(data.len());

        invoke_signed(
            &system_instruction::create_account(
                authority.key,
                ledger_ai.key,
                lamports,
                data.len() as u64,
                program_id,
            ),
            &[authority.clone(), ledger_ai.clone(), system_program.clone()],
            &[&[LEDGER_SEED, authority.key.as_ref(), &[bump]]],
        )?;

        ledger_ai.data.borrow_mut()[..data.len()].copy_from_slice(&data);
        msg!(
            "Ledger initialized: approvers={} threshold={}",
            ledger.quorum.approvers().len(),
            ledger.quorum.threshold()
        );
        Ok(())
    }

    fn process_propose(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        target: Pubkey,
        value: u64,
        payload: Vec<u8>,
    ) -> ProgramResult {
        let acc_iter = &mut accounts.iter();
        let proposer = next_account_info(acc_iter)?;
        let ledger_ai = next_account_info(acc_iter)?;
        let action_ai = next_account_info(acc_iter)?;
        let system_program = next_account_info(acc_iter)?;

        if !proposer.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut ledger = load_ledger(program_id, ledger_ai)?;
        ledger.quorum.authorize(proposer.key)?;

        // Create action PDA (seed: ["action", ledger, index])
        let index = ledger.action_count;
        let index_bytes = index.to_le_bytes();
        let (pda, bump) = Pubkey::find_program_address(
            &[ACTION_SEED, ledger_ai.key.as_ref(), &index_bytes],
            program_id,
        );
        if pda != *action_ai.key {
            return Err(ProgramError::InvalidSeeds);
        }

        let slots = ledger.quorum.approvers().len();
        let action = Action::new(*proposer.key, target, value, payload.clone(), slots);
        let data = action.pack_account()?;
        let rent = Rent::get()?;
        let lamports = rent.minimum_balance(data.len());

        invoke_signed(
            &system_instruction::create_account(
                proposer.key,
                action_ai.key,
                lamports,
                data.len() as u64,
                program_id,
            ),
            &[proposer.clone(), action_ai.clone(), system_program.clone()],
            &[&[ACTION_SEED, ledger_ai.key.as_ref(), &index_bytes, &[bump]]],
        )?;

        action_ai.data.borrow_mut()[..data.len()].copy_from_slice(&data);
        ledger.action_count = index.checked_add(1).ok_or(ProgramError::ArithmeticOverflow)?;
        store(&ledger, ledger_ai)?;

        ProgramLog.emit(LedgerEvent::Proposed { proposer: *proposer.key, index, target, value, payload });
        Ok(())
    }

    fn process_approve(program_id: &Pubkey, accounts: &[AccountInfo], index: u64) -> ProgramResult {
        let acc_iter = &mut accounts.iter();
        let approver = next_account_info(acc_iter)?;
        let ledger_ai = next_account_info(acc_iter)?;
        let action_ai = next_account_info(acc_iter)?;

        let (ledger, slot, mut action) =
            load_pending(program_id, approver, ledger_ai, action_ai, index)?;
        action.approve(slot)?;
        store(&action, action_ai)?;

        msg!(
            "Action {} has {}/{} approvals",
            index,
            action.approval_count,
            ledger.quorum.threshold()
        );
        ProgramLog.emit(LedgerEvent::Approved { approver: *approver.key, index });
        Ok(())
    }

    fn process_revoke(program_id: &Pubkey, accounts: &[AccountInfo], index: u64) -> ProgramResult {
        let acc_iter = &mut accounts.iter();
        let approver = next_account_info(acc_iter)?;
        let ledger_ai = next_account_info(acc_iter)?;
        let action_ai = next_account_info(acc_iter)?;

        let (_, slot, mut action) = load_pending(program_id, approver, ledger_ai, action_ai, index)?;
        action.revoke(slot)?;
        store(&action, action_ai)?;

        ProgramLog.emit(LedgerEvent::Revoked { approver: *approver.key, index });
        Ok(())
    }

    fn process_execute(program_id: &Pubkey, accounts: &[AccountInfo], index: u64) -> ProgramResult {
        let acc_iter = &mut accounts.iter();
        let executor = next_account_info(acc_iter)?;
        let ledger_ai = next_account_info(acc_iter)?;
        let action_ai = next_account_info(acc_iter)?;
        let vault_ai = next_account_info(acc_iter)?;
        let system_program = next_account_info(acc_iter)?;
        let forwarded = acc_iter.as_slice();

        let (ledger, _, mut action) =
            load_pending(program_id, executor, ledger_ai, action_ai, index)?;
        if let Err(e) = action.claim(ledger.quorum.threshold()) {
            msg!("Execute rejected: {}/{}", action.approval_count, ledger.quorum.threshold());
            return Err(e.into());
        }

        // Persist `executed` before any cross-program call can re-enter.
        store(&action, action_ai)?;

        let vault_bump = [ledger.vault_bump];
        let vault_seeds: [&[u8]; 3] = [VAULT_SEED, ledger_ai.key.as_ref(), &vault_bump];
        check_vault(program_id, ledger_ai, vault_ai, &vault_seeds)?;
        if !solana_program::system_program::check_id(system_program.key) {
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut vault_executor = VaultExecutor {
            vault: vault_ai,
            system_program,
            accounts: forwarded,
            vault_seeds: &vault_seeds,
        };
        vault_executor
            .perform(&action.target, action.value, &action.payload)
            .map_err(|e| {
                msg!("Execution of action {} failed: {}", index, e);
                LedgerError::ExecutionFailed(e)
            })?;

        ProgramLog.emit(LedgerEvent::Executed { executor: *executor.key, index });
        Ok(())
    }

    fn process_deposit(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
        let acc_iter = &mut accounts.iter();
        let sender = next_account_info(acc_iter)?;
        let ledger_ai = next_account_info(acc_iter)?;
        let vault_ai = next_account_info(acc_iter)?;
        let system_program = next_account_info(acc_iter)?;

        if !sender.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let ledger = load_ledger(program_id, ledger_ai)?;
        let vault_bump = [ledger.vault_bump];
        check_vault(
            program_id,
            ledger_ai,
            vault_ai,
            &[VAULT_SEED, ledger_ai.key.as_ref(), &vault_bump],
        )?;

        invoke(
            &system_instruction::transfer(sender.key, vault_ai.key, amount),
            &[sender.clone(), vault_ai.clone(), system_program.clone()],
        )?;

        ProgramLog.emit(LedgerEvent::Received {
            sender: *sender.key,
            amount,
            balance: vault_ai.lamports(),
        });
        Ok(())
    }
}

fn load<T: ProgramAccount>(program_id: &Pubkey, ai: &AccountInfo) -> Result<T, ProgramError> {
    if ai.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }
    let value = T::unpack_account(&ai.data.borrow())?;
    Ok(value)
}

/// Loads a ledger and checks that `ai` is the PDA recorded in it.
fn load_ledger(program_id: &Pubkey, ai: &AccountInfo) -> Result<LedgerAccount, ProgramError> {
    let ledger: LedgerAccount = load(program_id, ai)?;
    let pda = Pubkey::create_program_address(
        &[LEDGER_SEED, ledger.authority.as_ref(), &[ledger.bump]],
        program_id,
    )?;
    if pda != *ai.key {
        msg!("Ledger {} is not the PDA of authority {}", ai.key, ledger.authority);
        return Err(ProgramError::InvalidSeeds);
    }
    Ok(ledger)
}

fn store<T: ProgramAccount>(value: &T, ai: &AccountInfo) -> ProgramResult {
    let data = value.pack_account()?;
    let mut dst = ai.try_borrow_mut_data()?;
    if dst.len() != data.len() {
        return Err(ProgramError::InvalidAccountData);
    }
    dst.copy_from_slice(&data);
    Ok(())
}

/// Shared guard of approve / revoke / execute: signer, approver membership,
/// index in range, action account matches the index, not yet executed.
fn load_pending(
    program_id: &Pubkey,
    caller: &AccountInfo,
    ledger_ai: &AccountInfo,
    action_ai: &AccountInfo,
    index: u64,
) -> Result<(LedgerAccount, usize, Action), ProgramError> {
    if !caller.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let ledger = load_ledger(program_id, ledger_ai)?;
    let slot = ledger.quorum.authorize(caller.key)?;
    if index >= ledger.action_count {
        return Err(LedgerError::NotFound.into());
    }

    let (pda, _) = Pubkey::find_program_address(
        &[ACTION_SEED, ledger_ai.key.as_ref(), &index.to_le_bytes()],
        program_id,
    );
    if pda != *action_ai.key {
        return Err(ProgramError::InvalidSeeds);
    }

    let action: Action = load(program_id, action_ai)?;
    action.ensure_pending()?;
    Ok((ledger, slot, action))
}

fn check_vault(
    program_id: &Pubkey,
    ledger_ai: &AccountInfo,
    vault_ai: &AccountInfo,
    seeds: &[&[u8]],
) -> ProgramResult {
    let vault = Pubkey::create_program_address(seeds, program_id)?;
    if vault != *vault_ai.key {
        msg!("Vault {} does not belong to ledger {}", vault_ai.key, ledger_ai.key);
        return Err(ProgramError::InvalidSeeds);
    }
    Ok(())
}
