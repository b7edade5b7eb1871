//! Performs the side effect of an approved action.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction},
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
};

pub trait ActionExecutor {
    fn perform(&mut self, target: &Pubkey, value: u64, payload: &[u8]) -> ProgramResult;
}

impl<F> ActionExecutor for F
where
    F: FnMut(&Pubkey, u64, &[u8]) -> ProgramResult,
{
    fn perform(&mut self, target: &Pubkey, value: u64, payload: &[u8]) -> ProgramResult {
        self(target, value, payload)
    }
}

/// Executes actions out of the vault PDA.
///
/// `value` lamports move from the vault to `target` through a signed system
/// transfer. A non-empty payload is then sent as instruction data to program
/// `target`, with the vault (as signer) followed by `accounts` as its account
/// list.
pub struct VaultExecutor<'a, 'info> {
    pub vault: &'a AccountInfo<'info>,
    pub system_program: &'a AccountInfo<'info>,
    pub accounts: &'a [AccountInfo<'info>],
    pub vault_seeds: &'a [&'a [u8]],
}

impl<'a, 'info> VaultExecutor<'a, 'info> {
    fn account(&self, key: &Pubkey) -> Result<&'a AccountInfo<'info>, ProgramError> {
        self.accounts
            .iter()
            .find(|a| a.key == key)
            .ok_or(ProgramError::NotEnoughAccountKeys)
    }
}

impl<'a, 'info> ActionExecutor for VaultExecutor<'a, 'info> {
    fn perform(&mut self, target: &Pubkey, value: u64, payload: &[u8]) -> ProgramResult {
        if value > 0 {
            let recipient = self.account(target)?;
            invoke_signed(
                &system_instruction::transfer(self.vault.key, target, value),
                &[self.vault.clone(), recipient.clone(), self.system_program.clone()],
                &[self.vault_seeds],
            )?;
            msg!("Vault transferred {} lamports to {}", value, target);
        }

        if !payload.is_empty() {
            let program = self.account(target)?;
            let mut metas = vec![AccountMeta::new(*self.vault.key, true)];
            metas.extend(
                self.accounts
                    .iter()
                    .filter(|a| a.key != target && a.key != self.vault.key)
                    .map(|a| AccountMeta {
                        pubkey: *a.key,
                        is_signer: a.is_signer,
                        is_writable: a.is_writable,
                    }),
            );
            let ix = Instruction {
                program_id: *target,
                accounts: metas,
                data: payload.to_vec(),
            };
            let mut infos = Vec::with_capacity(self.accounts.len() + 1);
            infos.push(self.vault.clone());
            infos.extend(self.accounts.iter().cloned());
            infos.push(program.clone());
            invoke_signed(&ix, &infos, &[self.vault_seeds])?;
            msg!("Vault invoked program {} ({} bytes)", target, payload.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_executors() {
        let mut calls = Vec::new();
        let mut exec = |target: &Pubkey, value: u64, payload: &[u8]| -> ProgramResult {
            calls.push((*target, value, payload.to_vec()));
            Ok(())
        };
        let target = Pubkey::new_unique();
        exec.perform(&target, 3, b"hi").unwrap();
        drop(exec);
        assert_eq!(calls, vec![(target, 3, b"hi".to_vec())]);
    }

    #[test]
    fn vault_executor_needs_target_account() {
        let vault_key = Pubkey::new_unique();
        let system_key = solana_program::system_program::id();
        let owner = solana_program::system_program::id();
        let (mut vault_lamports, mut system_lamports) = (10u64, 0u64);
        let (mut vault_data, mut system_data) = ([0u8; 0], [0u8; 0]);
        let vault = AccountInfo::new(
            &vault_key, false, true, &mut vault_lamports, &mut vault_data, &owner, false, 0,
        );
        let system_program = AccountInfo::new(
            &system_key, false, false, &mut system_lamports, &mut system_data, &owner, true, 0,
        );
        let mut exec = VaultExecutor {
            vault: &vault,
            system_program: &system_program,
            accounts: &[],
            vault_seeds: &[&b"vault"[..]],
        };
        assert_eq!(
            exec.perform(&Pubkey::new_unique(), 1, &[]),
            Err(ProgramError::NotEnoughAccountKeys)
        );
        // Nothing to do is a successful no-op.
        assert_eq!(exec.perform(&Pubkey::new_unique(), 0, &[]), Ok(()));
    }
}
