use solana_program::program_error::ProgramError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid instruction")]
    InvalidInstruction,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Action not found")]
    NotFound,

    #[error("Action already executed")]
    AlreadyExecuted,

    #[error("Already approved")]
    AlreadyApproved,

    #[error("Not approved")]
    NotApproved,

    #[error("Not enough approvals")]
    InsufficientApprovals,

    #[error("Execution failed: {0}")]
    ExecutionFailed(ProgramError),

    #[error("Held balance overflow")]
    BalanceOverflow,
}

impl LedgerError {
    /// Stable code reported as `ProgramError::Custom`.
    pub fn code(&self) -> u32 {
        match self {
            LedgerError::InvalidInstruction => 0,
            LedgerError::InvalidConfiguration(_) => 1,
            LedgerError::Unauthorized => 2,
            LedgerError::NotFound => 3,
            LedgerError::AlreadyExecuted => 4,
            LedgerError::AlreadyApproved => 5,
            LedgerError::NotApproved => 6,
            LedgerError::InsufficientApprovals => 7,
            LedgerError::ExecutionFailed(_) => 8,
            LedgerError::BalanceOverflow => 9,
        }
    }
}

impl From<LedgerError> for ProgramError {
    fn from(e: LedgerError) -> Self {
        ProgramError::Custom(e.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_codes_are_distinct() {
        let all = [
            LedgerError::InvalidInstruction,
            LedgerError::InvalidConfiguration("x"),
            LedgerError::Unauthorized,
            LedgerError::NotFound,
            LedgerError::AlreadyExecuted,
            LedgerError::AlreadyApproved,
            LedgerError::NotApproved,
            LedgerError::InsufficientApprovals,
            LedgerError::ExecutionFailed(ProgramError::InvalidArgument),
            LedgerError::BalanceOverflow,
        ];
        let mut codes: Vec<u32> = all.iter().map(LedgerError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn converts_to_custom_program_error() {
        let err: ProgramError = LedgerError::AlreadyApproved.into();
        assert_eq!(err, ProgramError::Custom(5));
    }
}
