//! Error types for engine operations.

use thiserror::Error;

use crate::Amount;
use crate::model::{BookingId, BookingStatus, RequestId, TxnId, UserId};

/// Stable machine-readable code attached to every failure on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorCode {
    InvalidTransition,
    InvalidState,
    InvalidPin,
    InsufficientBalance,
    DuplicateRequest,
    AlreadyPaid,
    AlreadyExists,
    OutOfRange,
    Unauthorized,
    NotFound,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidTransition => "InvalidTransition",
            ErrorCode::InvalidState => "InvalidState",
            ErrorCode::InvalidPin => "InvalidPin",
            ErrorCode::InsufficientBalance => "InsufficientBalance",
            ErrorCode::DuplicateRequest => "DuplicateRequest",
            ErrorCode::AlreadyPaid => "AlreadyPaid",
            ErrorCode::AlreadyExists => "AlreadyExists",
            ErrorCode::OutOfRange => "OutOfRange",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::NotFound => "NotFound",
        }
    }
}

/// Top-level error returned by [`Engine`](super::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("wallet operation failed: {0}")]
    Wallet(#[from] WalletError),

    #[error("booking operation failed: {0}")]
    Booking(#[from] BookingError),

    #[error("money request failed: {0}")]
    Request(#[from] RequestError),

    #[error("settlement failed: {0}")]
    Settlement(#[from] SettlementError),

    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Wallet(e) => e.code(),
            EngineError::Booking(e) => e.code(),
            EngineError::Request(e) => e.code(),
            EngineError::Settlement(e) => e.code(),
            EngineError::Ledger(e) => e.code(),
        }
    }
}

/// Error during wallet registration and owner operations.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet already registered for user {0}")]
    AlreadyExists(UserId),

    #[error("no wallet registered for user {0}")]
    NotFound(UserId),

    #[error("pin must be exactly 4 digits")]
    MalformedPin,

    #[error("pin verification failed")]
    InvalidPin,

    #[error("primary account password rejected")]
    Unauthorized,

    #[error("discount {0} is outside 0..=100")]
    DiscountOutOfRange(u8),

    #[error("amount {0} must be positive")]
    NonPositiveAmount(Amount),
}

impl WalletError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WalletError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            WalletError::NotFound(_) => ErrorCode::NotFound,
            WalletError::MalformedPin => ErrorCode::OutOfRange,
            WalletError::InvalidPin => ErrorCode::InvalidPin,
            WalletError::Unauthorized => ErrorCode::Unauthorized,
            WalletError::DiscountOutOfRange(_) => ErrorCode::OutOfRange,
            WalletError::NonPositiveAmount(_) => ErrorCode::OutOfRange,
        }
    }
}

/// Error during booking creation and status updates.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking {0} not found")]
    NotFound(BookingId),

    #[error("booking {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("charge {0} must not be negative")]
    NegativeCharge(Amount),
}

impl BookingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BookingError::NotFound(_) => ErrorCode::NotFound,
            BookingError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            BookingError::NegativeCharge(_) => ErrorCode::OutOfRange,
        }
    }
}

/// Error during money request creation.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    #[error("booking {id} is {status}, payment can only be requested once completed")]
    NotCompleted {
        id: BookingId,
        status: BookingStatus,
    },

    #[error("a pending request already exists for booking {0}")]
    DuplicateRequest(BookingId),

    #[error("amount {0} must be positive")]
    NonPositiveAmount(Amount),
}

impl RequestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RequestError::BookingNotFound(_) => ErrorCode::NotFound,
            RequestError::NotCompleted { .. } => ErrorCode::InvalidState,
            RequestError::DuplicateRequest(_) => ErrorCode::DuplicateRequest,
            RequestError::NonPositiveAmount(_) => ErrorCode::OutOfRange,
        }
    }
}

/// Error during wallet-to-wallet settlement.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("no wallet registered for user {0}")]
    WalletNotFound(UserId),

    #[error("pin verification failed")]
    InvalidPin,

    #[error("cannot transfer to the same wallet")]
    SelfTransfer,

    #[error("amount {0} must be positive")]
    NonPositiveAmount(Amount),

    #[error("insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    #[error("money request {0} not found")]
    RequestNotFound(RequestId),

    #[error("money request {0} is already paid")]
    AlreadyPaid(RequestId),

    #[error("booking {0} not found")]
    BookingNotFound(BookingId),
}

impl SettlementError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SettlementError::WalletNotFound(_) => ErrorCode::NotFound,
            SettlementError::InvalidPin => ErrorCode::InvalidPin,
            SettlementError::SelfTransfer => ErrorCode::OutOfRange,
            SettlementError::NonPositiveAmount(_) => ErrorCode::OutOfRange,
            SettlementError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            SettlementError::RequestNotFound(_) => ErrorCode::NotFound,
            SettlementError::AlreadyPaid(_) => ErrorCode::AlreadyPaid,
            SettlementError::BookingNotFound(_) => ErrorCode::NotFound,
        }
    }
}

/// Error when reading the transaction ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transaction {0} not found")]
    NotFound(TxnId),
}

impl LedgerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::NotFound(_) => ErrorCode::NotFound,
        }
    }
}
