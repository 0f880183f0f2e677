//! Domain layer.
//! Framework-agnostic types for the donation lifecycle.

pub mod amount;
pub mod audit;
pub mod donation;
pub mod receipt;

pub use amount::{AmountError, NumericAmount};
pub use audit::{AuditAction, AuditEvent, AuditOutcome};
pub use donation::{
    Donation, DonationDetail, DonationFilters, DonationStatus, DonationType, PaymentUpdate,
};
pub use receipt::Receipt;
