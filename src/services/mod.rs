pub mod donation;
pub mod export;
pub mod signature;

pub use donation::{
    DonationPage, DonationService, StartDonationRequest, StartDonationResponse,
    VerificationOutcome, VerificationRequest, EXPORT_MAX_ROWS,
};
pub use signature::SigningSecret;
