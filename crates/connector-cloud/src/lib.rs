//! Cloud Client: reqwest-based access to the cloud print REST API with
//! transparent OAuth refresh and structured, retryable errors.

pub mod client;
pub mod error;
pub mod token;

pub use client::{CloudClient, CloudJob, CloudPrinterSummary, ListResult, ShareScope};
pub use error::CloudApiError;
pub use token::OAuthConfig;
