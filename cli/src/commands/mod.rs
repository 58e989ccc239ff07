pub mod balance;
pub mod check;
pub mod endpoints;
pub mod limits;
pub mod transfer;
pub mod tx;

use std::str::FromStr;

use anyhow::{Context, Result};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

pub(crate) fn parse_pubkey(value: &str, what: &str) -> Result<Pubkey> {
    value
        .parse()
        .with_context(|| format!("Invalid {} address: {}", what, value))
}

pub(crate) fn parse_signature(value: &str) -> Result<Signature> {
    Signature::from_str(value).with_context(|| format!("Invalid signature: {}", value))
}
