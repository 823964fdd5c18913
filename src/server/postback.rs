//! Partner postback deserialization.
//!
//! Parsing happens in two stages:
//! 1. Serde deserializes the wire payload (JSON body or query string) into a
//!    flat struct of strings.
//! 2. Conversion into the strongly-typed [`ConversionEvent`] validates the
//!    required fields and parses the amount to a decimal.
//!
//! Partners that only support callback URLs send the query-string binding,
//! which also accepts their field aliases (`payout`, `campaign_id`,
//! `lead_id`).

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::ConversionEvent;
use crate::ledger::LedgerError;

const DEFAULT_CURRENCY: &str = "USD";

/// Flat representation of the JSON postback body. Everything is a string on
/// the wire; `amount` in particular must survive partners that send
/// arbitrary-precision values.
#[derive(Debug, Clone, Deserialize)]
pub struct PostbackBody {
    pub subid: String,
    pub amount: String,
    pub offer_id: String,
    pub currency: Option<String>,
    pub transaction_id: Option<String>,
    pub ip: Option<String>,
    pub status: Option<String>,
}

/// Query-string binding of the same payload, with partner aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostbackQuery {
    pub subid: Option<String>,
    pub amount: Option<String>,
    /// Alias for `amount` used by CPA networks.
    pub payout: Option<String>,
    pub offer_id: Option<String>,
    /// Alias for `offer_id`.
    pub campaign_id: Option<String>,
    pub transaction_id: Option<String>,
    /// Doubles as `transaction_id` for networks that only send a lead id.
    pub lead_id: Option<String>,
    pub currency: Option<String>,
    pub ip: Option<String>,
    pub status: Option<String>,
    /// Shared secret, checked against the configured postback secret.
    pub password: Option<String>,
}

fn parse_amount(raw: &str) -> Result<Decimal, LedgerError> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| LedgerError::InvalidAmount(raw.to_owned()))
}

fn required(value: Option<String>, field: &str) -> Result<String, LedgerError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| LedgerError::InvalidPayload(format!("missing {field}")))
}

impl TryFrom<PostbackBody> for ConversionEvent {
    type Error = LedgerError;

    fn try_from(body: PostbackBody) -> Result<Self, Self::Error> {
        let subid = required(Some(body.subid), "subid")?;
        let offer_id = required(Some(body.offer_id), "offer_id")?;
        let amount = parse_amount(&body.amount)?;
        Ok(ConversionEvent {
            user_id: subid.into(),
            amount,
            offer_id,
            currency: body.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()),
            transaction_id: body.transaction_id.map(Into::into),
            source_ip: body.ip,
            partner_status: body.status,
        })
    }
}

impl TryFrom<PostbackQuery> for ConversionEvent {
    type Error = LedgerError;

    fn try_from(query: PostbackQuery) -> Result<Self, Self::Error> {
        let subid = required(query.subid, "subid")?;
        let offer_id = required(query.offer_id.or(query.campaign_id), "offer_id")?;
        let raw_amount = required(query.amount.or(query.payout), "amount")?;
        let amount = parse_amount(&raw_amount)?;
        let transaction_id = query
            .transaction_id
            .or(query.lead_id)
            .filter(|id| !id.trim().is_empty());
        Ok(ConversionEvent {
            user_id: subid.into(),
            amount,
            offer_id,
            currency: query
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()),
            transaction_id: transaction_id.map(Into::into),
            source_ip: query.ip,
            partner_status: query.status,
        })
    }
}
