//! Lookup tables shared by the decoders.
//!
//! The tables are built once and only ever read afterwards. [`Tables::standard`] returns a
//! process-wide instance; a custom instance can be assembled with
//! [`Tables::with_pdol_value`] before it is handed to the decoders.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::tlv::{tags, Tag};

static STANDARD: Lazy<Tables> = Lazy::new(Tables::new);

/// Labels of the fields a log format may describe.
const LOG_FORMAT_TAGS: [(Tag, &str); 9] = [
    (tags::TRANSACTION_DATE, "Date"),
    (tags::TRANSACTION_TYPE, "Type"),
    (tags::TRANSACTION_TIME, "Time"),
    (tags::TERMINAL_COUNTRY_CODE, "Country"),
    (tags::CRYPTOGRAM_INFORMATION_DATA, "Crypto info"),
    (tags::TRANSACTION_CURRENCY_CODE, "Currency"),
    (tags::AMOUNT_AUTHORISED, "Amount"),
    (tags::MERCHANT_NAME, "Merchant"),
    (tags::APPLICATION_TRANSACTION_COUNTER, "Counter"),
];

/// ISO 3166-1 numeric country codes, as stored on the card.
const COUNTRY_CODES: [(u16, &str); 5] = [
    (0x0756, "CHE"),
    (0x0250, "FRA"),
    (0x0826, "GBR"),
    (0x0124, "CAN"),
    (0x0840, "USA"),
];

/// ISO 4217 numeric currency codes, as stored on the card.
const CURRENCY_CODES: [(u16, &str); 5] = [
    (0x0756, "CHF"),
    (0x0978, "EUR"),
    (0x0826, "GBP"),
    (0x0124, "CAD"),
    (0x0840, "USD"),
];

/// Terminal-side values echoed back to the card in GET PROCESSING OPTIONS.
/// Sending them makes the card record a payment in its log.
const PDOL_VALUES: [(Tag, &[u8]); 12] = [
    // Terminal Transaction Information
    (Tag(0x9F59), &[0xC8, 0x80, 0x00]),
    // Terminal Transaction Type: 0 = payment, 1 = withdrawal
    (Tag(0x9F5A), &[0x00]),
    // Merchant Type Indicator
    (Tag(0x9F58), &[0x01]),
    // Terminal Transaction Qualifiers
    (Tag(0x9F66), &[0xB6, 0x20, 0xC0, 0x00]),
    (tags::AMOUNT_AUTHORISED, &[0x00, 0x00, 0x10, 0x00, 0x00, 0x00]),
    // Amount, Other
    (Tag(0x9F03), &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
    (tags::TERMINAL_COUNTRY_CODE, &[0x01, 0x24]),
    (tags::TRANSACTION_CURRENCY_CODE, &[0x01, 0x24]),
    // Terminal Verification Results
    (Tag(0x95), &[0x00, 0x00, 0x00, 0x00, 0x00]),
    (tags::TRANSACTION_DATE, &[0x15, 0x01, 0x01]),
    (tags::TRANSACTION_TYPE, &[0x00]),
    // Unpredictable Number
    (Tag(0x9F37), &[0x82, 0x3D, 0xDE, 0x7A]),
];

/// Immutable lookup tables for log labels, country and currency codes and PDOL values.
#[derive(Debug, Clone)]
pub struct Tables {
    log_format_tags: HashMap<Tag, &'static str>,
    country_codes: HashMap<u16, &'static str>,
    currency_codes: HashMap<u16, &'static str>,
    pdol_values: HashMap<Tag, Vec<u8>>,
}

impl Tables {
    /// Builds the standard tables.
    pub fn new() -> Self {
        Self {
            log_format_tags: HashMap::from(LOG_FORMAT_TAGS),
            country_codes: HashMap::from(COUNTRY_CODES),
            currency_codes: HashMap::from(CURRENCY_CODES),
            pdol_values: PDOL_VALUES
                .iter()
                .map(|(tag, value)| (*tag, value.to_vec()))
                .collect(),
        }
    }

    /// The process-wide standard tables.
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Replaces or adds the terminal value answered for a PDOL tag.
    pub fn with_pdol_value(mut self, tag: Tag, value: Vec<u8>) -> Self {
        self.pdol_values.insert(tag, value);
        self
    }

    pub fn log_format_label(&self, tag: Tag) -> Option<&'static str> {
        self.log_format_tags.get(&tag).copied()
    }

    pub fn country(&self, code: u16) -> Option<&'static str> {
        self.country_codes.get(&code).copied()
    }

    pub fn currency(&self, code: u16) -> Option<&'static str> {
        self.currency_codes.get(&code).copied()
    }

    pub fn pdol_value(&self, tag: Tag) -> Option<&[u8]> {
        self.pdol_values.get(&tag).map(Vec::as_slice)
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new()
    }
}
