//! Everything read from one card during a session.

use crate::ap::directory::Application;
use crate::tlv::{self, Field, Scanner};

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Most log records kept per card.
pub const MAX_LOG_ENTRIES: usize = 30;

/// Highest value a short file identifier can take.
const MAX_SFI: u8 = 30;

/// Cardholder name stored by cards that do not personalise it.
const NAME_PLACEHOLDER_MAX_LEN: usize = 2;

/// Fields read from the card. Raw values are kept as read, to be decoded on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CardInfo {
    pub application: Option<Application>,
    pub language_preference: String,
    pub cardholder_name: String,
    pub pdol: Vec<u8>,
    pub track1_discretionary_data: Vec<u8>,
    pub track2_equivalent_data: Vec<u8>,
    pub log_sfi: u8,
    pub log_count: u8,
    pub log_format: Vec<u8>,
    pub log_entries: Vec<Vec<u8>>,
}

impl CardInfo {
    pub fn new() -> Self {
        Default::default()
    }

    /// Decodes the response to selecting the application: language preference, PDOL
    /// and the location of the transaction log.
    pub fn extract_app_response(&mut self, app: &Application, response: &[u8]) -> tlv::Result<()> {
        self.application = Some(app.clone());

        for field in Scanner::new(response, tlv::SELECTION) {
            match field? {
                Field::LanguagePreference(value) => {
                    self.language_preference = String::from_utf8_lossy(value).to_string()
                }
                Field::Pdol(value) => self.pdol = value.to_vec(),
                Field::IssuerDiscretionaryData(value) => self.extract_log_location(value)?,
                _ignored => {
                    debug!("Ignoring {:?} in the selection response", _ignored);
                }
            }
        }

        Ok(())
    }

    fn extract_log_location(&mut self, template: &[u8]) -> tlv::Result<()> {
        for field in Scanner::new(template, tlv::ISSUER_DISCRETIONARY) {
            if let Field::LogEntry { sfi, count } = field? {
                if sfi == 0 || sfi > MAX_SFI {
                    return Err(tlv::Error::LogSfi(sfi));
                }

                if count as usize > MAX_LOG_ENTRIES {
                    warn!(
                        "The card declares {} log records, only {} are read",
                        count, MAX_LOG_ENTRIES
                    );
                }

                self.log_sfi = sfi;
                self.log_count = count.min(MAX_LOG_ENTRIES as u8);
            }
        }

        Ok(())
    }

    /// Decodes a record read from a file: track data and cardholder name.
    /// Track data is kept from the first record carrying it.
    pub fn extract_record(&mut self, record: &[u8]) -> tlv::Result<()> {
        for field in Scanner::new(record, tlv::RECORD) {
            match field? {
                Field::Track2EquivalentData(value) => {
                    if self.track2_equivalent_data.is_empty() {
                        self.track2_equivalent_data = value.to_vec();
                    }
                }
                Field::CardholderName(value) => {
                    if value.len() > NAME_PLACEHOLDER_MAX_LEN {
                        self.cardholder_name = String::from_utf8_lossy(value).to_string();
                    }
                }
                Field::Track1DiscretionaryData(value) => {
                    if self.track1_discretionary_data.is_empty() {
                        self.track1_discretionary_data = value.to_vec();
                    }
                }
                _ignored => {
                    debug!("Ignoring {:?} in a record", _ignored);
                }
            }
        }

        Ok(())
    }

    /// Log records read so far, up to the first empty one.
    pub fn log_records(&self) -> impl Iterator<Item = &[u8]> {
        self.log_entries
            .iter()
            .map(Vec::as_slice)
            .take_while(|entry| !entry.is_empty())
    }
}
