//! TLV support for EMV responses.
//!
//! EMV data is only semi-structured on the cards this crate targets, so responses are
//! scanned rather than parsed against a grammar: known tags are picked out of the buffer,
//! templates are entered, and whatever does not fit is skipped one octet at a time.
//! Every length-prefixed read is bounds-checked and reports [`Error`] instead of reading
//! past the buffer.

use std::fmt::{Display, Formatter};

#[cfg(feature = "tracing")]
use tracing::trace;

/// Low bits of a leading octet announcing a two-byte BER tag.
const TWO_BYTE_TAG_MASK: u8 = 0x1F;

/// Bit of a leading octet marking a template.
const CONSTRUCTED_FLAG: u8 = 0x20;

/// Values of the fields this crate decodes use short-form lengths only.
const LONG_LENGTH_FLAG: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{wanted} octet(s) requested at offset {offset}, only {available} left")]
    Truncated {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    #[error("Long-form length {0:#04X} is not supported")]
    LongLength(u8),

    #[error("Application identifier must be 7 octets, got {0}")]
    AidLength(usize),

    #[error("Application template without an identifier")]
    MissingAid,

    #[error("Log entry location must be 2 octets, got {0}")]
    LogEntryLength(usize),

    #[error("Log SFI {0} is out of range")]
    LogSfi(u8),

    #[error("No terminal value is known for PDOL tag {0}")]
    UnknownPdolTag(Tag),

    #[error("Terminal value for {tag} is {actual} octet(s), the card asked for {declared}")]
    PdolLength {
        tag: Tag,
        declared: usize,
        actual: usize,
    },

    #[error("PDOL response of {0} octets does not fit a short command")]
    PdolTooLong(usize),

    #[error("Track 2 equivalent data is {0} octets, at least 11 are needed")]
    Track2Length(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A one- or two-byte EMV tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Tag(pub u16);

impl Tag {
    /// Whether the octet starts a two-byte tag.
    pub fn is_two_byte_lead(octet: u8) -> bool {
        octet & TWO_BYTE_TAG_MASK == TWO_BYTE_TAG_MASK
    }

    /// Whether the octet starts a two-byte tag inside a Data Object List, where only the
    /// EMV tag classes `5F`, `9F` and `BF` take a second octet.
    pub fn is_dol_two_byte_lead(octet: u8) -> bool {
        matches!(octet, 0x5F | 0x9F | 0xBF)
    }

    /// Whether the tag introduces a template of nested fields.
    pub fn is_constructed(self) -> bool {
        let [first, second] = self.0.to_be_bytes();
        let lead = match self.len() {
            2 => first,
            _ => second,
        };

        lead & CONSTRUCTED_FLAG != 0
    }

    /// Number of octets the tag occupies on the wire.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(self) -> usize {
        match self.0 > 0xFF {
            true => 2,
            _ => 1,
        }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.len() {
            2 => write!(f, "{:04X}", self.0),
            _ => write!(f, "{:02X}", self.0),
        }
    }
}

/// Tags this crate understands.
pub mod tags {
    use super::Tag;

    pub const APPLICATION_TEMPLATE: Tag = Tag(0x61);
    pub const APPLICATION_IDENTIFIER: Tag = Tag(0x4F);
    pub const APPLICATION_LABEL: Tag = Tag(0x50);
    pub const APPLICATION_PRIORITY_INDICATOR: Tag = Tag(0x87);
    pub const TRACK_2_EQUIVALENT_DATA: Tag = Tag(0x57);
    pub const CARDHOLDER_NAME: Tag = Tag(0x5F20);
    pub const TRACK_1_DISCRETIONARY_DATA: Tag = Tag(0x9F1F);
    pub const LANGUAGE_PREFERENCE: Tag = Tag(0x5F2D);
    pub const PDOL: Tag = Tag(0x9F38);
    pub const FCI_ISSUER_DISCRETIONARY_DATA: Tag = Tag(0xBF0C);
    pub const LOG_ENTRY: Tag = Tag(0x9F4D);
    pub const LOG_FORMAT: Tag = Tag(0x9F4F);
    pub const COMMAND_TEMPLATE: Tag = Tag(0x83);

    pub const TRANSACTION_DATE: Tag = Tag(0x9A);
    pub const TRANSACTION_TYPE: Tag = Tag(0x9C);
    pub const TRANSACTION_TIME: Tag = Tag(0x9F21);
    pub const TRANSACTION_CURRENCY_CODE: Tag = Tag(0x5F2A);
    pub const AMOUNT_AUTHORISED: Tag = Tag(0x9F02);
    pub const MERCHANT_NAME: Tag = Tag(0x9F4E);
    pub const APPLICATION_TRANSACTION_COUNTER: Tag = Tag(0x9F36);
    pub const TERMINAL_COUNTRY_CODE: Tag = Tag(0x9F1A);
    pub const CRYPTOGRAM_INFORMATION_DATA: Tag = Tag(0x9F27);
}

/// Stateful, bounds-checked reader over a response buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from the buffer.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    /// Number of octets not read yet.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads data of specified size without seeking the cursor.
    pub fn peek(&self, length: usize) -> Result<&'a [u8]> {
        match self.remaining() < length {
            true => Err(Error::Truncated {
                offset: self.cursor,
                wanted: length,
                available: self.remaining(),
            }),
            _ => Ok(&self.buffer[self.cursor..self.cursor + length]),
        }
    }

    /// Seeks the cursor without reading data.
    pub fn seek(&mut self, length: usize) -> Result<()> {
        self.peek(length).map(|_| self.cursor += length)
    }

    /// Reads a next octet and seeks the cursor.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<u8> {
        self.read(1).map(|bytes| bytes[0])
    }

    /// Reads data of specified size and seeks the cursor.
    pub fn read(&mut self, length: usize) -> Result<&'a [u8]> {
        let bytes = self.peek(length)?;
        self.cursor += length;

        Ok(bytes)
    }

    /// Reads a single-octet length.
    pub fn read_length(&mut self) -> Result<usize> {
        match self.next()? {
            head if head & LONG_LENGTH_FLAG != 0 => Err(Error::LongLength(head)),
            head => Ok(head as usize),
        }
    }

    /// Reads a length-prefixed value at the current position, seeking the cursor.
    pub fn read_auto(&mut self) -> Result<&'a [u8]> {
        let length = self.read_length()?;

        self.read(length)
    }

    /// Reads a one- or two-byte tag.
    pub fn read_tag(&mut self) -> Result<Tag> {
        let first = self.next()?;

        match Tag::is_two_byte_lead(first) {
            true => Ok(Tag(u16::from_be_bytes([first, self.next()?]))),
            _ => Ok(Tag(first as u16)),
        }
    }

    /// Reads a tag of a Data Object List.
    pub fn read_dol_tag(&mut self) -> Result<Tag> {
        let first = self.next()?;

        match Tag::is_dol_two_byte_lead(first) {
            true => Ok(Tag(u16::from_be_bytes([first, self.next()?]))),
            _ => Ok(Tag(first as u16)),
        }
    }

    /// Reads a length of any form, only to skip fields this crate does not decode.
    fn read_extent(&mut self) -> Result<usize> {
        match self.next()? {
            head if head & LONG_LENGTH_FLAG == 0 => Ok(head as usize),
            0x81 => Ok(self.next()? as usize),
            0x82 => Ok(u16::from_be_bytes([self.next()?, self.next()?]) as usize),
            head => Err(Error::LongLength(head)),
        }
    }
}

/// The kinds of field the scanner can pick out of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    ApplicationTemplate,
    ApplicationIdentifier,
    ApplicationPriority,
    ApplicationLabel,
    Track2EquivalentData,
    CardholderName,
    Track1DiscretionaryData,
    LanguagePreference,
    Pdol,
    IssuerDiscretionaryData,
    LogEntry,
}

impl Kind {
    pub fn tag(self) -> Tag {
        use Kind::*;

        match self {
            ApplicationTemplate => tags::APPLICATION_TEMPLATE,
            ApplicationIdentifier => tags::APPLICATION_IDENTIFIER,
            ApplicationPriority => tags::APPLICATION_PRIORITY_INDICATOR,
            ApplicationLabel => tags::APPLICATION_LABEL,
            Track2EquivalentData => tags::TRACK_2_EQUIVALENT_DATA,
            CardholderName => tags::CARDHOLDER_NAME,
            Track1DiscretionaryData => tags::TRACK_1_DISCRETIONARY_DATA,
            LanguagePreference => tags::LANGUAGE_PREFERENCE,
            Pdol => tags::PDOL,
            IssuerDiscretionaryData => tags::FCI_ISSUER_DISCRETIONARY_DATA,
            LogEntry => tags::LOG_ENTRY,
        }
    }
}

/// Vocabulary of a PPSE directory response.
pub const DIRECTORY: &[Kind] = &[
    Kind::ApplicationTemplate,
    Kind::ApplicationIdentifier,
    Kind::ApplicationPriority,
    Kind::ApplicationLabel,
];

/// Vocabulary of the response to selecting an application.
pub const SELECTION: &[Kind] = &[
    Kind::LanguagePreference,
    Kind::Pdol,
    Kind::IssuerDiscretionaryData,
];

/// Vocabulary of the issuer discretionary data template.
pub const ISSUER_DISCRETIONARY: &[Kind] = &[Kind::LogEntry];

/// Vocabulary of a record read from a file.
pub const RECORD: &[Kind] = &[
    Kind::Track2EquivalentData,
    Kind::CardholderName,
    Kind::Track1DiscretionaryData,
];

/// A decoded field, borrowing its value from the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    /// Start of an application template; carries no value of its own.
    ApplicationTemplate,
    ApplicationIdentifier(&'a [u8]),
    ApplicationPriority(u8),
    ApplicationLabel(&'a [u8]),
    Track2EquivalentData(&'a [u8]),
    CardholderName(&'a [u8]),
    Track1DiscretionaryData(&'a [u8]),
    LanguagePreference(&'a [u8]),
    Pdol(&'a [u8]),
    IssuerDiscretionaryData(&'a [u8]),
    LogEntry { sfi: u8, count: u8 },
}

impl<'a> Field<'a> {
    /// Decodes the value of a field whose tag has just been consumed.
    fn decode(kind: Kind, reader: &mut Reader<'a>) -> Result<Self> {
        use Kind::*;

        Ok(match kind {
            ApplicationTemplate => {
                // The template runs until the next one, whatever its length says.
                reader.read_length()?;
                Field::ApplicationTemplate
            }
            ApplicationPriority => {
                // The length octet is always 1.
                reader.seek(1)?;
                Field::ApplicationPriority(reader.next()?)
            }
            ApplicationIdentifier => Field::ApplicationIdentifier(reader.read_auto()?),
            ApplicationLabel => Field::ApplicationLabel(reader.read_auto()?),
            Track2EquivalentData => Field::Track2EquivalentData(reader.read_auto()?),
            CardholderName => Field::CardholderName(reader.read_auto()?),
            Track1DiscretionaryData => Field::Track1DiscretionaryData(reader.read_auto()?),
            LanguagePreference => Field::LanguagePreference(reader.read_auto()?),
            Pdol => Field::Pdol(reader.read_auto()?),
            IssuerDiscretionaryData => Field::IssuerDiscretionaryData(reader.read_auto()?),
            LogEntry => match reader.read_auto()? {
                &[sfi, count] => Field::LogEntry { sfi, count },
                value => return Err(Error::LogEntryLength(value.len())),
            },
        })
    }
}

/// Picks the fields of a vocabulary out of a buffer, in order of appearance.
///
/// Templates are entered rather than skipped, so fields nested at any depth are found.
/// Other fields are skipped whole; when their tag or length does not fit the buffer the
/// scanner skips a single octet and carries on. A field of the vocabulary that does not
/// fit is an error, and the scanner stops after yielding it.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    reader: Reader<'a>,
    vocabulary: &'static [Kind],
    failed: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(buffer: &'a [u8], vocabulary: &'static [Kind]) -> Self {
        Self {
            reader: Reader::new(buffer),
            vocabulary,
            failed: false,
        }
    }

    fn recognise(&self, tag: Tag) -> Option<Kind> {
        self.vocabulary
            .iter()
            .copied()
            .find(|kind| kind.tag() == tag)
    }

    /// Moves past a field outside the vocabulary, entering it if it is a template.
    fn skip(&mut self, tag: Tag) -> Result<()> {
        let length = self.reader.read_extent()?;

        match tag.is_constructed() {
            true => Ok(()),
            _ => self.reader.seek(length),
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Field<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.failed && !self.reader.is_empty() {
            let start = self.reader.cursor;
            let tag = self.reader.read_tag();

            if let Some(kind) = tag.as_ref().ok().and_then(|tag| self.recognise(*tag)) {
                let field = Field::decode(kind, &mut self.reader);
                self.failed = field.is_err();

                return Some(field);
            }

            if let Err(_e) = tag.and_then(|tag| self.skip(tag)) {
                trace!("Skipping octet {:02X} at {}: {}", self.reader.buffer[start], start, _e);
                self.reader.cursor = start + 1;
            }
        }

        None
    }
}

/// One entry of a Data Object List: a tag and the length of the value it asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DolEntry {
    pub tag: Tag,
    pub length: u8,
}

/// A Data Object List, as found in the PDOL and the log format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Dol {
    entries: Vec<DolEntry>,
}

impl Dol {
    /// Parses (tag, length) pairs until the end of the buffer.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(buffer);
        let mut entries = Vec::new();

        while !reader.is_empty() {
            let tag = reader.read_dol_tag()?;
            let length = reader.next()?;

            entries.push(DolEntry { tag, length });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[DolEntry] {
        &self.entries
    }

    /// Sum of the lengths of every entry.
    pub fn response_len(&self) -> usize {
        self.entries.iter().map(|e| e.length as usize).sum()
    }
}
