//! Transaction log ("paylog") decoding.
//!
//! Log records are stored without any tag: the card describes their layout once in the log
//! format, a Data Object List whose entries give the tag and length of each field. Every
//! record is cut according to that list.

use std::fmt::{Display, Formatter};

use crate::tables::Tables;
use crate::tlv::{self, tags, Dol, Reader, Tag};

/// Number of leading amount octets that are dropped while they are zero.
const AMOUNT_INTEGER_LEN: usize = 4;

/// Writes the octets in upper-case hex, with a separator between them.
fn write_hex(f: &mut Formatter<'_>, octets: &[u8], separator: &str) -> std::fmt::Result {
    for (i, octet) in octets.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{:02X}", octet)?;
    }

    Ok(())
}

/// Kind of a logged transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TransactionType {
    Payment,
    Withdrawal,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransactionType::Payment => "Payment",
            TransactionType::Withdrawal => "Withdrawal",
        })
    }
}

/// Value of a log field, typed after the tag the log format gave it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    /// BCD `YY MM DD`.
    Date(Vec<u8>),
    Type(TransactionType),
    /// BCD `HH MM SS`.
    Time(Vec<u8>),
    /// A numeric country or currency code and its alphabetic form, when known.
    Code {
        raw: Vec<u8>,
        alpha: Option<&'static str>,
    },
    /// BCD amount with two implied decimals in the last octet.
    Amount(Vec<u8>),
    Text(String),
    Hex(Vec<u8>),
}

impl Value {
    fn decode(tag: Tag, raw: &[u8], tables: &Tables) -> Self {
        match tag {
            tags::TRANSACTION_DATE => Value::Date(raw.to_vec()),
            tags::TRANSACTION_TYPE => Value::Type(match raw.first() {
                Some(0) | None => TransactionType::Payment,
                Some(_) => TransactionType::Withdrawal,
            }),
            tags::TRANSACTION_TIME => Value::Time(raw.to_vec()),
            tags::TRANSACTION_CURRENCY_CODE => Value::Code {
                raw: raw.to_vec(),
                alpha: numeric_code(raw).and_then(|code| tables.currency(code)),
            },
            tags::TERMINAL_COUNTRY_CODE => Value::Code {
                raw: raw.to_vec(),
                alpha: numeric_code(raw).and_then(|code| tables.country(code)),
            },
            tags::AMOUNT_AUTHORISED => Value::Amount(raw.to_vec()),
            tags::MERCHANT_NAME => Value::Text(raw.iter().map(|&c| c as char).collect()),
            _ => Value::Hex(raw.to_vec()),
        }
    }
}

fn numeric_code(raw: &[u8]) -> Option<u16> {
    <[u8; 2]>::try_from(raw).ok().map(u16::from_be_bytes)
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Date(raw) => {
                f.write_str("20")?;
                write_hex(f, raw, "/")
            }
            Value::Type(kind) => kind.fmt(f),
            Value::Time(raw) => write_hex(f, raw, ":"),
            Value::Code {
                alpha: Some(alpha), ..
            } => f.write_str(alpha),
            Value::Code { raw, alpha: None } => write_hex(f, raw, ""),
            Value::Amount(raw) => {
                let mut leading = true;
                for (i, octet) in raw.iter().enumerate() {
                    if i < AMOUNT_INTEGER_LEN && leading && *octet == 0 {
                        continue;
                    }
                    leading = false;

                    write!(f, "{:02X}", octet)?;
                    if i == AMOUNT_INTEGER_LEN {
                        f.write_str(".")?;
                    }
                }

                Ok(())
            }
            Value::Text(text) => f.write_str(text),
            Value::Hex(raw) => write_hex(f, raw, ""),
        }
    }
}

/// One field of a log record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LogField {
    pub tag: Tag,
    pub label: Option<&'static str>,
    pub value: Value,
}

impl Display for LogField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.label {
            Some(label) => write!(f, "{}: {}; ", label, self.value),
            None => write!(f, "{}: {}; ", self.tag, self.value),
        }
    }
}

/// One decoded log record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LogEntry {
    pub index: usize,
    pub fields: Vec<LogField>,
}

impl Display for LogEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.index)?;
        self.fields.iter().try_for_each(|field| field.fmt(f))
    }
}

/// Cuts a single record according to the format.
pub fn decode_entry(format: &Dol, index: usize, entry: &[u8], tables: &Tables) -> tlv::Result<LogEntry> {
    let mut reader = Reader::new(entry);
    let mut fields = Vec::with_capacity(format.entries().len());

    for descriptor in format.entries() {
        let raw = reader.read(descriptor.length as usize)?;

        fields.push(LogField {
            tag: descriptor.tag,
            label: tables.log_format_label(descriptor.tag),
            value: Value::decode(descriptor.tag, raw, tables),
        });
    }

    Ok(LogEntry { index, fields })
}

/// Decodes the records with the log format, stopping at the first empty record.
pub fn decode<'a, I>(format: &[u8], entries: I, tables: &Tables) -> tlv::Result<Vec<LogEntry>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let format = Dol::parse(format)?;

    entries
        .into_iter()
        .take_while(|entry| !entry.is_empty())
        .enumerate()
        .map(|(index, entry)| decode_entry(&format, index, entry, tables))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(format: &[u8], entry: &[u8]) -> String {
        decode(format, [entry], Tables::standard()).unwrap()[0]
            .fields
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_type() {
        assert_eq!("Type: Withdrawal; ", render(&[0x9C, 0x01], &[0x01]));
        assert_eq!("Type: Payment; ", render(&[0x9C, 0x01], &[0x00]));
    }

    #[test]
    fn test_currency() {
        assert_eq!("Currency: EUR; ", render(&[0x5F, 0x2A, 0x02], &[0x09, 0x78]));
        assert_eq!("Currency: 0999; ", render(&[0x5F, 0x2A, 0x02], &[0x09, 0x99]));
    }

    #[test]
    fn test_country() {
        assert_eq!("Country: FRA; ", render(&[0x9F, 0x1A, 0x02], &[0x02, 0x50]));
    }

    #[test]
    fn test_date_and_time() {
        assert_eq!("Date: 2015/06/23; ", render(&[0x9A, 0x03], &[0x15, 0x06, 0x23]));
        assert_eq!("Time: 12:34:56; ", render(&[0x9F, 0x21, 0x03], &[0x12, 0x34, 0x56]));
    }

    #[test]
    fn test_amount() {
        let format = [0x9F, 0x02, 0x06];

        assert_eq!(
            "Amount: 12.34; ",
            render(&format, &[0x00, 0x00, 0x00, 0x00, 0x12, 0x34])
        );
        assert_eq!(
            "Amount: 0150.00; ",
            render(&format, &[0x00, 0x00, 0x00, 0x01, 0x50, 0x00])
        );
    }

    #[test]
    fn test_merchant_and_unknown_tag() {
        let format = [0x9F, 0x4E, 0x04, 0xDF, 0x01, 0x9F, 0x36, 0x02];
        let entry = [b'S', b'H', b'O', b'P', 0x0A, 0x00, 0x2A];

        assert_eq!("Merchant: SHOP; DF: 0A; Counter: 002A; ", render(&format, &entry));
    }

    #[test]
    fn test_entries_render_with_index() {
        let format = [0x9C, 0x01, 0x9F, 0x27, 0x01];
        let entries: [&[u8]; 4] = [&[0x00, 0x40], &[0x01, 0x80], &[], &[0x00, 0x40]];

        let log = decode(&format, entries, Tables::standard()).unwrap();

        assert_eq!(2, log.len());
        assert_eq!("0: Type: Payment; Crypto info: 40; ", log[0].to_string());
        assert_eq!("1: Type: Withdrawal; Crypto info: 80; ", log[1].to_string());
    }

    #[test]
    fn test_short_entry() {
        let result = decode(&[0x9F, 0x02, 0x06], [&[0x00, 0x00][..]], Tables::standard());

        assert!(matches!(result, Err(tlv::Error::Truncated { .. })));
    }
}
