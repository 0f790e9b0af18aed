//! Processing Options Data Object List: the terminal values a card asks for before a
//! transaction starts.

use crate::nfc::{command, Command};
use crate::tables::Tables;
use crate::tlv::{self, tags};

pub use crate::tlv::{Dol, DolEntry};

/// Octets the command template adds around the values: its tag and its length.
const TEMPLATE_OVERHEAD: usize = 2;

/// Builds the GET PROCESSING OPTIONS command answering the PDOL with the terminal values
/// of the tables, in the order the card listed them.
pub fn build_command(pdol: &Dol, tables: &Tables) -> tlv::Result<Command> {
    let response_len = pdol.response_len();
    if response_len + TEMPLATE_OVERHEAD > u8::MAX as usize {
        return Err(tlv::Error::PdolTooLong(response_len));
    }

    let mut template = Vec::with_capacity(response_len + TEMPLATE_OVERHEAD);
    template.push(tags::COMMAND_TEMPLATE.0 as u8);
    template.push(response_len as u8);

    for entry in pdol.entries() {
        let value = tables
            .pdol_value(entry.tag)
            .ok_or(tlv::Error::UnknownPdolTag(entry.tag))?;

        if value.len() != entry.length as usize {
            return Err(tlv::Error::PdolLength {
                tag: entry.tag,
                declared: entry.length as usize,
                actual: value.len(),
            });
        }

        template.extend_from_slice(value);
    }

    Ok(command::get_processing_options(template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::Tag;

    #[test]
    fn test_build_command_amount() {
        let pdol = Dol::parse(&[0x9F, 0x02, 0x06]).unwrap();
        let command = build_command(&pdol, Tables::standard()).unwrap();

        assert_eq!(6, pdol.response_len());
        assert_eq!(
            vec![
                0x80, 0xA8, 0x00, 0x00, // header
                0x08, // Lc
                0x83, 0x06, // command template
                0x00, 0x00, 0x10, 0x00, 0x00, 0x00, // amount, authorised
                0x00, // Le
            ],
            Vec::from(command),
        );
    }

    #[test]
    fn test_build_command_keeps_card_order() {
        let pdol = Dol::parse(&[0x9F, 0x37, 0x04, 0x9C, 0x01, 0x5F, 0x2A, 0x02]).unwrap();
        let command = build_command(&pdol, Tables::standard()).unwrap();

        assert_eq!(
            vec![
                0x80, 0xA8, 0x00, 0x00, 0x09, 0x83, 0x07, //
                0x82, 0x3D, 0xDE, 0x7A, // unpredictable number
                0x00, // transaction type
                0x01, 0x24, // currency
                0x00,
            ],
            Vec::from(command),
        );
    }

    #[test]
    fn test_build_command_empty_pdol() {
        let command = build_command(&Dol::default(), Tables::standard()).unwrap();

        assert_eq!(
            vec![0x80, 0xA8, 0x00, 0x00, 0x02, 0x83, 0x00, 0x00],
            Vec::from(command),
        );
    }

    #[test]
    fn test_build_command_unknown_tag() {
        let pdol = Dol::parse(&[0x9F, 0x7A, 0x01]).unwrap();

        assert_eq!(
            Err(tlv::Error::UnknownPdolTag(Tag(0x9F7A))),
            build_command(&pdol, Tables::standard()).map(Vec::<u8>::from),
        );
    }

    #[test]
    fn test_build_command_proprietary_single_byte_tag() {
        let pdol = Dol::parse(&[0xDF, 0x02, 0x9F, 0x02, 0x06]).unwrap();

        assert_eq!(
            Err(tlv::Error::UnknownPdolTag(Tag(0xDF))),
            build_command(&pdol, Tables::standard()).map(Vec::<u8>::from),
        );
    }

    #[test]
    fn test_build_command_length_mismatch() {
        let pdol = Dol::parse(&[0x9F, 0x02, 0x04]).unwrap();

        assert_eq!(
            Err(tlv::Error::PdolLength {
                tag: Tag(0x9F02),
                declared: 4,
                actual: 6,
            }),
            build_command(&pdol, Tables::standard()).map(Vec::<u8>::from),
        );
    }

    #[test]
    fn test_build_command_too_long() {
        let pdol = Dol::parse(&[0x9F, 0x02, 0x7F, 0x9F, 0x03, 0x7F]).unwrap();

        assert_eq!(
            Err(tlv::Error::PdolTooLong(254)),
            build_command(&pdol, Tables::standard()).map(Vec::<u8>::from),
        );
    }
}
