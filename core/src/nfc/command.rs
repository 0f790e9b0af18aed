//! Builders for the EMV commands sent to the card.

use apdu::Command;

const CLA_DEFAULT: u8 = 0x00;
const CLA_PROPRIETARY: u8 = 0x80;

const INS_SELECT: u8 = 0xA4;
const INS_READ_RECORD: u8 = 0xB2;
const INS_GET_DATA: u8 = 0xCA;
const INS_GET_PROCESSING_OPTIONS: u8 = 0xA8;

const SELECT_P1_BY_NAME: u8 = 0x04;
const SELECT_P2_FIRST: u8 = 0x00;

/// P2 low bits of `READ RECORD`: P1 is a record number.
const READ_RECORD_P2_NUMBER: u8 = 0b100;

/// Constructs a `SELECT` command addressing a DF by its name.
pub fn select_by_name(name: Vec<u8>) -> Command {
    Command::new_with_payload_le(
        CLA_DEFAULT,
        INS_SELECT,
        SELECT_P1_BY_NAME,
        SELECT_P2_FIRST,
        0,
        name,
    )
}

/// Constructs a `READ RECORD` command for the record number in the file `sfi`.
pub fn read_record(record: u8, sfi: u8) -> Command {
    Command::new_with_le(
        CLA_DEFAULT,
        INS_READ_RECORD,
        record,
        (sfi << 3) | READ_RECORD_P2_NUMBER,
        0,
    )
}

/// Constructs a `GET DATA` command for a two-byte tag.
pub fn get_data(tag: u16) -> Command {
    let [p1, p2] = tag.to_be_bytes();

    Command::new_with_le(CLA_PROPRIETARY, INS_GET_DATA, p1, p2, 0)
}

/// Constructs a `GET PROCESSING OPTIONS` command carrying the command template.
pub fn get_processing_options(template: Vec<u8>) -> Command {
    Command::new_with_payload_le(
        CLA_PROPRIETARY,
        INS_GET_PROCESSING_OPTIONS,
        0x00,
        0x00,
        0,
        template,
    )
}
