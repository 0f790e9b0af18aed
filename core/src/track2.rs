//! Track 2 equivalent data: primary account number and expiry date.
//!
//! The layout is nibble-packed: sixteen PAN digits, a `D` separator, then `YYMM`. Past the
//! PAN every digit straddles an octet boundary.

use std::fmt::{Display, Formatter};

use crate::tlv;

const PAN_LEN: usize = 8;

/// Octets needed to reach the last month digit.
const MIN_LEN: usize = PAN_LEN + 3;

/// Primary account number as BCD octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Pan([u8; PAN_LEN]);

impl Display for Pan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let digits: Vec<String> = self.0.iter().map(|o| format!("{:02X}", o)).collect();
        f.write_str(&digits.join(" "))
    }
}

/// Expiry date as BCD year and month within the 21st century.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Expiry {
    pub year: u8,
    pub month: u8,
}

impl Display for Expiry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}/20{:02X}", self.month, self.year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Track2 {
    pub pan: Pan,
    pub expiry: Expiry,
}

impl Track2 {
    pub fn decode(raw: &[u8]) -> tlv::Result<Self> {
        if raw.len() < MIN_LEN {
            return Err(tlv::Error::Track2Length(raw.len()));
        }

        let mut pan = [0; PAN_LEN];
        pan.copy_from_slice(&raw[..PAN_LEN]);

        // D Y | Y M | M x
        let year = raw[PAN_LEN] << 4 | raw[PAN_LEN + 1] >> 4;
        let month = raw[PAN_LEN + 1] << 4 | raw[PAN_LEN + 2] >> 4;

        Ok(Self {
            pan: Pan(pan),
            expiry: Expiry { year, month },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let raw = [
            0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0xD1, 0x50, 0x62, 0x01, 0x00, 0x0F,
        ];

        let track2 = Track2::decode(&raw).unwrap();

        assert_eq!("12 34 56 78 90 12 34 56", track2.pan.to_string());
        assert_eq!("06/2015", track2.expiry.to_string());
        assert_eq!(Expiry { year: 0x15, month: 0x06 }, track2.expiry);
    }

    #[test]
    fn test_decode_too_short() {
        let raw = [0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0xD1, 0x50];

        assert_eq!(Err(tlv::Error::Track2Length(10)), Track2::decode(&raw));
    }
}
