//! Payment AP: the application selected out of the directory, holding the card records and
//! the transaction log.

use std::ops::RangeInclusive;
use std::rc::Rc;

use crate::ap::directory::Application;
use crate::card::{Error, Result};
use crate::info::CardInfo;
use crate::nfc::{self, command};
use crate::tables::Tables;
use crate::tlv::{tags, Dol};
use crate::{pdol, Card};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

pub struct PaymentAp<T>
where
    T: nfc::Handler,
{
    card: Rc<Card<T>>,
}

impl<T> PaymentAp<T>
where
    T: nfc::Handler,
{
    /// Opens the application by selecting its AID.
    /// Returns the AP together with the File Control Information the card answered.
    pub fn open(card: Rc<Card<T>>, app: &Application) -> Result<(Self, Vec<u8>)> {
        let fci = card.execute(
            command::select_by_name(app.aid.as_bytes().to_vec()),
            "SELECT AID",
        )?;

        debug!("Selected {} ({})", app.label, app.aid);

        Ok((Self { card }, fci))
    }

    /// Reads every record of every file in the ranges and extracts the card fields from them.
    /// Records the card does not have are skipped.
    pub fn read_records(
        &self,
        info: &mut CardInfo,
        sfis: RangeInclusive<u8>,
        records: RangeInclusive<u8>,
    ) -> Result<()> {
        for sfi in sfis {
            for record in records.clone() {
                let payload = match self.read_record(record, sfi, "READ RECORD") {
                    Ok(payload) if !payload.is_empty() => payload,
                    Ok(_) => {
                        trace!("SFI {} record {} is empty", sfi, record);
                        continue;
                    }
                    Err(e) if e.is_protocol() => {
                        trace!("SFI {} record {} is not present: {}", sfi, record, e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                info.extract_record(&payload)?;
            }
        }

        Ok(())
    }

    /// Answers the PDOL of the card with the terminal values of the tables.
    ///
    /// The card counts this as a transaction: with the standard values a payment is
    /// inserted in its log.
    pub fn get_processing_options(&self, info: &CardInfo, tables: &Tables) -> Result<Vec<u8>> {
        let dol = Dol::parse(&info.pdol)?;
        let gpo = pdol::build_command(&dol, tables)?;

        match self.card.execute(gpo, "GET PROCESSING OPTIONS") {
            Ok(payload) if !payload.is_empty() => Ok(payload),
            Ok(_) => Err(Error::Rejected("GPO")),
            Err(e) if e.is_protocol() => Err(Error::Rejected("GPO")),
            Err(e) => Err(e),
        }
    }

    /// Reads the log format, then the log records the selection response announced.
    /// Records read before a failure are kept in `info`.
    pub fn read_log(&self, info: &mut CardInfo) -> Result<()> {
        info.log_format = match self.card.execute(
            command::get_data(tags::LOG_FORMAT.0),
            "GET DATA (log format)",
        ) {
            Ok(format) if !format.is_empty() => format,
            Ok(_) => return Err(Error::NotFound("Log format".to_string())),
            Err(e) if e.is_protocol() => return Err(Error::NotFound("Log format".to_string())),
            Err(e) => return Err(e),
        };

        info.log_entries.clear();
        for index in 1..=info.log_count {
            match self.read_record(index, info.log_sfi, "READ RECORD (log)") {
                Ok(entry) if !entry.is_empty() => info.log_entries.push(entry),
                Ok(_) => return Err(Error::NotFound(format!("Log entry {}", index))),
                Err(e) if e.is_protocol() => {
                    return Err(Error::NotFound(format!("Log entry {}", index)))
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    fn read_record(&self, record: u8, sfi: u8, label: &'static str) -> Result<Vec<u8>> {
        self.card.execute(command::read_record(record, sfi), label)
    }
}
