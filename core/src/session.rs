//! A whole card-reading session, from application discovery to the transaction log.

use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use std::rc::Rc;

use crate::ap::directory::{self, Application};
use crate::ap::{DirectoryAp, PaymentAp};
use crate::card::{self, Card};
use crate::info::CardInfo;
use crate::nfc;
use crate::paylog::{self, LogEntry};
use crate::tables::Tables;
use crate::track2::Track2;

#[cfg(feature = "tracing")]
use tracing::{info, warn};

/// What to read from the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Priority of the application to select.
    pub priority: u8,
    /// Short file identifiers scanned for records.
    pub sfis: RangeInclusive<u8>,
    /// Record numbers read in each file.
    pub records: RangeInclusive<u8>,
    /// Whether to send GET PROCESSING OPTIONS. The card logs it as a payment.
    pub processing_options: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            priority: 1,
            sfis: 1..=10,
            records: 1..=16,
            processing_options: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Selection,
    Records,
    ProcessingOptions,
    Track2,
    Log,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Discovery => "Application discovery",
            Stage::Selection => "Application selection",
            Stage::Records => "Record reading",
            Stage::ProcessingOptions => "Processing options",
            Stage::Track2 => "Track 2 decoding",
            Stage::Log => "Log reading",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: card::Error,
}

fn at<E>(stage: Stage) -> impl FnOnce(E) -> StageError
where
    E: Into<card::Error>,
{
    move |e| StageError {
        stage,
        source: e.into(),
    }
}

/// Everything decoded during a session, kept even when a stage failed.
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Report {
    pub applications: Vec<Application>,
    pub info: Option<CardInfo>,
    pub log: Vec<LogEntry>,
    pub track2: Option<Track2>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub failure: Option<StageError>,
}

impl Report {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct Session<'a> {
    options: Options,
    tables: &'a Tables,
}

impl Session<'static> {
    /// Initiates a session with the standard tables.
    pub fn new(options: Options) -> Self {
        Self::with_tables(options, Tables::standard())
    }
}

impl<'a> Session<'a> {
    pub fn with_tables(options: Options, tables: &'a Tables) -> Self {
        Self { options, tables }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Runs every stage in order on the card, stopping at the first failure.
    /// The failure is kept in the report and not logged here.
    pub fn run<T>(&self, card: Rc<Card<T>>) -> Report
    where
        T: nfc::Handler,
    {
        let mut report = Report::default();

        if let Err(failure) = self.run_stages(card, &mut report) {
            report.failure = Some(failure);
        }

        report
    }

    fn run_stages<T>(&self, card: Rc<Card<T>>, report: &mut Report) -> Result<(), StageError>
    where
        T: nfc::Handler,
    {
        let directory = DirectoryAp::open(card).map_err(at(Stage::Discovery))?;
        let card = directory.card();
        report.applications = directory.into_applications();

        if report.applications.is_empty() {
            info!("No payment application on the card");
            return Ok(());
        }

        let app = directory::find_by_priority(&report.applications, self.options.priority)
            .map_err(at(Stage::Selection))?
            .clone();
        let (ap, fci) = PaymentAp::open(card, &app).map_err(at(Stage::Selection))?;

        let info = report.info.insert(CardInfo::new());
        info.extract_app_response(&app, &fci)
            .map_err(at(Stage::Selection))?;

        ap.read_records(info, self.options.sfis.clone(), self.options.records.clone())
            .map_err(at(Stage::Records))?;

        if self.options.processing_options {
            ap.get_processing_options(info, self.tables)
                .map_err(at(Stage::ProcessingOptions))?;
        }

        if !info.track2_equivalent_data.is_empty() {
            report.track2 = Some(
                Track2::decode(&info.track2_equivalent_data).map_err(at(Stage::Track2))?,
            );
        }

        if info.log_sfi == 0 {
            info!("The application does not announce a transaction log");
            return Ok(());
        }

        // Entries read before a failure are decoded all the same.
        let read = ap.read_log(info);
        match paylog::decode(&info.log_format, info.log_records(), self.tables) {
            Ok(log) => report.log = log,
            Err(e) if read.is_ok() => return Err(at(Stage::Log)(e)),
            Err(_e) => {
                warn!("Could not decode the log entries read so far: {}", _e);
            }
        }

        read.map_err(at(Stage::Log))
    }
}
