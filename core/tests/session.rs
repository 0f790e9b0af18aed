use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use emvinfo::card;
use emvinfo::nfc::{command, Command, Handler};
use emvinfo::session::Stage;
use emvinfo::{Card, Options, Session};

const AID: [u8; 7] = [0xA0, 0x00, 0x00, 0x00, 0x04, 0x10, 0x10];

#[derive(Debug, thiserror::Error)]
#[error("card removed")]
struct Removed;

/// A card answering from a script: known commands get their response, any other gets
/// `6A 82` (file or application not found).
#[derive(Default)]
struct ScriptedCard {
    replies: HashMap<Vec<u8>, Vec<u8>>,
    sent: RefCell<Vec<Vec<u8>>>,
}

impl ScriptedCard {
    fn reply(mut self, command: Command, payload: &[u8]) -> Self {
        let mut response = payload.to_vec();
        response.extend_from_slice(&[0x90, 0x00]);

        self.replies.insert(Vec::from(command), response);
        self
    }

    fn with_directory(self) -> Self {
        let mut ppse = vec![0x6F, 0x2D, 0x84, 0x0E];
        ppse.extend_from_slice(b"2PAY.SYS.DDF01");
        ppse.extend_from_slice(&[0xA5, 0x1B, 0xBF, 0x0C, 0x18, 0x61, 0x16, 0x4F, 0x07]);
        ppse.extend_from_slice(&AID);
        ppse.extend_from_slice(&[0x50, 0x08]);
        ppse.extend_from_slice(b"CB DEBIT");
        ppse.extend_from_slice(&[0x87, 0x01, 0x01]);

        self.reply(command::select_by_name(b"2PAY.SYS.DDF01".to_vec()), &ppse)
    }

    fn with_application(self) -> Self {
        let fci = [
            0x6F, 0x1E, //
            0x84, 0x07, 0xA0, 0x00, 0x00, 0x00, 0x04, 0x10, 0x10, //
            0xA5, 0x13, //
            0x5F, 0x2D, 0x02, b'f', b'r', //
            0x9F, 0x38, 0x03, 0x9F, 0x02, 0x06, //
            0xBF, 0x0C, 0x05, 0x9F, 0x4D, 0x02, 0x0B, 0x03,
        ];
        let record = [
            0x70, 0x1E, //
            0x57, 0x0D, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0xD2, 0x71, 0x22, 0x01,
            0x0F, //
            0x5F, 0x20, 0x0C, b'D', b'U', b'P', b'O', b'N', b'T', b'/', b'M', b'A', b'R', b'I',
            b'E',
        ];

        self.reply(command::select_by_name(AID.to_vec()), &fci)
            .reply(command::read_record(1, 1), &record)
    }

    fn with_log(self) -> Self {
        let format = [0x9A, 0x03, 0x9C, 0x01, 0x5F, 0x2A, 0x02, 0x9F, 0x02, 0x06];

        self.reply(command::get_data(0x9F4F), &format)
            .reply(
                command::read_record(1, 11),
                &[0x23, 0x04, 0x17, 0x00, 0x09, 0x78, 0x00, 0x00, 0x00, 0x00, 0x42, 0x50],
            )
            .reply(
                command::read_record(2, 11),
                &[0x23, 0x04, 0x18, 0x01, 0x09, 0x78, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00],
            )
    }
}

impl Handler for ScriptedCard {
    type Error = Removed;

    fn handle(&self, command: &[u8]) -> Result<Vec<u8>, Removed> {
        self.sent.borrow_mut().push(command.to_vec());

        Ok(self
            .replies
            .get(command)
            .cloned()
            .unwrap_or_else(|| vec![0x6A, 0x82]))
    }
}

fn sent(card: &Card<ScriptedCard>) -> Vec<Vec<u8>> {
    card.delegate().sent.borrow().clone()
}

#[test]
fn test_full_session_keeps_partial_log() {
    let card = Rc::new(Card::new(Box::new(
        ScriptedCard::default()
            .with_directory()
            .with_application()
            .with_log(),
    )));

    let report = Session::new(Options::default()).run(Rc::clone(&card));

    assert_eq!(1, report.applications.len());
    assert_eq!("CB DEBIT", report.applications[0].label);

    let info = report.info.as_ref().unwrap();
    assert_eq!("fr", info.language_preference);
    assert_eq!("DUPONT/MARIE", info.cardholder_name);
    assert_eq!(11, info.log_sfi);
    assert_eq!(3, info.log_count);
    assert_eq!(2, info.log_entries.len());

    // The card announced three log records but only has two.
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(Stage::Log, failure.stage);
    assert!(matches!(&failure.source, card::Error::NotFound(what) if what == "Log entry 3"));

    // The entries read before the failure are still decoded, and so is track 2.
    let log: Vec<String> = report.log.iter().map(ToString::to_string).collect();
    assert_eq!(
        vec![
            "0: Date: 2023/04/17; Type: Payment; Currency: EUR; Amount: 42.50; ",
            "1: Date: 2023/04/18; Type: Withdrawal; Currency: EUR; Amount: 0100.00; ",
        ],
        log,
    );

    let track2 = report.track2.as_ref().unwrap();
    assert_eq!("12 34 56 78 90 12 34 56", track2.pan.to_string());
    assert_eq!("12/2027", track2.expiry.to_string());

    // No GET PROCESSING OPTIONS without asking for it.
    assert!(sent(&card).iter().all(|command| command[..2] != [0x80, 0xA8]));
}

#[test]
fn test_session_without_log_format_keeps_track2() {
    let card = Rc::new(Card::new(Box::new(
        ScriptedCard::default()
            .with_directory()
            .with_application(),
    )));

    let report = Session::new(Options::default()).run(Rc::clone(&card));

    let failure = report.failure.as_ref().unwrap();
    assert_eq!(Stage::Log, failure.stage);
    assert!(matches!(&failure.source, card::Error::NotFound(what) if what == "Log format"));

    assert!(report.log.is_empty());
    assert_eq!(
        "12 34 56 78 90 12 34 56",
        report.track2.as_ref().unwrap().pan.to_string()
    );
}

#[test]
fn test_full_session() {
    let card = Rc::new(Card::new(Box::new(
        ScriptedCard::default()
            .with_directory()
            .with_application()
            .with_log()
            .reply(
                command::read_record(3, 11),
                &[0x23, 0x04, 0x19, 0x00, 0x08, 0x26, 0x00, 0x00, 0x00, 0x00, 0x05, 0x00],
            ),
    )));

    let options = Options {
        records: 1..=2,
        ..Default::default()
    };
    let report = Session::new(options).run(Rc::clone(&card));

    assert!(report.is_complete(), "{:?}", report.failure);

    let log: Vec<String> = report.log.iter().map(ToString::to_string).collect();
    assert_eq!(
        vec![
            "0: Date: 2023/04/17; Type: Payment; Currency: EUR; Amount: 42.50; ",
            "1: Date: 2023/04/18; Type: Withdrawal; Currency: EUR; Amount: 0100.00; ",
            "2: Date: 2023/04/19; Type: Payment; Currency: GBP; Amount: 05.00; ",
        ],
        log,
    );

    let track2 = report.track2.unwrap();
    assert_eq!("12 34 56 78 90 12 34 56", track2.pan.to_string());
    assert_eq!("12/2027", track2.expiry.to_string());

    // PPSE, AID, 10 files of 2 records, log format, 3 log records
    assert_eq!(2 + 20 + 1 + 3, sent(&card).len());
}

#[test]
fn test_session_with_processing_options() {
    let gpo = [
        0x80, 0xA8, 0x00, 0x00, 0x08, 0x83, 0x06, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00,
    ];
    let card = ScriptedCard::default()
        .with_directory()
        .with_application()
        .with_log();
    let card = Rc::new(Card::new(Box::new(card)));

    let options = Options {
        sfis: 1..=1,
        records: 1..=1,
        processing_options: true,
        ..Default::default()
    };
    let report = Session::new(options).run(Rc::clone(&card));

    // The scripted card does not know the command and rejects it.
    let failure = report.failure.unwrap();
    assert_eq!(Stage::ProcessingOptions, failure.stage);
    assert!(matches!(failure.source, card::Error::Rejected("GPO")));
    assert_eq!(gpo.to_vec(), sent(&card)[3]);
}

#[test]
fn test_session_without_applications() {
    let card = Rc::new(Card::new(Box::new(ScriptedCard::default())));

    let report = Session::new(Options::default()).run(Rc::clone(&card));

    assert!(report.is_complete());
    assert!(report.applications.is_empty());
    assert!(report.info.is_none());
    assert_eq!(1, sent(&card).len());
}

#[test]
fn test_session_without_requested_priority() {
    let card = Rc::new(Card::new(Box::new(ScriptedCard::default().with_directory())));

    let options = Options {
        priority: 2,
        ..Default::default()
    };
    let report = Session::new(options).run(Rc::clone(&card));

    assert_eq!(1, report.applications.len());
    assert_eq!(Stage::Selection, report.failure.unwrap().stage);
    // No SELECT is sent for an application that is not listed.
    assert_eq!(1, sent(&card).len());
}

#[cfg(feature = "pcsc")]
#[test]
#[ignore = "needs a PC/SC reader and a payment card"]
fn test_session_on_reader() {
    use emvinfo::pcsc::Context;

    let ctx = Context::try_new().unwrap();
    let device = ctx.open(None).unwrap();
    let card = Rc::new(Card::new(Box::new(device.connect(&ctx).unwrap())));

    let report = Session::new(Options::default()).run(card);

    assert!(!report.applications.is_empty());
}
