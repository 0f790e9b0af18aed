//! Plain-text rendering of a session report.

use std::fmt::{self, Display, Formatter, Write};

use emvinfo::ap::directory::Application;
use emvinfo::paylog::LogEntry;
use emvinfo::track2::Track2;
use emvinfo::{CardInfo, Report};

const RULE: &str = "-----------------";

fn section<W: Write>(out: &mut W, title: &str) -> fmt::Result {
    writeln!(out, "{}\n-- {} --\n{}", RULE, title, RULE)
}

fn application<W: Write>(out: &mut W, app: &Application) -> fmt::Result {
    writeln!(out, "Name: {}", app.label)?;
    writeln!(out, "Priority: {}", app.priority)?;
    writeln!(out, "AID: {}", app.aid)
}

pub fn applications<W: Write>(out: &mut W, apps: &[Application]) -> fmt::Result {
    writeln!(out, "{} Application(s) found:", apps.len())?;

    for app in apps {
        writeln!(out, "{}", RULE)?;
        application(out, app)?;
    }

    Ok(())
}

pub fn card_info<W: Write>(out: &mut W, info: &CardInfo) -> fmt::Result {
    section(out, "Application")?;
    if let Some(app) = &info.application {
        application(out, app)?;
    }

    writeln!(out, "{}", RULE)?;
    writeln!(out, "Language Preference: {}", info.language_preference)?;
    writeln!(out, "Cardholder Name: {}", info.cardholder_name)?;
    writeln!(
        out,
        "Track 1 Discretionary data: {}",
        hex::encode_upper(&info.track1_discretionary_data)
    )?;
    writeln!(
        out,
        "Track 2 equivalent data: {}",
        hex::encode_upper(&info.track2_equivalent_data)
    )
}

pub fn track2<W: Write>(out: &mut W, track2: &Track2) -> fmt::Result {
    writeln!(out, "PAN: {}", track2.pan)?;
    writeln!(out, "Expiry date: {}", track2.expiry)
}

pub fn paylog<W: Write>(out: &mut W, log_count: u8, log: &[LogEntry]) -> fmt::Result {
    writeln!(out, "Log count: {}", log_count)?;

    section(out, "Paylog")?;
    for entry in log {
        writeln!(out, "{}", entry)?;
    }

    Ok(())
}

/// Renders every section the report has data for.
pub struct Text<'a>(pub &'a Report);

impl Display for Text<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let report = self.0;

        applications(f, &report.applications)?;

        if let Some(info) = &report.info {
            card_info(f, info)?;

            if let Some(t2) = &report.track2 {
                track2(f, t2)?;
            }

            paylog(f, info.log_count, &report.log)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use emvinfo::ap::directory::Aid;

    fn app() -> Application {
        Application {
            aid: Aid::try_from(&[0xA0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10][..]).unwrap(),
            label: "VISA".to_string(),
            priority: 1,
        }
    }

    #[test]
    fn test_applications() {
        let mut out = String::new();
        applications(&mut out, &[app()]).unwrap();

        assert_eq!(
            "1 Application(s) found:\n-----------------\nName: VISA\nPriority: 1\nAID: A0000000031010\n",
            out,
        );
    }

    #[test]
    fn test_report_without_card_info() {
        let out = Text(&Report::default()).to_string();

        assert_eq!("0 Application(s) found:\n", out);
    }

    #[test]
    fn test_report_with_track2() {
        let raw = [
            0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0x34, 0x56, 0xD1, 0x50, 0x62,
        ];
        let report = Report {
            applications: vec![app()],
            info: Some(CardInfo {
                application: Some(app()),
                cardholder_name: "DOE/JOHN".to_string(),
                track2_equivalent_data: raw.to_vec(),
                ..CardInfo::new()
            }),
            track2: Some(Track2::decode(&raw).unwrap()),
            ..Default::default()
        };

        let out = Text(&report).to_string();

        assert!(out.contains("Cardholder Name: DOE/JOHN\n"));
        assert!(out.contains("Track 2 equivalent data: 1234567890123456D15062\n"));
        assert!(out.contains("PAN: 12 34 56 78 90 12 34 56\nExpiry date: 06/2015\n"));
        assert!(out.contains("Log count: 0\n"));
    }

    #[test]
    fn test_paylog() {
        let mut out = String::new();
        paylog(&mut out, 0, &[]).unwrap();

        assert_eq!(
            "Log count: 0\n-----------------\n-- Paylog --\n-----------------\n",
            out,
        );
    }
}
