//! Proximity Payment System Environment: the directory of payment applications on the card.

use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::card::{Error, Result};
use crate::nfc::{self, command};
use crate::tlv::{self, Field, Scanner};
use crate::Card;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

const DF_NAME: &[u8] = b"2PAY.SYS.DDF01";

/// Length of the application identifiers this crate understands.
pub const AID_LEN: usize = 7;

/// Priority of an application that expressed no preference.
pub const NO_PRIORITY: u8 = 0;

/// An application identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Aid([u8; AID_LEN]);

impl Aid {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Aid {
    type Error = tlv::Error;

    fn try_from(value: &[u8]) -> std::result::Result<Self, Self::Error> {
        <[u8; AID_LEN]>::try_from(value)
            .map(Aid)
            .map_err(|_| tlv::Error::AidLength(value.len()))
    }
}

impl Display for Aid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// A payment application listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Application {
    pub aid: Aid,
    pub label: String,
    pub priority: u8,
}

/// Fields of a template collected until the next template starts.
#[derive(Default)]
struct Template {
    aid: Option<Aid>,
    label: String,
    priority: u8,
}

impl Template {
    fn build(self) -> tlv::Result<Application> {
        Ok(Application {
            aid: self.aid.ok_or(tlv::Error::MissingAid)?,
            label: self.label,
            priority: self.priority,
        })
    }
}

/// Decodes the application templates of a directory response, in order of appearance.
///
/// A template starts at each `61` octet and runs up to the next one or the end of the
/// buffer. A response without any template decodes to an empty list.
pub fn parse(payload: &[u8]) -> tlv::Result<Vec<Application>> {
    let mut applications = Vec::new();
    let mut current: Option<Template> = None;

    for field in Scanner::new(payload, tlv::DIRECTORY) {
        let field = field?;

        if let Field::ApplicationTemplate = field {
            if let Some(template) = current.replace(Template::default()) {
                applications.push(template.build()?);
            }
            continue;
        }

        let template = match current.as_mut() {
            Some(t) => t,
            None => continue,
        };

        match field {
            Field::ApplicationIdentifier(aid) => template.aid = Some(Aid::try_from(aid)?),
            Field::ApplicationPriority(priority) => template.priority = priority,
            Field::ApplicationLabel(label) => {
                template.label = String::from_utf8_lossy(label).to_string()
            }
            _ignored => {
                debug!("Ignoring {:?} in the directory", _ignored);
            }
        }
    }

    if let Some(template) = current {
        applications.push(template.build()?);
    }

    Ok(applications)
}

/// Picks the first application with the priority.
pub fn find_by_priority(applications: &[Application], priority: u8) -> Result<&Application> {
    applications
        .iter()
        .find(|app| app.priority == priority)
        .ok_or_else(|| Error::NotFound(format!("Application with priority {}", priority)))
}

/// The payment directory AP.
pub struct DirectoryAp<T>
where
    T: nfc::Handler,
{
    card: Rc<Card<T>>,
    applications: Vec<Application>,
}

impl<T> DirectoryAp<T>
where
    T: nfc::Handler,
{
    /// Opens the AP in the card by selecting the DF, then decodes the applications it lists.
    /// A card without the directory lists no application.
    pub fn open(card: Rc<Card<T>>) -> Result<Self> {
        let payload = match card.execute(command::select_by_name(DF_NAME.into()), "SELECT PPSE") {
            Ok(payload) => payload,
            Err(e) if e.is_protocol() => {
                warn!("No payment directory on the card: {}", e);
                vec![]
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            card,
            applications: parse(&payload)?,
        })
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn into_applications(self) -> Vec<Application> {
        self.applications
    }

    /// The card this AP was opened on.
    pub fn card(&self) -> Rc<Card<T>> {
        Rc::clone(&self.card)
    }
}
