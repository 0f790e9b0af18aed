//! A crate to read EMV contactless payment cards through an APDU delegate.
//!
//! The card is driven through [`nfc::Handler`], which performs one command/response
//! exchange with the physical reader. On top of it the crate discovers the payment
//! applications, selects one, reads the cardholder records and the transaction log, and
//! decodes everything the card stores in the clear. No cryptographic check is performed.

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($t: tt)*) => {
        ()
    };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($t: tt)*) => {
        ()
    };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($t: tt)*) => {
        ()
    };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! warn {
    ($($t: tt)*) => {
        ()
    };
}

#[cfg(feature = "pcsc")]
pub mod pcsc;

pub mod ap;
pub mod card;
pub mod info;
pub mod nfc;
pub mod paylog;
pub mod pdol;
pub mod session;
pub mod tables;
pub mod tlv;
pub mod track2;

pub use card::Card;
pub use info::CardInfo;
pub use session::{Options, Report, Session};
pub use tables::Tables;
