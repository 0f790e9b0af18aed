//! Collection of APs that corresponds with the applications on the card

pub mod directory;
pub mod payment;

pub use self::directory::DirectoryAp;
pub use self::payment::PaymentAp;
