//! Authentication: credential verification, sessions and request extractors.

pub mod cookies;
pub mod credentials;
pub mod extract;
pub mod sessions;

pub use credentials::{Credential, Flow};
pub use extract::{CurrentAccount, CurrentCustomer, CurrentMaker, RequestAuth};
pub use sessions::{IssuedSession, SessionIssuer};
