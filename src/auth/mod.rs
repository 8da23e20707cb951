//! Signing & Token Engine
//!
//! Request signatures for API calls, `s--...--` URL signatures for
//! delivery paths, and stateless time-bounded delivery tokens. The hash
//! choices are pinned protocol constants, not options: requests and URL
//! signatures use SHA-1, delivery tokens use HMAC-SHA-256 keyed with the
//! hex-decoded token key. The remote side verifies both without a live
//! signing call, so the client's only obligation is deterministic
//! canonicalization.

mod clock;
mod signer;
mod token;

pub use clock::{Clock, SystemClock};
pub use signer::{SIGNED_PARAM_EXCLUSIONS, sign_parameters, sign_request, url_signature};
pub use token::AuthToken;
