/// Shared service directory
///
/// Identity enrollment and terminator publication for the overlay.

mod record;
mod store;

pub use record::{IdentityRecord, Terminator};
pub use store::{DirectoryError, ServiceDirectory};
