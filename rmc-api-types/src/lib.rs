//! Data model types for the removable media catalog.

mod catalog;
pub use catalog::*;

mod device;
pub use device::*;

mod media;
pub use media::*;

mod pool;
pub use pool::*;

mod stk;
pub use stk::*;

/// Equipment type reported when device classification found no match.
///
/// This is a valid resolved state ("discovery could not classify this
/// device"), not an error.
pub const UNDEFINED_EQU_TYPE: &str = "99";

/// Directory prefix required for tape drive device paths in the vendor
/// parameter files.
pub const TAPE_DEVICE_DIR: &str = "/dev/rmt/";
