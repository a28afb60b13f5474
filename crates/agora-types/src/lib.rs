pub mod commitment;
pub mod common;
pub mod escrow;
pub mod events;
pub mod mandate;
pub mod oracle;
pub mod purchase;
pub mod receipt;

pub use commitment::*;
pub use common::*;
pub use escrow::*;
pub use events::*;
pub use mandate::*;
pub use oracle::*;
pub use purchase::*;
pub use receipt::*;
