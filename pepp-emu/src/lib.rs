pub mod error;
pub use error::Error;

pub mod mtm;
pub mod sim;
pub mod system;
