// Domain layer: the privilege set object model and pure evaluation helpers

pub mod condition;
pub mod dates;
pub mod error;
pub mod field;
pub mod privilege;
pub mod privilege_set;
pub mod record;
pub mod user;
pub mod value;
pub mod xml;

pub use error::Error;
