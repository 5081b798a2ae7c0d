pub mod appointment;
pub mod clinical_note;
pub mod enums;
pub mod filters;
pub mod identity;
pub mod visit;
pub mod vital_sign;

pub use appointment::*;
pub use clinical_note::*;
pub use enums::*;
pub use filters::*;
pub use identity::*;
pub use visit::*;
pub use vital_sign::*;
