pub mod document;
pub mod domains;
pub mod walker;

pub use document::{ConfigObject, TlsMode};
pub use walker::RefSite;
