//! Readers for the compiled resource formats of Android packages.

#[macro_use]
pub mod error;

pub mod binary_xml;
pub mod chunk;
pub mod config;
pub mod dump;
pub mod string_pool;
pub mod table;
pub mod value;

pub use binary_xml::{decode, decode_report, decode_with_options, XmlNode, XmlNodes, XmlOptions, XmlReport};
pub use config::Configuration;
pub use error::{ResError, ResErrorKind, ResResult};
pub use string_pool::StringPool;
pub use table::{ResourceEntry, ResourceId, ResourceName, ResourceTable};
pub use value::DecodedValue;
