// ObjectDB - object identity and graph serialization core
// for scientific applications

#![warn(rust_2018_idioms)]

pub mod formats;
pub mod io;
pub mod registry;
pub mod slots;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-exports for convenience
pub use io::{Reader, Value, VersionId, Writer};
pub use registry::{ObjHandle, ObjectDb, Persistable, SoftHandle, TypeFactory, Uid};
pub use slots::SlotList;

/// ObjectDB error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("attempted to access invalid object id '{0}'")]
        InvalidId(u64),

        #[error("error reading attribute '{name}': {detail}")]
        Attribute { name: String, detail: String },

        #[error("format error: {0}")]
        Format(String),

        #[error("logic error: {0}")]
        Logic(String),

        #[error("unknown object type '{0}'")]
        UnknownType(String),

        #[error("could not open file '{0}'")]
        Filename(String),

        #[error("stream error: {0}")]
        Io(#[from] std::io::Error),
    }

    impl Error {
        /// Shorthand for the attribute-specific read/write error.
        pub fn attribute(name: &str, detail: impl Into<String>) -> Error {
            Error::Attribute {
                name: name.to_string(),
                detail: detail.into(),
            }
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_format() {
        // VERSION is a static string, always valid
        let _version: &str = VERSION;
    }

    #[test]
    fn test_error_messages_name_the_attribute() {
        let err = error::Error::attribute("flankerDist", "no such attribute");
        assert!(err.to_string().contains("flankerDist"));
    }
}
