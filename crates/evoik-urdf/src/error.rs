//! Error types for URDF parsing and topology import.

use std::path::PathBuf;

use evoik_core::TopologyError;

/// Errors that can occur during URDF processing.
#[derive(Debug, thiserror::Error)]
pub enum UrdfError {
    /// Failed to read the URDF file.
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse URDF XML content.
    #[error("URDF parse error: {0}")]
    Parse(String),

    /// A referenced link was not found in the model.
    #[error("missing link: {0}")]
    MissingLink(String),

    /// Joint type the importer cannot express.
    #[error("unsupported joint type: {0}")]
    UnsupportedJointType(String),

    /// The URDF has no root link (no link that is never a child).
    #[error("no root link found")]
    NoRootLink,

    /// The link tree could not be turned into a topology.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = UrdfError::Parse("bad xml".into());
        assert_eq!(e.to_string(), "URDF parse error: bad xml");

        let e = UrdfError::MissingLink("base_link".into());
        assert_eq!(e.to_string(), "missing link: base_link");

        let e = UrdfError::UnsupportedJointType("Spherical".into());
        assert_eq!(e.to_string(), "unsupported joint type: Spherical");

        let e = UrdfError::NoRootLink;
        assert_eq!(e.to_string(), "no root link found");

        let e: UrdfError = TopologyError::DuplicateSegment("link1".into()).into();
        assert_eq!(e.to_string(), "topology error: duplicate segment name: link1");
    }

    #[test]
    fn io_error_includes_path() {
        let e = UrdfError::Io {
            path: PathBuf::from("/tmp/robot.urdf"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let msg = e.to_string();
        assert!(msg.contains("/tmp/robot.urdf"));
        assert!(msg.contains("not found"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn error_is_send_sync() {
        assert_send_sync::<UrdfError>();
    }
}
