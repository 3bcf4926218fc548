//! Output device identification.

use std::fmt;
use std::sync::Arc;

/// Identifier of a render endpoint.
///
/// cpal has no stable endpoint ids, so a device is identified by the name the
/// host reported when it was enumerated. Names are compared exactly. Two
/// endpoints may report the same name (two identical USB headsets, say); a
/// lookup then resolves to the first one in enumeration order, which is also
/// the lower number in the device listing.
///
/// # Example
///
/// ```
/// use stream_playback::DeviceId;
///
/// let speakers = DeviceId::new("Speakers (Realtek High Definition Audio)");
/// assert_eq!(speakers.as_str(), "Speakers (Realtek High Definition Audio)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(Arc<str>);

impl DeviceId {
    /// Creates an identifier from an endpoint name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The endpoint name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Position of the first enumerated name equal to this identifier.
    pub(crate) fn first_match<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Option<usize> {
        names.into_iter().position(|name| name == self.as_str())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
