use std::fmt;

use serde::{Deserialize, Serialize};

/// 24-bit RGB color used to build `<font>` highlight markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Text inserted before and after every matched term in a search snippet.
///
/// # Examples
///
/// ```
/// use recordstore_core::{HighlightMarker, Rgb};
///
/// let plain = HighlightMarker::default();
/// assert_eq!((plain.open.as_str(), plain.close.as_str()), ("[", "]"));
///
/// let red = HighlightMarker::color(Rgb(0xff, 0, 0));
/// assert_eq!(red.open, "<font color=\"#ff0000\">");
/// assert_eq!(red.close, "</font>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightMarker {
    /// Inserted before a match.
    pub open: String,
    /// Inserted after a match.
    pub close: String,
}

impl HighlightMarker {
    /// Arbitrary open/close markers.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// HTML `<font color>` markers for the given color.
    pub fn color(color: Rgb) -> Self {
        Self::new(format!("<font color=\"{color}\">"), "</font>")
    }
}

impl Default for HighlightMarker {
    fn default() -> Self {
        Self::new("[", "]")
    }
}
