//! GIF frame disposal methods.

use std::fmt;
use std::str::FromStr;

use framereel_common::error::{ReelError, ReelResult};
use serde::{Deserialize, Serialize};

/// What a decoder does with a frame's area before drawing the next one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposal {
    /// No disposal specified (code 0).
    Unspecified,
    /// Leave the frame in place (code 1).
    DoNotDispose,
    /// Clear the frame's area to the background (code 2).
    #[default]
    RestoreToBackground,
    /// Restore what was there before the frame (code 3).
    RestoreToPrevious,
}

impl Disposal {
    pub const ALL: [Disposal; 4] = [
        Disposal::Unspecified,
        Disposal::DoNotDispose,
        Disposal::RestoreToBackground,
        Disposal::RestoreToPrevious,
    ];

    /// Graphic control extension code.
    pub fn code(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::DoNotDispose => 1,
            Self::RestoreToBackground => 2,
            Self::RestoreToPrevious => 3,
        }
    }

    pub fn from_code(code: u8) -> ReelResult<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.code() == code)
            .ok_or_else(|| ReelError::invalid_disposal(code.to_string()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::DoNotDispose => "do_not_dispose",
            Self::RestoreToBackground => "restore_to_background",
            Self::RestoreToPrevious => "restore_to_previous",
        }
    }
}

impl fmt::Display for Disposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disposal {
    type Err = ReelError;

    /// Accepts the snake_case name (dashes allowed) or the numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        if let Ok(code) = normalized.parse::<u8>() {
            return Self::from_code(code);
        }
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| ReelError::invalid_disposal(s))
    }
}

impl From<Disposal> for gif::DisposalMethod {
    fn from(disposal: Disposal) -> Self {
        match disposal {
            Disposal::Unspecified => gif::DisposalMethod::Any,
            Disposal::DoNotDispose => gif::DisposalMethod::Keep,
            Disposal::RestoreToBackground => gif::DisposalMethod::Background,
            Disposal::RestoreToPrevious => gif::DisposalMethod::Previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_codes() {
        assert_eq!(
            "restore_to_previous".parse::<Disposal>().unwrap(),
            Disposal::RestoreToPrevious
        );
        assert_eq!(
            "Do-Not-Dispose".parse::<Disposal>().unwrap(),
            Disposal::DoNotDispose
        );
        assert_eq!("0".parse::<Disposal>().unwrap(), Disposal::Unspecified);
        assert_eq!(Disposal::from_code(2).unwrap(), Disposal::RestoreToBackground);
    }

    #[test]
    fn test_unknown_disposal_is_rejected() {
        assert!(matches!(
            "sideways".parse::<Disposal>(),
            Err(ReelError::InvalidDisposal { .. })
        ));
        assert!(matches!(
            Disposal::from_code(4),
            Err(ReelError::InvalidDisposal { .. })
        ));
    }

    #[test]
    fn test_display_parses_back() {
        for disposal in Disposal::ALL {
            assert_eq!(disposal.to_string().parse::<Disposal>().unwrap(), disposal);
        }
    }

    #[test]
    fn test_maps_to_gif_codes() {
        assert_eq!(
            gif::DisposalMethod::from(Disposal::RestoreToPrevious),
            gif::DisposalMethod::Previous
        );
        assert_eq!(
            gif::DisposalMethod::from(Disposal::Unspecified),
            gif::DisposalMethod::Any
        );
    }
}
