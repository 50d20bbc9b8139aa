//! Per-user concurrent session cap.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// Resolved session cap for a user.
///
/// Resolution order is per-role override, then the configured default;
/// a configured value of `0` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionLimit {
    /// At most this many active sessions.
    Fixed(u32),
    /// No cap.
    Unlimited,
}

impl SessionLimit {
    /// Whether opening one more session on top of `active_count` breaks the cap.
    pub fn is_exceeded_by(&self, active_count: u32) -> bool {
        match self {
            Self::Fixed(max) => active_count >= *max,
            Self::Unlimited => false,
        }
    }

    /// Fails with `TooManySessions` when one more session would break the cap.
    pub fn check(&self, active_count: u32) -> AppResult<()> {
        match self {
            Self::Fixed(max) if active_count >= *max => Err(AppError::too_many_sessions(format!(
                "Maximum concurrent sessions ({max}) reached; revoke an existing session first"
            ))),
            _ => Ok(()),
        }
    }

    /// Numeric cap, or `None` for unlimited.
    pub fn as_max(&self) -> Option<u32> {
        match self {
            Self::Fixed(max) => Some(*max),
            Self::Unlimited => None,
        }
    }
}

impl From<u32> for SessionLimit {
    fn from(value: u32) -> Self {
        if value == 0 {
            Self::Unlimited
        } else {
            Self::Fixed(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_fixed_limit() {
        let limit = SessionLimit::Fixed(2);
        assert!(limit.check(1).is_ok());
        let err = limit.check(2).expect_err("cap reached");
        assert_eq!(err.kind, ErrorKind::TooManySessions);
    }

    #[test]
    fn test_unlimited_never_trips() {
        assert!(SessionLimit::Unlimited.check(u32::MAX).is_ok());
        assert_eq!(SessionLimit::Unlimited.as_max(), None);
    }

    #[test]
    fn test_zero_means_unlimited() {
        assert_eq!(SessionLimit::from(0), SessionLimit::Unlimited);
        assert_eq!(SessionLimit::from(3), SessionLimit::Fixed(3));
    }
}
