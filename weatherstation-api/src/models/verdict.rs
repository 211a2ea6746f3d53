use core::fmt;

/// Classification of a calibrated value against its static limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Value present and within its limit
    Normal,
    /// Value present and above its limit
    Alert,
    /// Value missing for this cycle
    Error,
}

impl Verdict {
    pub fn is_alert(&self) -> bool {
        matches!(self, Verdict::Alert)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Normal => write!(f, "Normal"),
            Verdict::Alert => write!(f, "ALERT"),
            Verdict::Error => write!(f, "ERROR"),
        }
    }
}
