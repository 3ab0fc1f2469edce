// Schema / product version

use super::error::DomainError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const MAX_COMPONENTS: usize = 4;

/// Dotted numeric version such as `4.2.0` or `4.3.0-SNAPSHOT`.
///
/// Missing trailing components compare as zero, so `4.2` == `4.2.0`.
/// The suffix is kept for display only.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u32>,
    suffix: Option<String>,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            components: vec![major, minor, patch],
            suffix: None,
        }
    }

    pub fn components(&self) -> &[u32] {
        &self.components
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    fn component(&self, idx: usize) -> u32 {
        self.components.get(idx).copied().unwrap_or(0)
    }

    /// True when `self` lies in the inclusive range `[low, high]`
    pub fn within(&self, low: &Version, high: &Version) -> bool {
        self >= low && self <= high
    }
}

impl FromStr for Version {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (numeric, suffix) = match trimmed.split_once('-') {
            Some((n, sfx)) if !sfx.is_empty() => (n, Some(sfx.to_string())),
            Some(_) => return Err(DomainError::InvalidVersion(s.to_string())),
            None => (trimmed, None),
        };

        let components = numeric
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DomainError::InvalidVersion(s.to_string()))?;

        if components.is_empty() || components.len() > MAX_COMPONENTS {
            return Err(DomainError::InvalidVersion(s.to_string()));
        }

        Ok(Self { components, suffix })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numeric: Vec<String> = self.components.iter().map(u32::to_string).collect();
        write!(f, "{}", numeric.join("."))?;
        if let Some(suffix) = &self.suffix {
            write!(f, "-{}", suffix)?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (0..MAX_COMPONENTS)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}
