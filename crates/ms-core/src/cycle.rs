use core::fmt;
use core::str::FromStr;

use crate::CoreError;

/// Multigrid cycle variant passed to the solver.
///
/// The same cycle is applied to every mesh of a study; the ordering
/// (V before W) is the order in which studies are enumerated and reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CycleKind {
    V,
    W,
}

impl CycleKind {
    pub const ALL: [CycleKind; 2] = [CycleKind::V, CycleKind::W];

    /// Literal token used on the solver command line and in cache file names.
    pub fn as_str(self) -> &'static str {
        match self {
            CycleKind::V => "V",
            CycleKind::W => "W",
        }
    }
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CycleKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "V" | "v" => Ok(CycleKind::V),
            "W" | "w" => Ok(CycleKind::W),
            other => Err(CoreError::UnknownCycle {
                token: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip() {
        for cycle in CycleKind::ALL {
            assert_eq!(cycle.as_str().parse::<CycleKind>().unwrap(), cycle);
        }
    }

    #[test]
    fn lowercase_tokens_are_accepted() {
        assert_eq!("w".parse::<CycleKind>().unwrap(), CycleKind::W);
        assert_eq!(" v ".parse::<CycleKind>().unwrap(), CycleKind::V);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = "F".parse::<CycleKind>().unwrap_err();
        assert!(format!("{err}").contains("Unknown cycle kind"));
    }

    #[test]
    fn v_orders_before_w() {
        assert!(CycleKind::V < CycleKind::W);
    }
}
