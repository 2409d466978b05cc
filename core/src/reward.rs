use std::fmt;

/// Completion-speed tiers, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RewardTier {
    Clutch = 1,
    Swift = 2,
    Lightning = 3,
}

pub const REWARD_TIERS: [RewardTier; 3] = [RewardTier::Clutch, RewardTier::Swift, RewardTier::Lightning];

impl RewardTier {
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(RewardTier::Clutch),
            2 => Some(RewardTier::Swift),
            3 => Some(RewardTier::Lightning),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RewardTier::Lightning => "Lightning Victory",
            RewardTier::Swift => "Swift Victory",
            RewardTier::Clutch => "Clutch Victory",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            RewardTier::Lightning => "⚡",
            RewardTier::Swift => "🚀",
            RewardTier::Clutch => "🎯",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RewardTier::Lightning => "Completed in the first third of the round - Legendary speed!",
            RewardTier::Swift => "Completed in the middle third of the round - Great teamwork!",
            RewardTier::Clutch => "Completed in the last third of the round - Just in time!",
        }
    }
}

impl fmt::Display for RewardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `remaining >= 2/3 round` is Lightning, `>= 1/3` is Swift, else Clutch.
pub fn tier_from_remaining(remaining_secs: u32, round_secs: u32) -> RewardTier {
    let scaled = u64::from(remaining_secs) * 3;
    let round = u64::from(round_secs);
    if scaled >= round * 2 {
        RewardTier::Lightning
    } else if scaled >= round {
        RewardTier::Swift
    } else {
        RewardTier::Clutch
    }
}
