use serde::{Deserialize, Serialize};

use crate::condition::{Mapping, TrialType};

/// Defines the block sequence of a session and what each block runs.
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    fn next(&self) -> Option<Self>;
    fn block_number(&self) -> usize;

    fn is_practice(&self) -> bool {
        false
    }
    /// Whether this block runs with the test mapping instead of the training one.
    fn uses_test_mapping(&self) -> bool {
        false
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPhase {
    #[default]
    Practice,
    Training,
    Test,
}

impl Phase for BlockPhase {
    fn next(&self) -> Option<Self> {
        use BlockPhase::*;
        Some(match self {
            Practice => Training,
            Training => Test,
            Test => return None,
        })
    }

    fn block_number(&self) -> usize {
        match self {
            BlockPhase::Practice => 1,
            BlockPhase::Training => 2,
            BlockPhase::Test => 3,
        }
    }

    fn is_practice(&self) -> bool {
        matches!(self, BlockPhase::Practice)
    }

    fn uses_test_mapping(&self) -> bool {
        matches!(self, BlockPhase::Test)
    }
}

impl BlockPhase {
    /// Trial type for this block given the session's training condition.
    /// Practice and test blocks always use free movement.
    pub fn trial_type(&self, training: TrialType) -> TrialType {
        match self {
            BlockPhase::Training => training,
            BlockPhase::Practice | BlockPhase::Test => TrialType::FreeMovement,
        }
    }

    pub fn mapping(&self, training: Mapping, test: Mapping) -> Mapping {
        if self.uses_test_mapping() {
            test
        } else {
            training
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_run_practice_training_test() {
        let mut phase = BlockPhase::default();
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            phase = next;
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![BlockPhase::Practice, BlockPhase::Training, BlockPhase::Test]
        );
        assert_eq!(BlockPhase::Test.block_number(), 3);
    }

    #[test]
    fn only_training_uses_the_configured_condition() {
        assert_eq!(
            BlockPhase::Training.trial_type(TrialType::MotorImagery),
            TrialType::MotorImagery
        );
        assert_eq!(
            BlockPhase::Practice.trial_type(TrialType::ChoiceOnly),
            TrialType::FreeMovement
        );
        assert_eq!(
            BlockPhase::Test.mapping(Mapping::Normal, Mapping::InvertedX),
            Mapping::InvertedX
        );
        assert_eq!(
            BlockPhase::Practice.mapping(Mapping::Normal, Mapping::InvertedX),
            Mapping::Normal
        );
    }
}
