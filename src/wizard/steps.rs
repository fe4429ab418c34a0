use std::fmt;

/// What a step does, independent of which pipeline it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Upload,
    Account,
    /// Column mapping and format options; leaving it transforms the rows.
    Mapping,
    /// Candidate selection; leaving it submits.
    Review,
    Results,
}

pub trait WizardStep: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every step, in order.
    const ALL: &'static [Self];

    fn kind(self) -> StepKind;

    fn title(self) -> &'static str;

    fn first() -> Self {
        Self::ALL[0]
    }

    fn last() -> Self {
        Self::ALL[Self::ALL.len() - 1]
    }

    /// One-based position.
    fn number(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(1, |i| i + 1)
    }

    fn next(self) -> Option<Self> {
        Self::ALL.get(self.number()).copied()
    }

    fn prev(self) -> Option<Self> {
        self.number().checked_sub(2).and_then(|i| Self::ALL.get(i).copied())
    }

    fn of_kind(kind: StepKind) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.kind() == kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactStep {
    #[default]
    Upload,
    Mapping,
    Review,
    Results,
}

impl WizardStep for ContactStep {
    const ALL: &'static [Self] = &[Self::Upload, Self::Mapping, Self::Review, Self::Results];

    fn kind(self) -> StepKind {
        match self {
            Self::Upload => StepKind::Upload,
            Self::Mapping => StepKind::Mapping,
            Self::Review => StepKind::Review,
            Self::Results => StepKind::Results,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Upload => "Upload",
            Self::Mapping => "Map columns",
            Self::Review => "Review",
            Self::Results => "Results",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStep {
    #[default]
    Upload,
    Account,
    FileSetup,
    Review,
    Results,
}

impl WizardStep for TransactionStep {
    const ALL: &'static [Self] = &[
        Self::Upload,
        Self::Account,
        Self::FileSetup,
        Self::Review,
        Self::Results,
    ];

    fn kind(self) -> StepKind {
        match self {
            Self::Upload => StepKind::Upload,
            Self::Account => StepKind::Account,
            Self::FileSetup => StepKind::Mapping,
            Self::Review => StepKind::Review,
            Self::Results => StepKind::Results,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Upload => "Upload",
            Self::Account => "Account",
            Self::FileSetup => "File setup",
            Self::Review => "Review",
            Self::Results => "Results",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_and_prev_clamp() {
        assert_eq!(ContactStep::Upload.prev(), None);
        assert_eq!(ContactStep::Upload.next(), Some(ContactStep::Mapping));
        assert_eq!(ContactStep::Results.next(), None);
        assert_eq!(ContactStep::Results.prev(), Some(ContactStep::Review));
    }

    #[test]
    fn test_numbers_and_bounds() {
        assert_eq!(ContactStep::last(), ContactStep::Results);
        assert_eq!(ContactStep::last().number(), 4);
        assert_eq!(TransactionStep::last().number(), 5);
        assert_eq!(TransactionStep::first(), TransactionStep::Upload);
    }

    #[test]
    fn test_file_setup_is_the_mapping_step() {
        assert_eq!(TransactionStep::of_kind(StepKind::Mapping), Some(TransactionStep::FileSetup));
        assert_eq!(ContactStep::of_kind(StepKind::Account), None);
    }
}
