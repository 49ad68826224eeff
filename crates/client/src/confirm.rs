/// Answer to a confirmation prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

impl From<bool> for Confirmation {
    fn from(value: bool) -> Self {
        if value {
            Self::Confirmed
        } else {
            Self::Cancelled
        }
    }
}

/// Asks the person at the keyboard whether to go ahead with a transition.
pub trait ConfirmIntent: Send + Sync {
    fn confirm(&self, prompt: &str) -> Confirmation;
}

impl<F> ConfirmIntent for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> Confirmation {
        Confirmation::from(self(prompt))
    }
}

/// Non-interactive confirmation, e.g. `--yes`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssumeYes;

impl ConfirmIntent for AssumeYes {
    fn confirm(&self, _prompt: &str) -> Confirmation {
        Confirmation::Confirmed
    }
}
