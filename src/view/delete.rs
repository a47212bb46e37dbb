use std::future::Future;

use crate::error::ClientError;

/// Two-step deletion: ask, then do.
///
/// `Idle → ConfirmPending → Deleting → Idle`, or `ConfirmPending → Cancelled → Idle`.
/// The delete call itself is only made from `Deleting`. A delete the server
/// rejects goes back to `ConfirmPending` so the dialog stays up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteFlow {
    #[default]
    Idle,
    ConfirmPending,
    Deleting,
    Cancelled,
}

impl DeleteFlow {
    /// Open the confirmation.
    pub fn request(&mut self) {
        if matches!(self, Self::Idle | Self::Cancelled) {
            *self = Self::ConfirmPending;
        }
    }

    pub fn cancel(&mut self) {
        if *self == Self::ConfirmPending {
            *self = Self::Cancelled;
        }
    }

    /// Move from `Cancelled` back to `Idle` once the dialog has closed.
    pub fn settle(&mut self) {
        if *self == Self::Cancelled {
            *self = Self::Idle;
        }
    }

    /// Start deleting. False unless a confirmation was pending.
    pub fn confirm(&mut self) -> bool {
        if *self == Self::ConfirmPending {
            *self = Self::Deleting;
            true
        } else {
            false
        }
    }

    pub fn finish(&mut self, succeeded: bool) {
        if *self == Self::Deleting {
            *self = if succeeded {
                Self::Idle
            } else {
                Self::ConfirmPending
            };
        }
    }

    pub fn is_dialog_open(&self) -> bool {
        matches!(self, Self::ConfirmPending | Self::Deleting)
    }

    /// Confirm and run `delete`. Nothing is called unless a confirmation was pending.
    pub async fn confirm_with<F, Fut>(&mut self, delete: F) -> Result<(), ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        if !self.confirm() {
            return Err(ClientError::Validation(
                "Deletion has not been requested".to_string(),
            ));
        }
        let result = delete().await;
        self.finish(result.is_ok());
        result
    }
}
