use crate::error::CompileError;

/// Token used to abort compilations. Clones observe the same cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    token: tokio_util::sync::CancellationToken,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails with [CompileError::Cancelled] for given setup if cancellation was requested.
    #[inline]
    pub fn check(&self, setup: &str) -> Result<(), CompileError> {
        if self.is_cancelled() {
            Err(CompileError::Cancelled {
                setup: setup.to_string(),
            })
        } else {
            Ok(())
        }
    }
}
