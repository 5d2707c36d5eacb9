use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::ImportError;

/// Identity of one conversion attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ConversionToken(u64);

impl ConversionToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Issues increasing tokens so that only the newest conversion may touch
/// the document. Older ones find out at their next check and stop.
#[derive(Debug, Default)]
pub struct ConversionTokens {
    latest: AtomicU64,
}

impl ConversionTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> ConversionToken {
        ConversionToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, token: ConversionToken) -> bool {
        self.latest() == token.0
    }

    pub fn check(&self, token: ConversionToken) -> Result<(), ImportError> {
        let latest = self.latest();
        if latest == token.0 {
            Ok(())
        } else {
            Err(ImportError::Superseded {
                token: token.0,
                latest,
            })
        }
    }
}
