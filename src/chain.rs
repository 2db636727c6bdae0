//! Ordered fallback locators for one logical UI target

use std::fmt;
use tracing::{debug, info, warn};

use crate::locator::{Locator, LocatorStrategy};
use crate::wait::WaitOutcome;

/// Alternative locators for one logical target, in order of preference.
///
/// Sites change their markup between releases, so page objects describe a
/// target by every locator it has been known to match. Chains are built per
/// call and never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateChain {
    target: String,
    candidates: Vec<Locator>,
}

impl CandidateChain {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            candidates: Vec::new(),
        }
    }

    /// Chain with exactly one candidate
    pub fn single(target: impl Into<String>, locator: Locator) -> Self {
        Self::new(target).with(locator)
    }

    pub fn with(mut self, locator: Locator) -> Self {
        self.candidates.push(locator);
        self
    }

    pub fn xpath(self, value: impl Into<String>) -> Self {
        self.with(Locator::xpath(value))
    }

    pub fn css(self, value: impl Into<String>) -> Self {
        self.with(Locator::css(value))
    }

    pub fn id(self, value: impl Into<String>) -> Self {
        self.with(Locator::id(value))
    }

    pub fn by(self, strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        self.with(Locator::new(strategy, value))
    }

    /// Logical name used in logs and errors
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn candidates(&self) -> &[Locator] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Try candidates strictly in order and return the first `Found`.
    ///
    /// A fatal `Error` stops the walk. When every candidate times out, the
    /// attempts of all of them are returned together. One session serves one
    /// command at a time, so candidates are never probed concurrently.
    pub async fn resolve_first<E, F>(&self, mut resolver_call: F) -> WaitOutcome<E>
    where
        F: AsyncFnMut(&Locator) -> WaitOutcome<E>,
    {
        let mut attempts = Vec::new();

        for (index, candidate) in self.candidates.iter().enumerate() {
            debug!(
                target_name = %self.target,
                candidate = index + 1,
                total = self.candidates.len(),
                locator = %candidate,
                "Trying candidate locator"
            );

            match resolver_call(candidate).await {
                WaitOutcome::Found(located) => {
                    info!(
                        "Resolved '{}' with candidate {}/{}: {}",
                        self.target,
                        index + 1,
                        self.candidates.len(),
                        candidate
                    );
                    return WaitOutcome::Found(located);
                }
                WaitOutcome::TimedOut(tried) => attempts.extend(tried),
                WaitOutcome::Error(err) => return WaitOutcome::Error(err),
            }
        }

        if !self.candidates.is_empty() {
            warn!(
                "No candidate resolved '{}' ({} tried)",
                self.target,
                self.candidates.len()
            );
        }
        WaitOutcome::TimedOut(attempts)
    }
}

impl fmt::Display for CandidateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.target)?;
        for (i, candidate) in self.candidates.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", candidate)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod chain_test;
