//! Analysis backends
//!
//! This module provides:
//! - The provider and backend descriptor types used in configuration
//! - A deterministic round-robin rotation over the configured backends
//! - An HTTP client for OpenAI-compatible chat completion endpoints

mod http_backend;

pub use http_backend::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of full rotations the counter runs through before wrapping
const COUNTER_CYCLES: usize = 1000;

/// Hosted inference provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    Mistral,
    Codestral,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Groq => write!(f, "Groq"),
            Provider::Mistral => write!(f, "Mistral"),
            Provider::Codestral => write!(f, "Codestral"),
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "mistral" => Ok(Provider::Mistral),
            "codestral" => Ok(Provider::Codestral),
            _ => Err(Error::Config(format!("Unknown provider: {}", s))),
        }
    }
}

/// One entry of the rotation: where to send a document and how much of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub provider: Provider,
    pub model: String,
    /// Maximum number of characters submitted per document
    pub input_capacity: usize,
}

impl BackendDescriptor {
    pub fn new(provider: Provider, model: impl Into<String>, input_capacity: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            input_capacity,
        }
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.provider, self.model)
    }
}

/// Fixed, ordered list of backends handed out round-robin.
///
/// The k-th call to [`BackendRotation::next`] returns `backends[k % len]`.
/// The counter wraps at a multiple of the list length so wrapping never
/// breaks the sequence.
#[derive(Debug)]
pub struct BackendRotation {
    backends: Vec<BackendDescriptor>,
    counter: AtomicUsize,
    wrap: usize,
}

impl BackendRotation {
    pub fn new(backends: Vec<BackendDescriptor>) -> Result<Self> {
        if backends.is_empty() {
            return Err(Error::Config(
                "backend rotation needs at least one backend".to_string(),
            ));
        }
        let wrap = backends.len() * COUNTER_CYCLES;
        Ok(Self {
            backends,
            counter: AtomicUsize::new(0),
            wrap,
        })
    }

    /// Take the next backend. Concurrent callers always get distinct counter values.
    pub fn next(&self) -> (usize, &BackendDescriptor) {
        let wrap = self.wrap;
        let previous = self
            .counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % wrap))
            .unwrap_or_else(|current| current);
        let index = previous % self.backends.len();
        (index, &self.backends[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_backends;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_empty_rotation_rejected() {
        assert!(BackendRotation::new(Vec::new()).is_err());
    }

    #[test]
    fn test_rotation_is_round_robin() {
        let backends = default_backends();
        let rotation = BackendRotation::new(backends.clone()).unwrap();

        for k in 0..(backends.len() * 3 + 2) {
            let (index, backend) = rotation.next();
            assert_eq!(index, k % backends.len());
            assert_eq!(backend, &backends[k % backends.len()]);
        }
    }

    #[test]
    fn test_rotation_survives_counter_wrap() {
        let backends = default_backends();
        let rotation = BackendRotation::new(backends.clone()).unwrap();
        let total = backends.len() * COUNTER_CYCLES + 5;

        let mut last = None;
        for k in 0..total {
            let (index, _) = rotation.next();
            assert_eq!(index, k % backends.len());
            last = Some(index);
        }
        assert_eq!(last, Some((total - 1) % backends.len()));
    }

    #[test]
    fn test_concurrent_callers_share_evenly() {
        let backends = default_backends();
        let rotation = Arc::new(BackendRotation::new(backends.clone()).unwrap());
        let per_thread = backends.len() * 20;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rotation = rotation.clone();
                std::thread::spawn(move || {
                    (0..per_thread)
                        .map(|_| rotation.next().0)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for handle in handles {
            for index in handle.join().unwrap() {
                *counts.entry(index).or_default() += 1;
            }
        }

        // Every counter value is handed out exactly once, so each backend
        // receives the same share.
        assert_eq!(counts.len(), backends.len());
        assert!(counts.values().all(|&n| n == 4 * 20));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("GROQ".parse::<Provider>().unwrap(), Provider::Groq);
        assert!("openai".parse::<Provider>().is_err());
    }
}
