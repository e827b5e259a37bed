use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;
use rand::distributions::Alphanumeric;

pub const DEFAULT_CODE_LENGTH: usize = 12;
pub const MIN_CODE_LENGTH: usize = 8;

/// Source of confirmation codes.
pub trait CodeGenerator: Send + Sync + Debug {
    fn generate(&self) -> String;
}

/// Alphanumeric codes from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy)]
pub struct RandomCodeGenerator {
    length: usize,
}

impl RandomCodeGenerator {
    /// Lengths below [`MIN_CODE_LENGTH`] are raised to it.
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(MIN_CODE_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

/// Predictable codes (`code-0001`, `code-0002`, ...) for tests.
#[derive(Debug, Default)]
pub struct SequenceCodeGenerator {
    next: AtomicU32,
}

impl SequenceCodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeGenerator for SequenceCodeGenerator {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("code-{n:04}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_codes_have_requested_length() {
        let codes = RandomCodeGenerator::new(16);
        let code = codes.generate();
        assert_eq!(code.len(), 16);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_short_lengths_are_raised() {
        assert_eq!(RandomCodeGenerator::new(4).length(), MIN_CODE_LENGTH);
        assert_eq!(RandomCodeGenerator::default().generate().len(), DEFAULT_CODE_LENGTH);
    }

    #[test]
    fn test_random_codes_do_not_repeat() {
        let codes = RandomCodeGenerator::default();
        let seen: HashSet<String> = (0..200).map(|_| codes.generate()).collect();
        assert_eq!(seen.len(), 200);
    }

    #[test]
    fn test_sequence_codes() {
        let codes = SequenceCodeGenerator::new();
        assert_eq!(codes.generate(), "code-0001");
        assert_eq!(codes.generate(), "code-0002");
    }
}
