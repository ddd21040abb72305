//! Budget enforcement and exclusion classification.
//!
//! Files are walked in path order. Per-file limits are checked first and
//! either exclude or truncate according to [`TruncationPolicy`]. The first
//! file that would overflow a total limit exhausts the budget: it and every
//! later file are excluded with that total reason, without reordering. Once
//! the budget is exhausted, per-file limits are no longer consulted.

use tracing::debug;

use crate::context::encoder::{estimate_tokens, BYTES_PER_TOKEN};
use crate::types::{
    ContextBudget, ContextExclusion, EncodedFile, ExclusionReason, LimitPolicy, Truncation,
    TruncationPolicy, TruncationReason,
};
use crate::workspace::snapshot::content_hash;

/// Classification of every encoded file.
#[derive(Debug, Default)]
pub struct BudgetOutcome {
    /// Admitted files (full and truncated) in input order
    pub admitted: Vec<EncodedFile>,
    pub excluded: Vec<ContextExclusion>,
    pub total_bytes: usize,
    pub total_tokens: usize,
}

impl BudgetOutcome {
    /// Admitted files that kept their full contents.
    pub fn attachments(&self) -> Vec<EncodedFile> {
        self.admitted
            .iter()
            .filter(|f| !f.is_truncated())
            .cloned()
            .collect()
    }

    /// Admitted files that were trimmed.
    pub fn truncated(&self) -> Vec<EncodedFile> {
        self.admitted
            .iter()
            .filter(|f| f.is_truncated())
            .cloned()
            .collect()
    }
}

/// Applies a [`ContextBudget`] under a [`TruncationPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetEnforcer {
    budget: ContextBudget,
    policy: TruncationPolicy,
}

impl BudgetEnforcer {
    pub fn new(budget: ContextBudget, policy: TruncationPolicy) -> Self {
        Self { budget, policy }
    }

    pub fn budget(&self) -> ContextBudget {
        self.budget
    }

    /// Classify files. Deterministic for a given input order and budget.
    pub fn enforce(&self, files: Vec<EncodedFile>) -> BudgetOutcome {
        let mut outcome = BudgetOutcome::default();
        let mut exhausted: Option<ExclusionReason> = None;

        for file in files {
            if let Some(reason) = exhausted {
                debug!("Excluded {}: {}", file.relative_path, reason);
                outcome.excluded.push(exclusion(&file, reason));
                continue;
            }

            let file = match self.apply_per_file_limits(file) {
                Ok(file) => file,
                Err(exclusion) => {
                    debug!("Excluded {}: {}", exclusion.relative_path, exclusion.reason);
                    outcome.excluded.push(exclusion);
                    continue;
                }
            };

            if outcome.total_bytes.saturating_add(file.byte_count) > self.budget.max_total_bytes {
                exhausted = Some(ExclusionReason::ExceedsTotalBytes {
                    limit: self.budget.max_total_bytes,
                });
            } else if outcome.total_tokens.saturating_add(file.token_count)
                > self.budget.max_total_tokens
            {
                exhausted = Some(ExclusionReason::ExceedsTotalTokens {
                    limit: self.budget.max_total_tokens,
                });
            }

            if let Some(reason) = exhausted {
                debug!("Excluded {}: {}", file.relative_path, reason);
                outcome.excluded.push(exclusion(&file, reason));
                continue;
            }

            outcome.total_bytes += file.byte_count;
            outcome.total_tokens += file.token_count;
            outcome.admitted.push(file);
        }

        outcome
    }

    fn apply_per_file_limits(
        &self,
        file: EncodedFile,
    ) -> std::result::Result<EncodedFile, ContextExclusion> {
        let mut file = file;

        let max_bytes = self.budget.max_bytes_per_file;
        if file.byte_count > max_bytes {
            match self.policy.per_file_bytes {
                LimitPolicy::Exclude => {
                    return Err(exclusion(
                        &file,
                        ExclusionReason::ExceedsPerFileBytes { limit: max_bytes },
                    ))
                }
                LimitPolicy::Truncate => {
                    file = truncate(
                        file,
                        max_bytes,
                        TruncationReason::PerFileBytes { limit: max_bytes },
                    )
                }
            }
        }

        let max_tokens = self.budget.max_tokens_per_file;
        if file.token_count > max_tokens {
            match self.policy.per_file_tokens {
                LimitPolicy::Exclude => {
                    return Err(exclusion(
                        &file,
                        ExclusionReason::ExceedsPerFileTokens { limit: max_tokens },
                    ))
                }
                LimitPolicy::Truncate => {
                    file = truncate(
                        file,
                        max_tokens.saturating_mul(BYTES_PER_TOKEN),
                        TruncationReason::PerFileTokens { limit: max_tokens },
                    )
                }
            }
        }

        Ok(file)
    }
}

fn exclusion(file: &EncodedFile, reason: ExclusionReason) -> ContextExclusion {
    ContextExclusion {
        path: file.path.clone(),
        relative_path: file.relative_path.clone(),
        byte_count: file.byte_count,
        token_count: file.token_count,
        reason,
    }
}

/// Trim contents to at most `max_bytes`, on a UTF-8 boundary.
fn truncate(mut file: EncodedFile, max_bytes: usize, reason: TruncationReason) -> EncodedFile {
    let (original_bytes, original_tokens) = match file.truncation {
        Some(previous) => (previous.original_bytes, previous.original_tokens),
        None => (file.byte_count, file.token_count),
    };

    let mut end = max_bytes.min(file.contents.len());
    while !file.contents.is_char_boundary(end) {
        end -= 1;
    }
    file.contents.truncate(end);

    file.byte_count = file.contents.len();
    file.token_count = estimate_tokens(file.byte_count);
    file.content_hash = content_hash(file.contents.as_bytes());
    file.truncation = Some(Truncation {
        reason,
        original_bytes,
        original_tokens,
    });
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::encoder::encode;
    use crate::types::LoadedFile;
    use std::path::PathBuf;

    fn file(name: &str, bytes: usize) -> EncodedFile {
        encode(LoadedFile {
            path: PathBuf::from(format!("/ws/{}", name)),
            relative_path: name.to_string(),
            contents: "x".repeat(bytes),
        })
    }

    fn budget(per_file_bytes: usize, total_bytes: usize) -> ContextBudget {
        ContextBudget {
            max_bytes_per_file: per_file_bytes,
            max_tokens_per_file: usize::MAX,
            max_total_bytes: total_bytes,
            max_total_tokens: usize::MAX,
        }
    }

    #[test]
    fn test_per_file_bytes_exclusion_keeps_limit() {
        let enforcer = BudgetEnforcer::new(budget(1000, 100_000), TruncationPolicy::default());
        let outcome = enforcer.enforce(vec![file("big.rs", 1001), file("ok.rs", 1000)]);

        assert_eq!(outcome.admitted.len(), 1);
        assert_eq!(outcome.excluded.len(), 1);
        let excluded = &outcome.excluded[0];
        assert_eq!(excluded.relative_path, "big.rs");
        assert_eq!(
            excluded.reason,
            ExclusionReason::ExceedsPerFileBytes { limit: 1000 }
        );
        assert_eq!(excluded.reason.to_string(), "Exceeds per-file bytes limit: 1000");
    }

    #[test]
    fn test_per_file_tokens_exclusion() {
        let enforcer = BudgetEnforcer::new(
            ContextBudget {
                max_tokens_per_file: 10,
                ..budget(usize::MAX, usize::MAX)
            },
            TruncationPolicy::default(),
        );
        let outcome = enforcer.enforce(vec![file("a.rs", 41)]);
        assert_eq!(
            outcome.excluded[0].reason,
            ExclusionReason::ExceedsPerFileTokens { limit: 10 }
        );
        assert_eq!(outcome.excluded[0].token_count, 11);
    }

    #[test]
    fn test_total_budget_excludes_all_later_files() {
        let enforcer = BudgetEnforcer::new(budget(100, 25), TruncationPolicy::default());
        // c.rs alone would fit after b.rs is rejected, but order is never changed.
        let outcome = enforcer.enforce(vec![file("a.rs", 10), file("b.rs", 20), file("c.rs", 5)]);

        let admitted: Vec<_> = outcome.admitted.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(admitted, vec!["a.rs"]);
        assert_eq!(outcome.total_bytes, 10);
        for exclusion in &outcome.excluded {
            assert_eq!(
                exclusion.reason,
                ExclusionReason::ExceedsTotalBytes { limit: 25 }
            );
        }
        assert_eq!(outcome.excluded.len(), 2);
    }

    #[test]
    fn test_exhausted_budget_takes_precedence_over_per_file_limits() {
        let enforcer = BudgetEnforcer::new(budget(100, 25), TruncationPolicy::default());
        let outcome = enforcer.enforce(vec![
            file("a.rs", 10),
            file("b.rs", 20),
            file("c.rs", 500),
            file("d.rs", 1),
        ]);

        let reasons: Vec<_> = outcome
            .excluded
            .iter()
            .map(|e| (e.relative_path.as_str(), e.reason))
            .collect();
        let total = ExclusionReason::ExceedsTotalBytes { limit: 25 };
        assert_eq!(reasons, vec![("b.rs", total), ("c.rs", total), ("d.rs", total)]);
        assert_eq!(outcome.excluded[1].byte_count, 500);
    }

    #[test]
    fn test_per_file_exclusion_does_not_exhaust_budget() {
        let enforcer = BudgetEnforcer::new(budget(100, 25), TruncationPolicy::default());
        let outcome = enforcer.enforce(vec![file("a.rs", 500), file("b.rs", 20)]);

        assert_eq!(
            outcome.excluded[0].reason,
            ExclusionReason::ExceedsPerFileBytes { limit: 100 }
        );
        assert_eq!(outcome.admitted.len(), 1);
        assert_eq!(outcome.admitted[0].relative_path, "b.rs");
    }

    #[test]
    fn test_total_tokens_budget() {
        let enforcer = BudgetEnforcer::new(
            ContextBudget {
                max_total_tokens: 5,
                ..budget(usize::MAX, usize::MAX)
            },
            TruncationPolicy::default(),
        );
        let outcome = enforcer.enforce(vec![file("a.rs", 12), file("b.rs", 12)]);
        assert_eq!(outcome.admitted.len(), 1);
        assert_eq!(
            outcome.excluded[0].reason,
            ExclusionReason::ExceedsTotalTokens { limit: 5 }
        );
    }

    #[test]
    fn test_truncation_policy_trims_to_limit() {
        let policy = TruncationPolicy {
            per_file_bytes: LimitPolicy::Truncate,
            per_file_tokens: LimitPolicy::Exclude,
        };
        let enforcer = BudgetEnforcer::new(budget(8, 100), policy);
        let outcome = enforcer.enforce(vec![file("long.rs", 20), file("short.rs", 4)]);

        assert!(outcome.excluded.is_empty());
        let truncated = outcome.truncated();
        assert_eq!(truncated.len(), 1);
        let trimmed = &truncated[0];
        assert_eq!(trimmed.byte_count, 8);
        assert_eq!(trimmed.contents.len(), 8);
        let truncation = trimmed.truncation.unwrap();
        assert_eq!(truncation.original_bytes, 20);
        assert_eq!(truncation.reason, TruncationReason::PerFileBytes { limit: 8 });

        assert_eq!(outcome.attachments().len(), 1);
        assert_eq!(outcome.total_bytes, 12);
    }

    #[test]
    fn test_token_truncation() {
        let policy = TruncationPolicy {
            per_file_bytes: LimitPolicy::Exclude,
            per_file_tokens: LimitPolicy::Truncate,
        };
        let enforcer = BudgetEnforcer::new(
            ContextBudget {
                max_tokens_per_file: 3,
                ..budget(usize::MAX, usize::MAX)
            },
            policy,
        );
        let outcome = enforcer.enforce(vec![file("a.rs", 40)]);
        let trimmed = &outcome.admitted[0];
        assert_eq!(trimmed.byte_count, 12);
        assert_eq!(trimmed.token_count, 3);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let policy = TruncationPolicy {
            per_file_bytes: LimitPolicy::Truncate,
            per_file_tokens: LimitPolicy::Exclude,
        };
        let enforcer = BudgetEnforcer::new(budget(3, 100), policy);
        let encoded = encode(LoadedFile {
            path: PathBuf::from("/ws/u.txt"),
            relative_path: "u.txt".to_string(),
            contents: "aéé".to_string(),
        });
        let outcome = enforcer.enforce(vec![encoded]);
        assert_eq!(outcome.admitted[0].contents, "aé");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let enforcer = BudgetEnforcer::new(budget(15, 30), TruncationPolicy::default());
        let input = || vec![file("a.rs", 10), file("b.rs", 16), file("c.rs", 10), file("d.rs", 11)];
        let first = enforcer.enforce(input());
        let second = enforcer.enforce(input());
        assert_eq!(first.admitted, second.admitted);
        assert_eq!(first.excluded, second.excluded);
    }
}
