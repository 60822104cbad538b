use std::collections::HashSet;

use crate::models::{BudgetRange, PriceTier, ScoredCandidate};

/// Output cardinality of one generate or refresh call
pub const TRIPLE_SIZE: usize = 3;

/// Diversity constraints, strictest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rung {
    /// New merchant, new category and new price tier
    Full,
    /// New merchant, plus a new category or a new price tier
    MerchantAndEither,
    MerchantOnly,
    /// Allowed only when the pool has fewer than three merchants
    Unconstrained,
}

const LADDER: [Rung; 4] = [
    Rung::Full,
    Rung::MerchantAndEither,
    Rung::MerchantOnly,
    Rung::Unconstrained,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub picks: Vec<ScoredCandidate>,
    /// Fewer than three picks after full relaxation
    pub partial: bool,
}

/// Greedy Choice-of-Three picker
///
/// Price tiers are the thirds of the occasion's budget range.
#[derive(Debug, Clone)]
pub struct DiversitySelector {
    budget: BudgetRange,
}

impl DiversitySelector {
    pub fn new(budget: BudgetRange) -> Self {
        Self { budget }
    }

    pub fn tier(&self, candidate: &ScoredCandidate) -> Option<PriceTier> {
        candidate.candidate.price_tier(&self.budget)
    }

    /// Picks up to three from `ranked` (final score descending)
    pub fn select(&self, ranked: &[ScoredCandidate]) -> Selection {
        let mut picks: Vec<ScoredCandidate> = Vec::with_capacity(TRIPLE_SIZE);

        while picks.len() < TRIPLE_SIZE {
            match self.next_pick(&picks, ranked, &HashSet::new()) {
                Some(pick) => picks.push(pick),
                None => break,
            }
        }

        let partial = picks.len() < TRIPLE_SIZE;
        if partial {
            tracing::warn!(
                pool_size = ranked.len(),
                picks = picks.len(),
                "Selector could not fill a full triple"
            );
        }

        Selection { picks, partial }
    }

    /// Highest-ranked candidate that fits next to `selected`, relaxing the
    /// constraints one rung at a time
    ///
    /// Candidates already in `selected` or whose id is in `skip` are never
    /// returned. The merchant-count check for the last rung looks at all of
    /// `ranked`, not just what remains.
    pub fn next_pick(
        &self,
        selected: &[ScoredCandidate],
        ranked: &[ScoredCandidate],
        skip: &HashSet<String>,
    ) -> Option<ScoredCandidate> {
        let available = |c: &&ScoredCandidate| {
            !skip.contains(c.id()) && !selected.iter().any(|s| s.id() == c.id())
        };

        if selected.is_empty() {
            return ranked.iter().find(available).cloned();
        }

        let merchants: HashSet<String> = selected.iter().map(|s| s.candidate.merchant_key()).collect();
        let categories: HashSet<_> = selected.iter().map(|s| s.candidate.category).collect();
        let tiers: HashSet<Option<PriceTier>> = selected.iter().map(|s| self.tier(s)).collect();

        let distinct_pool_merchants = ranked
            .iter()
            .map(|c| c.candidate.merchant_key())
            .collect::<HashSet<_>>()
            .len();

        for rung in LADDER {
            if rung == Rung::Unconstrained && distinct_pool_merchants >= TRIPLE_SIZE {
                break;
            }

            let pick = ranked.iter().filter(available).find(|c| {
                let new_merchant = !merchants.contains(&c.candidate.merchant_key());
                let new_category = !categories.contains(&c.candidate.category);
                let new_tier = !tiers.contains(&self.tier(c));

                match rung {
                    Rung::Full => new_merchant && new_category && new_tier,
                    Rung::MerchantAndEither => new_merchant && (new_category || new_tier),
                    Rung::MerchantOnly => new_merchant,
                    Rung::Unconstrained => true,
                }
            });

            if let Some(pick) = pick {
                tracing::debug!(id = %pick.id(), rung = ?rung, "Selected candidate");
                return Some(pick.clone());
            }
        }

        None
    }
}
