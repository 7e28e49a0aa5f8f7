use crate::config::LinkConfig;
use crate::insurance::InsuranceIndex;
use crate::model::{CarrierRecord, InsuranceRecord, MatchDecision, MatchType};
use crate::normalize::{is_digits, mc_key, pad, unpad};

/// Links carrier records to insurance records by an ordered strategy list.
///
/// Holds only shared references, so one `Matcher` can be copied into every
/// worker; the indices are never mutated after load.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    index: &'a InsuranceIndex,
    strategies: &'a [MatchType],
    pad_width: usize,
}

impl<'a> Matcher<'a> {
    pub fn new(index: &'a InsuranceIndex, config: &'a LinkConfig) -> Self {
        Self {
            index,
            strategies: &config.matching.strategies,
            pad_width: config.matching.pad_width,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_strategies(index: &'a InsuranceIndex, strategies: &'a [MatchType]) -> Self {
        Self { index, strategies, pad_width: crate::normalize::DOT_WIDTH }
    }

    /// First strategy that finds a key wins. `None` is the ordinary
    /// no-match outcome, not an error.
    pub fn find(&self, carrier: &CarrierRecord) -> Option<(MatchType, &'a InsuranceRecord)> {
        self.strategies
            .iter()
            .find_map(|&strategy| self.try_strategy(strategy, carrier).map(|rec| (strategy, rec)))
    }

    /// `find`, taking ownership of the carrier into the decision.
    pub fn link(&self, carrier: CarrierRecord) -> Option<MatchDecision<'a>> {
        let (match_type, insurance) = self.find(&carrier)?;
        Some(MatchDecision { match_type, carrier, insurance })
    }

    fn try_strategy(&self, strategy: MatchType, carrier: &CarrierRecord) -> Option<&'a InsuranceRecord> {
        let index = self.index;
        match strategy {
            MatchType::McDirect => carrier.docket_values().find_map(|docket| {
                // registry dockets usually keep their "MC" marker; the index does not
                index.lookup_mc(docket).or_else(|| {
                    let key = mc_key(docket);
                    (!key.is_empty() && key != docket).then(|| index.lookup_mc(&key)).flatten()
                })
            }),
            MatchType::DotDirect => {
                let dot = carrier.dot_number.as_deref()?;
                index.lookup_dot(dot)
            }
            MatchType::DotPadded => {
                let dot = carrier.dot_number.as_deref().filter(|d| is_digits(d))?;
                index.lookup_dot(&pad(dot, self.pad_width))
            }
            MatchType::DotUnpadded => {
                let dot = carrier.dot_number.as_deref().filter(|d| d.starts_with('0'))?;
                let stripped = unpad(dot);
                if stripped.is_empty() {
                    return None;
                }
                index.lookup_dot(stripped)
            }
        }
    }
}
