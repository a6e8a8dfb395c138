//! Promotional campaigns that discount a job's fare.

use thiserror::Error;

use crate::Money;

#[derive(Debug, Error, PartialEq)]
pub enum CampaignError {
    #[error("percentage {0} is above 100")]
    PercentageOutOfRange(u8),
}

/// Whole percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percent(u8);

impl Percent {
    pub fn new(value: u8) -> Result<Self, CampaignError> {
        if value > 100 {
            return Err(CampaignError::PercentageOutOfRange(value));
        }
        Ok(Percent(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// What a campaign takes off the fare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reward {
    /// Flat amount off, capped at the fare.
    FixedAmount(Money),
    /// Share of the fare, rounded to the whole unit.
    Percentage(Percent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub code: String,
    pub reward: Reward,
    /// Fares below this do not qualify.
    pub minimum_fare: Money,
}

impl Campaign {
    pub fn new(code: impl Into<String>, reward: Reward) -> Self {
        Self {
            code: code.into(),
            reward,
            minimum_fare: Money::ZERO,
        }
    }

    pub fn with_minimum_fare(mut self, minimum_fare: Money) -> Self {
        self.minimum_fare = minimum_fare;
        self
    }

    pub fn discount(&self, fare: Money) -> Money {
        if fare < self.minimum_fare {
            return Money::ZERO;
        }
        match self.reward {
            Reward::FixedAmount(amount) => amount.min(fare),
            Reward::Percentage(pct) => fare.share_rounded(u32::from(pct.get()) * 100),
        }
    }

    /// Fare after the discount; never negative.
    pub fn apply(&self, fare: Money) -> Money {
        fare - self.discount(fare)
    }
}
