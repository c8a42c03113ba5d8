use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use super::calculator::PeriodProfile;
use super::structs::{ValueArea, ValueProjection};

/// Broken profile invariants
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileValidationError {
    #[error("Volume conservation violated: levels sum to {levels}, total is {total}")]
    VolumeConservation { levels: Decimal, total: Decimal },
    #[error("Level {price} volume {volume} differs from bid {bid} + ask {ask}")]
    LevelComposition {
        price: Decimal,
        volume: Decimal,
        bid: Decimal,
        ask: Decimal,
    },
    #[error("Negative volume at level {price}")]
    NegativeVolume { price: Decimal },
    #[error("Level {price} outside period range [{low}, {high}]")]
    LevelOutOfRange {
        price: Decimal,
        low: Decimal,
        high: Decimal,
    },
    #[error("Point of control missing on a populated profile")]
    MissingPoc,
    #[error("Point of control {poc} holds {poc_value}, but level {price} holds {value}")]
    PocNotMaximal {
        poc: Decimal,
        poc_value: Decimal,
        price: Decimal,
        value: Decimal,
    },
    #[error("Value area [{low}, {high}] does not contain the point of control {poc}")]
    PocOutsideValueArea {
        poc: Decimal,
        high: Decimal,
        low: Decimal,
    },
    #[error("Value area [{low}, {high}] exceeds period range [{period_low}, {period_high}]")]
    ValueAreaOutOfRange {
        high: Decimal,
        low: Decimal,
        period_high: Decimal,
        period_low: Decimal,
    },
}

/// Outcome of a full profile check
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub levels_checked: usize,
    pub errors: Vec<ProfileValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks the accounting invariants of a period profile
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileValidator;

impl ProfileValidator {
    pub fn new() -> Self {
        Self
    }

    /// Level accounting, range bounds and POC
    pub fn validate_profile(&self, profile: &PeriodProfile) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut level_sum = Decimal::ZERO;

        for (_, level) in profile.levels() {
            report.levels_checked += 1;
            level_sum += level.volume;

            if level.volume < Decimal::ZERO || level.bid < Decimal::ZERO || level.ask < Decimal::ZERO {
                report.errors.push(ProfileValidationError::NegativeVolume { price: level.price });
            }
            if level.volume != level.bid + level.ask {
                report.errors.push(ProfileValidationError::LevelComposition {
                    price: level.price,
                    volume: level.volume,
                    bid: level.bid,
                    ask: level.ask,
                });
            }
            if level.price < profile.low() || level.price > profile.high() {
                report.errors.push(ProfileValidationError::LevelOutOfRange {
                    price: level.price,
                    low: profile.low(),
                    high: profile.high(),
                });
            }
        }

        if level_sum != profile.total_volume() {
            report.errors.push(ProfileValidationError::VolumeConservation {
                levels: level_sum,
                total: profile.total_volume(),
            });
        }

        if let Err(error) = self.validate_poc(profile) {
            report.errors.push(error);
        }

        for error in &report.errors {
            warn!(start_bar = profile.start_bar, %error, "Profile validation failed");
        }
        report
    }

    /// The POC must hold the largest |projected value|.
    ///
    /// Delta levels can shrink after the POC was chosen, so only the presence
    /// of a POC is checked for that projection.
    pub fn validate_poc(&self, profile: &PeriodProfile) -> Result<(), ProfileValidationError> {
        if profile.is_empty() {
            return Ok(());
        }
        let (Some(poc), Some(poc_value)) = (profile.poc(), profile.poc_value()) else {
            return Err(ProfileValidationError::MissingPoc);
        };
        if profile.projection() == ValueProjection::Delta {
            return Ok(());
        }

        let projection = profile.projection();
        for (_, level) in profile.levels() {
            let value = level.value(projection).abs();
            if value > poc_value.abs() {
                return Err(ProfileValidationError::PocNotMaximal {
                    poc,
                    poc_value,
                    price: level.price,
                    value,
                });
            }
        }
        Ok(())
    }

    /// `val <= poc <= vah` and the band stays inside the period range
    pub fn validate_value_area(
        &self,
        profile: &PeriodProfile,
        value_area: &ValueArea,
    ) -> Result<(), ProfileValidationError> {
        if value_area.is_empty() {
            return Ok(());
        }

        if let Some(poc) = profile.poc() {
            if !value_area.contains(poc) {
                return Err(ProfileValidationError::PocOutsideValueArea {
                    poc,
                    high: value_area.high,
                    low: value_area.low,
                });
            }
        }

        if value_area.high > profile.high() || value_area.low < profile.low() {
            return Err(ProfileValidationError::ValueAreaOutOfRange {
                high: value_area.high,
                low: value_area.low,
                period_high: profile.high(),
                period_low: profile.low(),
            });
        }
        Ok(())
    }
}
