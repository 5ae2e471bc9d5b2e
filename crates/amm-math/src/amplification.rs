//! Time dependent amplification parameter of stable pools. A ramp moves the
//! value linearly from `start_value` at `start_time` to `end_value` at
//! `end_time`; outside a ramp the value is constant.
//!
//! Values are precision scaled by `AMP_PRECISION` and times are unix
//! timestamps in seconds. The caller reads the clock once per call and passes
//! it in as `now`.

use {
    super::{
        error::Error,
        math::BalU256,
        serialization::DecimalU256,
        stable_math::{AMP_PRECISION, MAX_AMP, MIN_AMP},
    },
    primitive_types::U256,
    serde::Serialize,
    serde_with::serde_as,
};

/// Shortest ramp that may be started.
pub const MIN_UPDATE_TIME: u64 = 24 * 60 * 60;

/// A ramp may at most double or halve the value per day.
const MAX_AMP_UPDATE_DAILY_RATE: u64 = 2;

/// The amplification parameter as seen at a point in time.
#[serde_as]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmplificationParameter {
    #[serde_as(as = "DecimalU256")]
    pub value: U256,
    pub is_updating: bool,
    #[serde_as(as = "DecimalU256")]
    pub precision: U256,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AmplificationState {
    start_value: u64,
    end_value: u64,
    start_time: u64,
    end_time: u64,
}

impl AmplificationState {
    /// A constant parameter of `raw_value`, not precision scaled.
    pub fn new(raw_value: u64) -> Result<Self, Error> {
        check_raw_bounds(raw_value)?;
        let value = raw_value * AMP_PRECISION;
        Ok(Self {
            start_value: value,
            end_value: value,
            start_time: 0,
            end_time: 0,
        })
    }

    /// Restores a ramp from precision scaled values, as previously stored by
    /// the caller.
    pub fn from_ramp(
        start_value: u64,
        end_value: u64,
        start_time: u64,
        end_time: u64,
    ) -> Result<Self, Error> {
        for value in [start_value, end_value] {
            if value < MIN_AMP * AMP_PRECISION {
                return Err(Error::MinAmp);
            }
            if value > MAX_AMP * AMP_PRECISION {
                return Err(Error::MaxAmp);
            }
        }
        // A ramp without duration can only hold a constant value.
        if start_time > end_time || (start_time == end_time && start_value != end_value) {
            return Err(Error::OutOfBounds);
        }
        Ok(Self {
            start_value,
            end_value,
            start_time,
            end_time,
        })
    }

    pub fn get(&self, now: u64) -> AmplificationParameter {
        let (value, is_updating) = self.current(now);
        AmplificationParameter {
            value: value.into(),
            is_updating,
            precision: AMP_PRECISION.into(),
        }
    }

    /// The precision scaled value at `now`, linearly interpolated while a
    /// ramp is in progress.
    pub fn value(&self, now: u64) -> U256 {
        self.current(now).0.into()
    }

    fn current(&self, now: u64) -> (u64, bool) {
        if now >= self.end_time || self.start_time == self.end_time {
            return (self.end_value, false);
        }

        // `start_time <= now` holds for ramps started through `start`; a
        // restored ramp queried before its start reads as its start value.
        let elapsed = u128::from(now.saturating_sub(self.start_time));
        let duration = u128::from(self.end_time - self.start_time);
        let (start, end) = (u128::from(self.start_value), u128::from(self.end_value));
        let value = if end > start {
            start + (end - start) * elapsed / duration
        } else {
            start - (start - end) * elapsed / duration
        };
        // Interpolated values lie between two `u64`s.
        (u64::try_from(value).unwrap_or(self.end_value), true)
    }

    /// Starts ramping towards `raw_end_value` (not precision scaled), reached
    /// at `end_time`.
    pub fn start(&mut self, raw_end_value: u64, end_time: u64, now: u64) -> Result<(), Error> {
        check_raw_bounds(raw_end_value)?;

        let duration = end_time
            .checked_sub(now)
            .ok_or(Error::AmpEndTimeTooClose)?;
        if duration < MIN_UPDATE_TIME {
            return Err(Error::AmpEndTimeTooClose);
        }

        let (current_value, is_updating) = self.current(now);
        if is_updating {
            return Err(Error::AmpOngoingUpdate);
        }

        let end_value = raw_end_value * AMP_PRECISION;
        let (larger, smaller) = if end_value > current_value {
            (end_value, current_value)
        } else {
            (current_value, end_value)
        };
        let daily_rate = U256::from(MIN_UPDATE_TIME)
            .bmul(larger.into())?
            .bdiv_up(U256::from(smaller).bmul(duration.into())?)?;
        if daily_rate > MAX_AMP_UPDATE_DAILY_RATE.into() {
            return Err(Error::AmpRateTooHigh);
        }

        tracing::info!(
            start_value = current_value,
            end_value,
            start_time = now,
            end_time,
            "amplification parameter update started"
        );
        *self = Self {
            start_value: current_value,
            end_value,
            start_time: now,
            end_time,
        };
        Ok(())
    }

    /// Freezes an ongoing ramp at its current value.
    pub fn stop(&mut self, now: u64) -> Result<(), Error> {
        let (current_value, is_updating) = self.current(now);
        if !is_updating {
            return Err(Error::AmpNoOngoingUpdate);
        }

        tracing::info!(value = current_value, "amplification parameter update stopped");
        *self = Self {
            start_value: current_value,
            end_value: current_value,
            start_time: now,
            end_time: now,
        };
        Ok(())
    }
}

fn check_raw_bounds(raw_value: u64) -> Result<(), Error> {
    if raw_value < MIN_AMP {
        return Err(Error::MinAmp);
    }
    if raw_value > MAX_AMP {
        return Err(Error::MaxAmp);
    }
    Ok(())
}
