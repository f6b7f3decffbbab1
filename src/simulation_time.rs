use crate::core::units::{HOURS_PER_DAY, MINUTES_PER_HOUR};
use serde::Deserialize;

const HOURS_IN_YEAR: u32 = 8760;

// First hour of each month of a non-leap year, closed by the end of December
const MONTH_START_END_HOURS: [u32; 13] = [
    0, 744, 1416, 2160, 2880, 3624, 4344, 5088, 5832, 6552, 7296, 8016, 8760,
];

/// Simulation period and step, all in hours
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SimulationTime {
    #[serde(rename(deserialize = "start"))]
    start_time: f64,
    #[serde(rename(deserialize = "end"))]
    end_time: f64,
    step: f64,
}

impl SimulationTime {
    pub fn new(start_time: f64, end_time: f64, step: f64) -> Self {
        Self {
            start_time,
            end_time,
            step,
        }
    }

    pub fn step_in_hours(&self) -> f64 {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        ((self.end_time - self.start_time) / self.step).ceil().max(0.) as usize
    }

    pub fn iter(&self) -> SimulationTimeIterator {
        SimulationTimeIterator {
            current_index: 0,
            simulation_time: *self,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimulationTimeIterator {
    current_index: usize,
    simulation_time: SimulationTime,
}

impl Iterator for SimulationTimeIterator {
    type Item = SimulationTimeIteration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.simulation_time.total_steps() {
            return None;
        }
        let index = self.current_index;
        self.current_index += 1;

        // computed from the index rather than accumulated, so sub-hourly steps stay aligned to the hour
        Some(SimulationTimeIteration {
            index,
            time: self.simulation_time.start_time + index as f64 * self.simulation_time.step,
            timestep: self.simulation_time.step,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationTimeIteration {
    pub index: usize,
    pub time: f64,
    pub timestep: f64,
}

impl SimulationTimeIteration {
    pub fn current_hour(&self) -> u32 {
        // nudge so that e.g. 2.9999999 is treated as hour 3
        (self.time + 1e-9).floor() as u32
    }

    pub fn hour_of_day(&self) -> u32 {
        self.current_hour() % HOURS_PER_DAY
    }

    pub fn current_day(&self) -> u32 {
        self.current_hour() / HOURS_PER_DAY
    }

    /// Minute within the current hour at which this timestep starts
    pub fn minute_of_hour(&self) -> f64 {
        ((self.time - self.current_hour() as f64) * MINUTES_PER_HOUR as f64).max(0.)
    }

    pub fn timestep_in_minutes(&self) -> f64 {
        self.timestep * MINUTES_PER_HOUR as f64
    }

    /// Zero-based month of the year; runs longer than a year wrap around
    pub fn current_month(&self) -> u32 {
        let hour_of_year = self.current_hour() % HOURS_IN_YEAR;
        MONTH_START_END_HOURS
            .iter()
            .skip(1)
            .position(|end_hour| hour_of_year < *end_hour)
            .unwrap_or(11) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;

    #[fixture]
    pub fn timestep() -> f64 {
        0.25
    }

    #[fixture]
    pub fn simtime(timestep: f64) -> SimulationTime {
        SimulationTime::new(743.0, 745.0, timestep)
    }

    #[rstest]
    fn should_have_correct_total_steps(simtime: SimulationTime) {
        assert_eq!(simtime.total_steps(), 8)
    }

    #[rstest]
    fn should_iterate_correctly(simtime: SimulationTime, timestep: f64) {
        let hours = [743, 743, 743, 743, 744, 744, 744, 744];
        let hours_of_day = [23, 23, 23, 23, 0, 0, 0, 0];
        let current_days = [30, 30, 30, 30, 31, 31, 31, 31];
        let current_months = [0, 0, 0, 0, 1, 1, 1, 1];
        let minutes = [0., 15., 30., 45., 0., 15., 30., 45.];

        let mut count = 0;
        for (i, item) in simtime.iter().enumerate() {
            assert_eq!(item.index, i);
            assert_relative_eq!(item.time, i as f64 * timestep + 743.0);
            assert_eq!(item.timestep, timestep);
            assert_eq!(item.current_hour(), hours[i]);
            assert_eq!(item.hour_of_day(), hours_of_day[i]);
            assert_eq!(item.current_day(), current_days[i]);
            assert_eq!(item.current_month(), current_months[i]);
            assert_relative_eq!(item.minute_of_hour(), minutes[i], epsilon = 1e-6);
            assert_relative_eq!(item.timestep_in_minutes(), 15.);
            count += 1;
        }
        assert_eq!(count, 8);
    }

    #[rstest]
    fn should_wrap_month_after_a_full_year() {
        let item = SimulationTimeIteration {
            index: 0,
            time: 8760. + 750.,
            timestep: 1.,
        };
        assert_eq!(item.current_month(), 1);
    }
}
