use crate::core::units::{DAYS_PER_WEEK, HOURS_PER_DAY};
use crate::input::DayOfWeek;
use crate::simulation_time::SimulationTimeIteration;

const WEEKDAYS: u32 = 5;
const WEEKEND_DAYS: u32 = 2;

/// Equipment that runs for a fixed number of hours each day from a start hour.
/// The window may wrap past midnight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DailyOperatingWindow {
    start_hour: f64,
    hours_in_operation: f64,
}

impl DailyOperatingWindow {
    pub fn new(start_hour: u32, hours_in_operation: f64) -> Self {
        Self {
            start_hour: (start_hour % HOURS_PER_DAY) as f64,
            hours_in_operation: hours_in_operation.clamp(0., HOURS_PER_DAY as f64),
        }
    }

    pub fn hours_in_operation(&self) -> f64 {
        self.hours_in_operation
    }

    /// Fraction (0-1) of the timestep during which the equipment runs
    pub fn fraction_running(&self, simtime: &SimulationTimeIteration) -> f64 {
        if simtime.timestep <= 0. {
            return 0.;
        }
        let day = HOURS_PER_DAY as f64;
        let step_start = simtime.time.rem_euclid(day);
        let step_end = step_start + simtime.timestep;
        let window_end = self.start_hour + self.hours_in_operation;

        // the window on the previous, same and next day
        let overlap: f64 = [-day, 0., day]
            .iter()
            .map(|offset| {
                let start = self.start_hour + offset;
                let end = window_end + offset;
                (step_end.min(end) - step_start.max(start)).max(0.)
            })
            .sum();

        (overlap / simtime.timestep).min(1.)
    }
}

/// Day of the week for a zero-based day of the year
pub fn day_of_week(day_of_year: u32, january_first: DayOfWeek) -> u32 {
    (january_first as u32 + day_of_year) % DAYS_PER_WEEK
}

/// Which days of the week and which months something may operate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Availability {
    weekdays_available: u32,
    weekend_days_available: u32,
    months: [bool; 12],
    january_first: DayOfWeek,
}

impl Availability {
    pub fn new(
        weekdays_available: u32,
        weekend_days_available: u32,
        months: [bool; 12],
        january_first: DayOfWeek,
    ) -> Self {
        Self {
            weekdays_available: weekdays_available.min(WEEKDAYS),
            weekend_days_available: weekend_days_available.min(WEEKEND_DAYS),
            months,
            january_first,
        }
    }

    pub fn is_available(&self, simtime: &SimulationTimeIteration) -> bool {
        if !self.months[simtime.current_month() as usize] {
            return false;
        }

        let weekday = day_of_week(simtime.current_day(), self.january_first);
        let (index, count, days) = if weekday < WEEKDAYS {
            (weekday, self.weekdays_available, WEEKDAYS)
        } else {
            (weekday - WEEKDAYS, self.weekend_days_available, WEEKEND_DAYS)
        };
        // spread the available days evenly through the week
        ((index + 1) * count).div_ceil(days) > (index * count).div_ceil(days)
    }
}
