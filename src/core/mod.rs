pub mod ductwork;
pub mod psychrometrics;
pub mod schedule;
pub mod space_heat_demand;
pub mod units;
