pub mod infiltration;
pub mod natural_ventilation;
pub mod ventilation;
pub mod wind;
pub mod zone;
