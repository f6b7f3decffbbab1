// Wind-speed corrections from the weather-station terrain to the building site.
// Two correlations are carried: the simple power-law used with the Sherman-Grimsrud (ELA)
// model, and the ASHRAE boundary-layer form used by AIM-2.

use crate::core::units::feet_to_metres;
use crate::input::{SiteInput, TerrainClass};

/// Height of the weather-station anemometer, ft
const STATION_HEIGHT: f64 = 32.8;
/// Height of the weather-station anemometer, m
const STATION_HEIGHT_METRES: f64 = 10.;
/// Weather stations are assumed to sit on open (plains) terrain
const STATION_TERRAIN: TerrainClass = TerrainClass::Plains;

const SHELTER_NO_NEIGHBOURS: f64 = 0.90;
const SHELTER_DISTANT_NEIGHBOURS: f64 = 0.70;
const SHELTER_CLOSE_NEIGHBOURS: f64 = 0.50;

#[derive(Clone, Copy, Debug, PartialEq)]
struct TerrainCoefficients {
    multiplier: f64,
    exponent: f64,
    /// ASHRAE boundary-layer thickness, m
    ashrae_thickness: f64,
    ashrae_exponent: f64,
}

fn terrain_coefficients(terrain: TerrainClass) -> TerrainCoefficients {
    let (multiplier, exponent, ashrae_thickness, ashrae_exponent) = match terrain {
        TerrainClass::Ocean => (1.30, 0.10, 210., 0.10),
        TerrainClass::Plains => (1.00, 0.15, 270., 0.14),
        TerrainClass::Rural => (0.85, 0.20, 270., 0.14),
        TerrainClass::Suburban => (0.67, 0.25, 370., 0.22),
        TerrainClass::City => (0.47, 0.35, 460., 0.33),
    };
    TerrainCoefficients {
        multiplier,
        exponent,
        ashrae_thickness,
        ashrae_exponent,
    }
}

/// Terrain and shelter corrections for one building site; immutable once built
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindEnvironment {
    station: TerrainCoefficients,
    site: TerrainCoefficients,
    shelter_coefficient: f64,
}

impl WindEnvironment {
    /// Arguments:
    /// * `site` - terrain class, shelter override and neighbour distance
    /// * `building_height` - height of the building, ft
    pub fn new(site: &SiteInput, building_height: f64) -> Self {
        let shelter_coefficient = site.shelter_coefficient.unwrap_or_else(|| {
            match site.neighbor_distance {
                None => SHELTER_NO_NEIGHBOURS,
                Some(distance) if distance <= 0. => SHELTER_NO_NEIGHBOURS,
                Some(distance) if distance > building_height => SHELTER_DISTANT_NEIGHBOURS,
                Some(_) => SHELTER_CLOSE_NEIGHBOURS,
            }
        });

        Self {
            station: terrain_coefficients(STATION_TERRAIN),
            site: terrain_coefficients(site.terrain),
            shelter_coefficient,
        }
    }

    pub fn shelter_coefficient(&self) -> f64 {
        self.shelter_coefficient
    }

    /// Shielding coefficient applied in the Sherman-Grimsrud wind term
    pub fn shielding_coefficient(&self) -> f64 {
        self.shelter_coefficient / 3.
    }

    /// Ratio of wind speed at `height` (ft) on the site to the station wind speed,
    /// simple power-law form
    pub fn site_wind_speed_factor(&self, height: f64) -> f64 {
        self.site.multiplier * (height / STATION_HEIGHT).powf(self.site.exponent)
            / (self.station.multiplier * (STATION_HEIGHT / STATION_HEIGHT).powf(self.station.exponent))
    }

    /// Ratio of wind speed at `height` (ft) on the site to the station wind speed,
    /// ASHRAE boundary-layer form
    pub fn ashrae_wind_speed_factor(&self, height: f64) -> f64 {
        (self.station.ashrae_thickness / STATION_HEIGHT_METRES).powf(self.station.ashrae_exponent)
            * (feet_to_metres(height) / self.site.ashrae_thickness).powf(self.site.ashrae_exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;

    fn site(
        terrain: TerrainClass,
        shelter_coefficient: Option<f64>,
        neighbor_distance: Option<f64>,
    ) -> SiteInput {
        SiteInput {
            terrain,
            shelter_coefficient,
            neighbor_distance,
        }
    }

    #[rstest]
    #[case(None, 0.90)]
    #[case(Some(0.), 0.90)]
    #[case(Some(40.), 0.70)]
    #[case(Some(10.), 0.50)]
    fn should_look_up_shelter_coefficient_from_neighbours(
        #[case] neighbor_distance: Option<f64>,
        #[case] expected: f64,
    ) {
        let wind = WindEnvironment::new(
            &site(TerrainClass::Suburban, None, neighbor_distance),
            20.,
        );
        assert_relative_eq!(wind.shelter_coefficient(), expected);
        assert_relative_eq!(wind.shielding_coefficient(), expected / 3.);
    }

    #[rstest]
    fn should_prefer_shelter_override() {
        let wind = WindEnvironment::new(&site(TerrainClass::City, Some(0.42), Some(10.)), 20.);
        assert_relative_eq!(wind.shelter_coefficient(), 0.42);
    }

    #[rstest]
    #[case(TerrainClass::Suburban, 8., 0.470845949, 0.525472069)]
    #[case(TerrainClass::Ocean, 16., 1.209951511, 1.088886196)]
    fn should_calc_wind_speed_factors(
        #[case] terrain: TerrainClass,
        #[case] height: f64,
        #[case] expected_site: f64,
        #[case] expected_ashrae: f64,
    ) {
        let wind = WindEnvironment::new(&site(terrain, None, None), height);
        assert_relative_eq!(
            wind.site_wind_speed_factor(height),
            expected_site,
            max_relative = 1e-8
        );
        assert_relative_eq!(
            wind.ashrae_wind_speed_factor(height),
            expected_ashrae,
            max_relative = 1e-8
        );
    }

    #[rstest]
    fn should_have_no_correction_at_station_on_plains() {
        let wind = WindEnvironment::new(&site(TerrainClass::Plains, None, None), 32.8);
        assert_relative_eq!(wind.site_wind_speed_factor(32.8), 1.);
        assert_relative_eq!(wind.ashrae_wind_speed_factor(32.8), 1., max_relative = 1e-3);
    }
}
