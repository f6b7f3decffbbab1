pub const MINUTES_PER_HOUR: u32 = 60;
pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_WEEK: u32 = 7;

// Residential correlations are written in IP units; the host interface is SI.
pub(crate) const METRES_PER_FOOT: f64 = 0.3048;
pub(crate) const CUBIC_METRES_PER_SECOND_PER_CFM: f64 = 0.000_471_947_443_2;
pub(crate) const SQUARE_CENTIMETRES_PER_SQUARE_FOOT: f64 = 929.0304;
pub(crate) const PASCALS_PER_INCH_OF_WATER: f64 = 249.088_908_333;
pub(crate) const PASCALS_PER_ATMOSPHERE: f64 = 101_325.;
pub(crate) const METRES_PER_SECOND_PER_MPH: f64 = 0.44704;
pub(crate) const WATTS_PER_BTU_PER_HOUR: f64 = 0.293_071_07;
pub(crate) const KELVIN_PER_RANKINE: f64 = 5. / 9.;
/// Atmospheric pressure expressed as energy density, in Btu/ft3 per atm
pub(crate) const BTU_PER_CUBIC_FOOT_PER_ATMOSPHERE: f64 = 2.719_475;
/// Rankine offset as used by the residential infiltration correlations
pub(crate) const RANKINE_OFFSET: f64 = 460.;

pub(crate) fn fahrenheit_to_celsius(temp_f: f64) -> f64 {
    (temp_f - 32.) * 5. / 9.
}

pub(crate) fn cfm_to_m3_per_s(flow_cfm: f64) -> f64 {
    flow_cfm * CUBIC_METRES_PER_SECOND_PER_CFM
}

pub(crate) fn feet_to_metres(length_ft: f64) -> f64 {
    length_ft * METRES_PER_FOOT
}

pub(crate) fn square_feet_to_square_centimetres(area_ft2: f64) -> f64 {
    area_ft2 * SQUARE_CENTIMETRES_PER_SQUARE_FOOT
}

/// UA in Btu/(hr.F) to W/K
pub(crate) fn btu_per_hour_f_to_watts_per_k(ua: f64) -> f64 {
    ua * WATTS_PER_BTU_PER_HOUR * 9. / 5.
}

/// Convert an air change rate on a volume in ft3 to a flow in cfm
pub(crate) fn air_change_rate_to_cfm(air_change_rate: f64, volume_ft3: f64) -> f64 {
    air_change_rate * volume_ft3 / MINUTES_PER_HOUR as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;

    #[rstest]
    #[case(32., 0.)]
    #[case(212., 100.)]
    #[case(-40., -40.)]
    fn should_convert_fahrenheit_to_celsius(#[case] temp_f: f64, #[case] temp_c: f64) {
        assert_relative_eq!(fahrenheit_to_celsius(temp_f), temp_c, epsilon = 1e-12);
    }

    #[rstest]
    fn should_convert_flow_units() {
        assert_relative_eq!(feet_to_metres(8.), 2.4384, max_relative = 1e-12);
        assert_relative_eq!(square_feet_to_square_centimetres(2.), 1858.0608, max_relative = 1e-12);
        assert_relative_eq!(cfm_to_m3_per_s(1000.), 0.4719474432, max_relative = 1e-9);
        assert_relative_eq!(air_change_rate_to_cfm(0.5, 16000.), 133.333333, max_relative = 1e-6);
    }

    #[rstest]
    fn should_convert_ua_to_si() {
        assert_relative_eq!(btu_per_hour_f_to_watts_per_k(1.), 0.527527926, max_relative = 1e-6);
    }
}
