use crate::errors::AirflowConfigError;
use crate::input::{BuildingInput, ZoneGeometryInput, ZoneType};
use anyhow::bail;
use indexmap::IndexMap;

/// A physical thermal zone; lengths in ft, areas in ft2, volumes in ft3
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zone {
    zone_type: ZoneType,
    height: f64,
    floor_area: f64,
    volume: f64,
    floor_elevation: f64,
}

impl Zone {
    fn new(zone_type: ZoneType, geometry: &ZoneGeometryInput) -> anyhow::Result<Self> {
        for (property, value) in [
            ("height", geometry.height),
            ("floor area", geometry.floor_area),
            ("volume", geometry.volume),
        ] {
            if value <= 0. {
                bail!(AirflowConfigError::NonPositiveZoneGeometry {
                    zone: zone_type,
                    property,
                    value,
                });
            }
        }

        Ok(Self {
            zone_type,
            height: geometry.height,
            floor_area: geometry.floor_area,
            volume: geometry.volume,
            floor_elevation: geometry.floor_elevation,
        })
    }

    pub fn zone_type(&self) -> ZoneType {
        self.zone_type
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn floor_area(&self) -> f64 {
        self.floor_area
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn floor_elevation(&self) -> f64 {
        self.floor_elevation
    }
}

/// The dwelling: exactly one living zone plus at most one of each other zone type
#[derive(Clone, Debug)]
pub struct Building {
    zones: IndexMap<ZoneType, Zone>,
    living: Zone,
    number_of_bedrooms: u32,
    number_of_bathrooms: u32,
    window_area: f64,
    infiltration_height: f64,
}

impl Building {
    pub fn new(input: &BuildingInput) -> anyhow::Result<Self> {
        let zones = input
            .zones
            .iter()
            .map(|(zone_type, geometry)| Ok((*zone_type, Zone::new(*zone_type, geometry)?)))
            .collect::<anyhow::Result<IndexMap<_, _>>>()?;

        let Some(living) = zones.get(&ZoneType::Living).copied() else {
            bail!(AirflowConfigError::MissingLivingZone);
        };

        let infiltration_height = input.infiltration_height.unwrap_or(living.height);
        if infiltration_height <= 0. {
            bail!(AirflowConfigError::NonPositiveZoneGeometry {
                zone: ZoneType::Living,
                property: "infiltration height",
                value: infiltration_height,
            });
        }

        Ok(Self {
            zones,
            living,
            number_of_bedrooms: input.number_of_bedrooms,
            number_of_bathrooms: input.number_of_bathrooms,
            window_area: input.window_area,
            infiltration_height,
        })
    }

    pub fn living(&self) -> &Zone {
        &self.living
    }

    pub fn has_zone(&self, zone_type: ZoneType) -> bool {
        self.zones.contains_key(&zone_type)
    }

    /// All zones other than the living zone, in input order
    pub fn non_living_zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones
            .values()
            .filter(|zone| zone.zone_type != ZoneType::Living)
    }

    pub fn conditioned_floor_area(&self) -> f64 {
        self.living.floor_area
    }

    pub fn conditioned_volume(&self) -> f64 {
        self.living.volume
    }

    pub fn infiltration_height(&self) -> f64 {
        self.infiltration_height
    }

    /// Height of the highest zone ceiling above grade, ft
    pub fn building_height(&self) -> f64 {
        self.zones
            .values()
            .map(|zone| zone.floor_elevation + zone.height)
            .fold(0., f64::max)
    }

    pub fn number_of_bedrooms(&self) -> u32 {
        self.number_of_bedrooms
    }

    pub fn number_of_bathrooms(&self) -> u32 {
        self.number_of_bathrooms
    }

    pub fn window_area(&self) -> f64 {
        self.window_area
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn geometry(height: f64, floor_area: f64, floor_elevation: f64) -> ZoneGeometryInput {
        ZoneGeometryInput {
            height,
            floor_area,
            volume: height * floor_area,
            floor_elevation,
        }
    }

    #[fixture]
    pub fn building_input() -> BuildingInput {
        BuildingInput {
            zones: IndexMap::from([
                (ZoneType::Living, geometry(8., 2000., 0.)),
                (ZoneType::VentedAttic, geometry(6., 2000., 8.)),
                (ZoneType::Garage, geometry(8., 400., 0.)),
            ]),
            number_of_bedrooms: 3,
            number_of_bathrooms: 2,
            window_area: 300.,
            infiltration_height: None,
        }
    }

    #[rstest]
    fn should_build_zones(building_input: BuildingInput) {
        let building = Building::new(&building_input).unwrap();

        assert_eq!(building.conditioned_floor_area(), 2000.);
        assert_eq!(building.conditioned_volume(), 16000.);
        assert_eq!(building.infiltration_height(), 8.);
        assert_eq!(building.building_height(), 14.);
        assert_eq!(
            building
                .non_living_zones()
                .map(|zone| zone.zone_type())
                .collect::<Vec<_>>(),
            vec![ZoneType::VentedAttic, ZoneType::Garage]
        );
        assert!(building.has_zone(ZoneType::Garage));
        assert!(!building.has_zone(ZoneType::VentedCrawlspace));
    }

    #[rstest]
    fn should_require_a_living_zone(mut building_input: BuildingInput) {
        building_input.zones.shift_remove(&ZoneType::Living);
        let error = Building::new(&building_input).unwrap_err();

        assert_eq!(
            error.downcast_ref::<AirflowConfigError>(),
            Some(&AirflowConfigError::MissingLivingZone)
        );
    }

    #[rstest]
    fn should_reject_non_positive_geometry(mut building_input: BuildingInput) {
        building_input.zones[&ZoneType::Garage].volume = 0.;
        let error = Building::new(&building_input).unwrap_err();

        assert_eq!(
            error.downcast_ref::<AirflowConfigError>(),
            Some(&AirflowConfigError::NonPositiveZoneGeometry {
                zone: ZoneType::Garage,
                property: "volume",
                value: 0.,
            })
        );
    }
}
