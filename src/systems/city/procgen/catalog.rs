use bevy::math::bounding::Aabb3d;
use bevy::prelude::*;

use super::error::CityGenError;

/// A named model as delivered by the asset pipeline.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub name: String,
    pub bounds: Aabb3d,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, min: Vec3, max: Vec3) -> Self {
        Self {
            name: name.into(),
            bounds: super::utils::aabb_from_corners(min, max),
        }
    }
}

/// One visual variant of a building, snapped to the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingFootprint {
    pub name: String,
    pub size: IVec2,
    // floored min corner of the model bounds
    pub offset: IVec2,
    pub bounds: Aabb3d,
}

impl BuildingFootprint {
    fn from_entry(entry: &CatalogEntry) -> Self {
        let min = Vec3::from(entry.bounds.min);
        let max = Vec3::from(entry.bounds.max);
        let x0 = min.x.floor() as i32;
        let y0 = min.y.floor() as i32;
        let x1 = max.x.ceil() as i32;
        let y1 = max.y.ceil() as i32;
        Self {
            name: entry.name.clone(),
            size: IVec2::new(x1 - x0, y1 - y0),
            offset: IVec2::new(x0, y0),
            bounds: entry.bounds,
        }
    }

    pub fn roof_height(&self) -> f32 {
        self.bounds.max.z
    }
}

/// All variants sharing one grid size.
#[derive(Clone, Debug, PartialEq)]
pub struct FootprintSize {
    pub size: IVec2,
    pub variants: Vec<BuildingFootprint>,
}

/// Building footprints grouped by grid size, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildingCatalog {
    sizes: Vec<FootprintSize>,
}

// model names look like bld_12
fn is_building_name(name: &str) -> bool {
    match name.strip_prefix("bld_") {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

impl BuildingCatalog {
    pub fn new(entries: &[CatalogEntry]) -> Result<Self, CityGenError> {
        let mut sizes: Vec<FootprintSize> = Vec::new();

        for entry in entries.iter().filter(|e| is_building_name(&e.name)) {
            let footprint = BuildingFootprint::from_entry(entry);
            if footprint.size.x <= 0 || footprint.size.y <= 0 {
                return Err(CityGenError::InvalidConfig(format!(
                    "model {:?} has an empty footprint",
                    entry.name
                )));
            }

            match sizes.iter_mut().find(|s| s.size == footprint.size) {
                Some(group) => group.variants.push(footprint),
                None => sizes.push(FootprintSize {
                    size: footprint.size,
                    variants: vec![footprint],
                }),
            }
        }

        if sizes.is_empty() {
            return Err(CityGenError::EmptyCatalog);
        }

        Ok(Self { sizes })
    }

    pub fn sizes(&self) -> &[FootprintSize] {
        &self.sizes
    }

    pub fn footprint(&self, name: &str) -> Result<&BuildingFootprint, CityGenError> {
        self.sizes
            .iter()
            .flat_map(|s| s.variants.iter())
            .find(|f| f.name == name)
            .ok_or_else(|| CityGenError::UnknownBuilding(name.to_string()))
    }

    pub fn variant_count(&self) -> usize {
        self.sizes.iter().map(|s| s.variants.len()).sum()
    }
}
