use std::fmt;

/// Failures surfaced to the caller of the generator.
/// Everything else (unfit roads, unplaceable lots) is recovered where it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CityGenError {
    InvalidDimensions { width: i32, height: i32 },
    InvalidConfig(String),
    UnknownBuilding(String),
    EmptyCatalog,
}

impl fmt::Display for CityGenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CityGenError::InvalidDimensions { width, height } => {
                write!(f, "invalid area size {}x{}: both sides must be positive", width, height)
            }
            CityGenError::InvalidConfig(reason) => {
                write!(f, "invalid generation config: {}", reason)
            }
            CityGenError::UnknownBuilding(name) => {
                write!(f, "building catalog has no entry named {:?}", name)
            }
            CityGenError::EmptyCatalog => write!(f, "building catalog is empty"),
        }
    }
}

impl std::error::Error for CityGenError {}

pub fn check_dimensions(width: i32, height: i32) -> Result<(), CityGenError> {
    if width <= 0 || height <= 0 {
        return Err(CityGenError::InvalidDimensions { width, height });
    }
    Ok(())
}
