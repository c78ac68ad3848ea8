//! Data models for division records and resolution output.

pub mod division;
pub mod geometry;
pub mod location;

pub use division::{scale_coord, Division, DivisionLevel, ScaledBbox, COORD_SCALE};
pub use geometry::{BoundaryGeometry, MultiPolygonCoords};
pub use location::{
    AdminName, LocationInfo, ResolutionResult, MEMO_INVALID_COORDINATE, MEMO_NOT_FOUND,
};
