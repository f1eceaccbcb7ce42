// the generation core, no ECS in here

pub mod catalog;
pub mod cells;
pub mod error;
pub mod mesh_gen;
pub mod placement;
pub mod road;
pub mod tiles;
pub mod utils;
