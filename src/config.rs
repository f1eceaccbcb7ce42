// Configuration file, all measurements in grid cells (1 cell = 1 unit)
// This controls the initial generation parameter settings

// City extent (cells)
pub const CITY_WIDTH: i32 = 128;
pub const CITY_HEIGHT: i32 = 128;

pub const INITIAL_SEED: u64 = 1512086461918454205;

// Road tiers, narrowest to widest
// tier n carves a road 2n - 1 cells wide
// (min area to host the tier, max area allowed to stay coarser, edge clearance)
// tier 0 is the "no road" entry, only its max is used
pub const ROAD_TIERS: [(i32, i32, i32); 5] = [
    (0, 300, 0),
    (48, 1_600, 3),
    (400, 6_400, 4),
    (2_500, 25_600, 6),
    (10_000, i32::MAX, 8),
];

// Probability of a road using reduced edge clearance
pub const NARROW_CHANCE: f64 = 0.25;

// Tile mesh chunk edge (cells), 32 * 32 quads = 4096 vertices per chunk
pub const CHUNK_SIZE: i32 = 32;
// larger chunks would overflow u16 indices
pub const MAX_CHUNK_SIZE: i32 = 127;

// Property damage, value = volume^1.8 * factor * scale
pub const DAMAGE_SCALE: f64 = 10.0;
pub const DAMAGE_VALUE_MIN: f64 = 0.5;
pub const DAMAGE_VALUE_MAX: f64 = 2.0;
pub const DAMAGE_VALUE_MODE: f64 = 1.0;
pub const DAMAGE_EXPONENT: f64 = 1.8;

// Click-to-damage in the viewer
pub const BLAST_RADIUS: f32 = 3.0;
pub const BLAST_AMOUNT: f32 = 1.0;

// Tile atlas: 2 columns x 3 rows
pub const ATLAS_COLUMNS: f32 = 2.0;
pub const ATLAS_ROWS: f32 = 3.0;

// Raw corner UVs per tile type, in atlas cell units
// corner order: (x0, y0), (x1, y0), (x1, y1), (x0, y1)
// order matches Tile: empty, lot, intersection, vertical road, horizontal road, curb
pub const TILE_ATLAS: [[[f32; 2]; 4]; 6] = [
    [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
    [[1.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0]],
    [[0.0, 1.0], [1.0, 1.0], [1.0, 2.0], [0.0, 2.0]],
    // vertical road reuses the horizontal road cell, rotated a quarter turn
    [[2.0, 1.0], [2.0, 2.0], [1.0, 2.0], [1.0, 1.0]],
    [[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0]],
    [[0.0, 2.0], [1.0, 2.0], [1.0, 3.0], [0.0, 3.0]],
];

// Building models shipped with the viewer
// (name, local min corner, local max corner), z is height
pub const BUILDING_MODELS: [(&str, [f32; 3], [f32; 3]); 12] = [
    ("bld_1", [0.0, 0.0, 0.0], [1.0, 1.0, 1.5]),
    ("bld_2", [0.0, 0.0, 0.0], [1.0, 1.0, 2.5]),
    ("bld_3", [-0.5, 0.0, 0.0], [1.5, 1.0, 2.0]),
    ("bld_4", [0.0, 0.0, 0.0], [1.0, 2.0, 3.0]),
    ("bld_5", [0.0, 0.0, 0.0], [2.0, 2.0, 3.0]),
    ("bld_6", [-1.0, -1.0, 0.0], [1.0, 1.0, 5.0]),
    ("bld_7", [0.0, 0.0, 0.0], [3.0, 2.0, 4.0]),
    ("bld_8", [0.0, 0.0, 0.0], [2.0, 3.0, 6.0]),
    ("bld_9", [0.0, 0.0, 0.0], [3.0, 3.0, 8.0]),
    ("bld_10", [0.0, -0.5, 0.0], [4.0, 2.5, 10.0]),
    ("bld_11", [0.0, 0.0, 0.0], [4.0, 3.0, 7.0]),
    // not a building, ignored by the catalog
    ("prop_antenna", [0.0, 0.0, 0.0], [0.2, 0.2, 3.0]),
];

// Model looked up for the intro landmark
pub const LANDMARK_MODEL: &str = "bld_10";
