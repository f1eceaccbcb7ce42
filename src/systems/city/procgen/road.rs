use bevy::prelude::*;
use rand::Rng;
use rand::rngs::StdRng;

use super::error::{check_dimensions, CityGenError};
use super::utils::Dir;

/// One road size class. A tier `n` road is `2n - 1` cells wide.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoadTier {
    /// smallest block area allowed to host this tier
    pub min: i32,
    /// largest block area allowed to stay coarser than this tier
    pub max: i32,
    /// clearance between the road and the block edges
    pub dist: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoadConfig {
    /// tier 0 is the "no road" entry
    pub tiers: Vec<RoadTier>,
    pub narrow_chance: f64,
}

impl RoadConfig {
    pub fn from_table(table: &[(i32, i32, i32)], narrow_chance: f64) -> Self {
        Self {
            tiers: table.iter().map(|&(min, max, dist)| RoadTier { min, max, dist }).collect(),
            narrow_chance,
        }
    }

    fn validate(&self) -> Result<(), CityGenError> {
        if self.tiers.is_empty() {
            return Err(CityGenError::InvalidConfig("no road tiers".to_string()));
        }
        if !(0.0..=1.0).contains(&self.narrow_chance) {
            return Err(CityGenError::InvalidConfig(format!(
                "narrow chance {} outside [0, 1]",
                self.narrow_chance
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct IntersectionId(pub usize);

/// A node of the road graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Intersection {
    pub pos: IVec2,
    /// neighbour in each direction, indexed by `Dir`
    pub links: [Option<IntersectionId>; 4],
    /// road tier towards each neighbour, 0 when unlinked
    pub sizes: [i32; 4],
    pub owned: bool,
}

impl Intersection {
    fn new(pos: IVec2) -> Self {
        Self {
            pos,
            links: [None; 4],
            sizes: [0; 4],
            owned: false,
        }
    }

    pub fn link(&self, dir: Dir) -> Option<IntersectionId> {
        self.links[dir.index()]
    }

    pub fn size(&self, dir: Dir) -> i32 {
        self.sizes[dir.index()]
    }
}

/// A rectangle of the subdivision, `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    /// an intersection on the road along each side, indexed by `Dir`
    pub edges: [Option<IntersectionId>; 4],
}

impl Block {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            edges: [None; 4],
        }
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> i32 {
        self.width() * self.height()
    }

    pub fn edge(&self, dir: Dir) -> Option<IntersectionId> {
        self.edges[dir.index()]
    }

    fn with_edge(mut self, dir: Dir, node: IntersectionId) -> Self {
        self.edges[dir.index()] = Some(node);
        self
    }
}

/// Edge clearance for a tier, reduced on narrow roads but never flush with the edge.
fn clearance(tier: &RoadTier, narrow: bool) -> i32 {
    if narrow {
        (tier.dist / 2).max(1)
    } else {
        tier.dist.max(2)
    }
}

// per-block subdivision state
enum Step {
    Pick,
    Try { tier: usize, narrow: bool },
    Carve { tier: usize, narrow: bool, dist: i32, index: i32, nx: i32 },
    Leaf,
}

/// Recursive subdivision of a `width x height` area into roads and blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadNetwork {
    pub width: i32,
    pub height: i32,
    nodes: Vec<Intersection>,
    intersections: Vec<IntersectionId>,
    blocks: Vec<Block>,
}

impl RoadNetwork {
    /// Random draws, per block: tier, narrow roll, then one position index per carve.
    pub fn build(
        width: i32,
        height: i32,
        config: &RoadConfig,
        rng: &mut StdRng,
    ) -> Result<Self, CityGenError> {
        check_dimensions(width, height)?;
        config.validate()?;

        let mut network = Self {
            width,
            height,
            nodes: Vec::new(),
            intersections: Vec::new(),
            blocks: Vec::new(),
        };
        network.subdivide(config, Block::new(0, 0, width, height), config.tiers.len() - 1, rng);

        info!(
            "road network {}x{}: {} blocks, {} intersections",
            width,
            height,
            network.blocks.len(),
            network.intersections.len()
        );
        Ok(network)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Intersections in registration order.
    pub fn intersections(&self) -> impl Iterator<Item = (IntersectionId, &Intersection)> + '_ {
        self.intersections.iter().map(|&id| (id, &self.nodes[id.0]))
    }

    pub fn intersection_count(&self) -> usize {
        self.intersections.len()
    }

    pub fn node(&self, id: IntersectionId) -> &Intersection {
        &self.nodes[id.0]
    }

    fn subdivide(
        &mut self,
        config: &RoadConfig,
        block: Block,
        mut road_max: usize,
        rng: &mut StdRng,
    ) {
        let tiers = &config.tiers;
        let (bw, bh) = (block.width(), block.height());
        let area = block.area();
        let mut step = Step::Pick;

        loop {
            step = match step {
                Step::Pick => {
                    while road_max > 0 && area < tiers[road_max].min {
                        road_max -= 1;
                    }
                    if road_max == 0 {
                        Step::Leaf
                    } else {
                        let mut road_min = 0;
                        while road_min < road_max && area > tiers[road_min].max {
                            road_min += 1;
                        }
                        let tier = rng.random_range(road_min..=road_max);
                        let narrow = rng.random_bool(config.narrow_chance);
                        Step::Try { tier, narrow }
                    }
                }
                Step::Try { tier: 0, .. } => Step::Leaf,
                Step::Try { tier, narrow } => {
                    let dist = clearance(&tiers[tier], narrow);
                    let road_width = tier as i32 * 2 - 1;
                    let nx = (bw + 1 - 2 * dist - road_width).max(0);
                    let ny = (bh + 1 - 2 * dist - road_width).max(0);
                    if nx + ny == 0 {
                        Step::Try { tier: tier - 1, narrow }
                    } else {
                        let index = rng.random_range(0..nx + ny);
                        Step::Carve { tier, narrow, dist, index, nx }
                    }
                }
                Step::Carve {
                    tier,
                    narrow,
                    dist,
                    index,
                    nx,
                } => match self.carve(&block, tier, dist, index, nx) {
                    Some((b1, b2)) => {
                        self.subdivide(config, b1, tier, rng);
                        self.subdivide(config, b2, tier, rng);
                        return;
                    }
                    None => Step::Try { tier: tier - 1, narrow },
                },
                Step::Leaf => {
                    self.blocks.push(block);
                    return;
                }
            };
        }
    }

    // cut one road through the block, returning the two halves
    fn carve(
        &mut self,
        block: &Block,
        tier: usize,
        dist: i32,
        index: i32,
        nx: i32,
    ) -> Option<(Block, Block)> {
        let size = tier as i32;
        let road_width = size * 2 - 1;

        let (n1, n2, b1, b2) = if index < nx {
            // road running along y
            let x0 = block.x0 + dist + index;
            let x1 = x0 + road_width;
            if x0 - block.x0 < dist || block.x1 - x1 < dist {
                warn!("invalid subdivision along x: index {} of {}", index, nx);
                return None;
            }
            let xc = x0 + size - 1;
            let n1 = self.split_x(block.edge(Dir::NegY), xc, block.y0 - 1);
            let n2 = self.split_x(block.edge(Dir::PosY), xc, block.y1);
            self.link(n1, Dir::PosY, n2, size);
            let b1 = Block { x1: x0, ..*block }.with_edge(Dir::PosX, n1);
            let b2 = Block { x0: x1, ..*block }.with_edge(Dir::NegX, n1);
            (n1, n2, b1, b2)
        } else {
            // road running along x
            let index = index - nx;
            let ny = (block.height() + 1 - 2 * dist - road_width).max(0);
            let y0 = block.y0 + dist + index;
            let y1 = y0 + road_width;
            if y0 - block.y0 < dist || block.y1 - y1 < dist {
                warn!("invalid subdivision along y: index {} of {}", index, ny);
                return None;
            }
            let yc = y0 + size - 1;
            let n1 = self.split_y(block.edge(Dir::NegX), block.x0 - 1, yc);
            let n2 = self.split_y(block.edge(Dir::PosX), block.x1, yc);
            self.link(n1, Dir::PosX, n2, size);
            let b1 = Block { y1: y0, ..*block }.with_edge(Dir::PosY, n1);
            let b2 = Block { y0: y1, ..*block }.with_edge(Dir::NegY, n1);
            (n1, n2, b1, b2)
        };

        self.register(n1);
        self.register(n2);
        Some((b1, b2))
    }

    fn push_node(&mut self, pos: IVec2) -> IntersectionId {
        self.nodes.push(Intersection::new(pos));
        IntersectionId(self.nodes.len() - 1)
    }

    /// Connect `a` towards `dir` with `b`, writing both sides.
    fn link(&mut self, a: IntersectionId, dir: Dir, b: IntersectionId, size: i32) {
        let back = dir.opposite();
        self.nodes[a.0].links[dir.index()] = Some(b);
        self.nodes[a.0].sizes[dir.index()] = size;
        self.nodes[b.0].links[back.index()] = Some(a);
        self.nodes[b.0].sizes[back.index()] = size;
    }

    fn register(&mut self, id: IntersectionId) {
        let node = &mut self.nodes[id.0];
        if node.owned {
            return;
        }
        node.owned = true;
        self.intersections.push(id);
    }

    /// Find or insert the node at `x` on the x-running road through `start`.
    fn split_x(&mut self, start: Option<IntersectionId>, x: i32, y: i32) -> IntersectionId {
        self.split(start, IVec2::new(x, y), Dir::PosX)
    }

    /// Find or insert the node at `y` on the y-running road through `start`.
    fn split_y(&mut self, start: Option<IntersectionId>, x: i32, y: i32) -> IntersectionId {
        self.split(start, IVec2::new(x, y), Dir::PosY)
    }

    fn split(
        &mut self,
        start: Option<IntersectionId>,
        target: IVec2,
        forward: Dir,
    ) -> IntersectionId {
        let Some(mut node) = start else {
            return self.push_node(target);
        };
        let back = forward.opposite();
        // coordinate along the road
        let axis = |p: IVec2| if forward == Dir::PosX { p.x } else { p.y };
        let goal = axis(target);

        while axis(self.nodes[node.0].pos) < goal {
            match self.nodes[node.0].link(forward) {
                Some(next) => node = next,
                None => break,
            }
        }
        while axis(self.nodes[node.0].pos) > goal {
            match self.nodes[node.0].link(back) {
                Some(prev) => node = prev,
                None => break,
            }
        }
        if axis(self.nodes[node.0].pos) == goal {
            return node;
        }

        let (before, after) = if axis(self.nodes[node.0].pos) < goal {
            (Some(node), self.nodes[node.0].link(forward))
        } else {
            (self.nodes[node.0].link(back), Some(node))
        };

        match (before, after) {
            (Some(before), Some(after)) => {
                let size = self.nodes[before.0].size(forward);
                // the new node sits on the road's centerline
                let mut pos = self.nodes[before.0].pos;
                if forward == Dir::PosX {
                    pos.x = goal;
                } else {
                    pos.y = goal;
                }
                let id = self.push_node(pos);
                self.link(before, forward, id, size);
                self.link(id, forward, after, size);
                id
            }
            _ => self.push_node(target),
        }
    }

    /// Text rendering of the tile grid, top row first.
    pub fn to_ascii(&self) -> String {
        let tiles = super::tiles::tile_grid(self);
        let mut lines = Vec::with_capacity(self.height as usize);
        for y in (0..self.height).rev() {
            let line: String = (0..self.width)
                .map(|x| tiles.get(x, y).map_or(' ', |t| t.ascii()))
                .collect();
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn config() -> RoadConfig {
        RoadConfig::from_table(&crate::config::ROAD_TIERS, crate::config::NARROW_CHANCE)
    }

    #[test]
    fn single_tier_never_subdivides() {
        let config = RoadConfig::from_table(&[(1, 64, 1)], 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let network = RoadNetwork::build(8, 8, &config, &mut rng).unwrap();
        assert_eq!(network.blocks(), &[Block::new(0, 0, 8, 8)]);
        assert_eq!(network.intersection_count(), 0);
    }

    #[test]
    fn rejects_bad_input() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            RoadNetwork::build(0, 8, &config(), &mut rng),
            Err(CityGenError::InvalidDimensions { width: 0, height: 8 })
        );
        let empty = RoadConfig { tiers: Vec::new(), narrow_chance: 0.0 };
        assert!(matches!(
            RoadNetwork::build(8, 8, &empty, &mut rng),
            Err(CityGenError::InvalidConfig(_))
        ));
        let too_narrow = RoadConfig {
            narrow_chance: 1.5,
            ..config()
        };
        assert!(matches!(
            RoadNetwork::build(8, 8, &too_narrow, &mut rng),
            Err(CityGenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn forced_single_cut_links_both_ends() {
        // one tier-1 road, area too large to stay unsplit, small halves stay leaves
        let config = RoadConfig::from_table(&[(0, 20, 0), (30, 1000, 2)], 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        let network = RoadNetwork::build(9, 4, &config, &mut rng).unwrap();

        assert_eq!(network.blocks().len(), 2);
        assert_eq!(network.intersection_count(), 2);
        let (a, b) = (&network.blocks()[0], &network.blocks()[1]);
        // a 1-wide road runs between the two blocks
        assert_eq!(a.area() + b.area() + 4, 36);

        let (id, first) = network.intersections().next().unwrap();
        let other = first.link(Dir::PosY).unwrap();
        assert_eq!(network.node(other).link(Dir::NegY), Some(id));
        assert_eq!(first.size(Dir::PosY), 1);
        assert_eq!(first.pos.y, -1);
        assert_eq!(network.node(other).pos.y, 4);
    }

    #[test]
    fn split_reuses_and_splices() {
        let mut network = RoadNetwork {
            width: 10,
            height: 10,
            nodes: Vec::new(),
            intersections: Vec::new(),
            blocks: Vec::new(),
        };
        let left = network.split_x(None, -1, 5);
        let right = network.split_x(None, 10, 5);
        network.link(left, Dir::PosX, right, 3);

        assert_eq!(network.split_x(Some(right), 10, 0), right);

        let mid = network.split_x(Some(right), 4, 0);
        assert_eq!(network.node(mid).pos, IVec2::new(4, 5));
        assert_eq!(network.node(left).link(Dir::PosX), Some(mid));
        assert_eq!(network.node(right).link(Dir::NegX), Some(mid));
        assert_eq!(network.node(mid).sizes, [3, 0, 3, 0]);

        // walking from either end finds the spliced node
        assert_eq!(network.split_x(Some(left), 4, 0), mid);
        let quarter = network.split_x(Some(right), 2, 0);
        assert_eq!(network.node(quarter).link(Dir::NegX), Some(left));
        assert_eq!(network.node(quarter).link(Dir::PosX), Some(mid));
    }

    #[test]
    fn split_y_walks_downward() {
        let mut network = RoadNetwork {
            width: 10,
            height: 10,
            nodes: Vec::new(),
            intersections: Vec::new(),
            blocks: Vec::new(),
        };
        let bottom = network.split_y(None, 3, -1);
        let top = network.split_y(None, 3, 10);
        network.link(bottom, Dir::PosY, top, 2);
        let mid = network.split_y(Some(top), 0, 6);
        assert_eq!(network.node(mid).pos, IVec2::new(3, 6));
        assert_eq!(network.node(top).link(Dir::NegY), Some(mid));
        assert_eq!(network.node(mid).size(Dir::NegY), 2);
    }

    #[test]
    fn ascii_shows_roads_and_lots() {
        let config = RoadConfig::from_table(&[(0, 20, 0), (30, 1000, 2)], 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        let network = RoadNetwork::build(9, 4, &config, &mut rng).unwrap();
        let ascii = network.to_ascii();
        assert_eq!(ascii.lines().count(), 4);
        assert!(ascii.lines().all(|l| l.chars().count() == 9));
        assert_eq!(ascii.chars().filter(|&c| c == '.').count(), 4);
        assert_eq!(ascii.chars().filter(|&c| c == '#').count(), 32);
    }
}
