//! Grid path search.
//!
//! `find_path` is road-restricted A* (only the two endpoints may be off
//! road). `walk_path` is an unrestricted breadth-first search used for
//! pedestrians and road planning. `PathCache` memoizes A* results per
//! network revision.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use crate::{components::Position, map_gen::MapData, types::EntityId};

/// Neighbour expansion order. Part of the determinism contract.
pub const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Node in the A* open set
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    pos: Position,
    f:   i32,
    seq: u64,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; earlier insertion wins ties.
        other.f.cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn traversable(
    map: &MapData,
    roads: &HashMap<Position, EntityId>,
    pos: Position,
    start: Position,
    goal: Position,
) -> bool {
    if !map.is_passable(pos) {
        return false;
    }
    pos == start || pos == goal || roads.contains_key(&pos)
}

/// Shortest road path from `start` to `goal`, both inclusive.
///
/// Returns None if either endpoint is blocked or no road route exists.
pub fn find_path(
    map: &MapData,
    roads: &HashMap<Position, EntityId>,
    start: Position,
    goal: Position,
) -> Option<Vec<Position>> {
    if !traversable(map, roads, start, start, goal) || !traversable(map, roads, goal, start, goal) {
        return None;
    }

    let mut open = BinaryHeap::new();
    let mut closed: HashSet<Position> = HashSet::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut g_scores: HashMap<Position, i32> = HashMap::new();
    let mut seq = 0u64;

    g_scores.insert(start, 0);
    open.push(OpenNode { pos: start, f: start.manhattan(goal), seq });

    while let Some(current) = open.pop() {
        if current.pos == goal {
            return Some(reconstruct(&came_from, goal));
        }
        if !closed.insert(current.pos) {
            continue;
        }

        let current_g = g_scores.get(&current.pos).copied().unwrap_or(i32::MAX);

        for (dx, dy) in DIRECTIONS {
            let next = current.pos.offset(dx, dy);
            if closed.contains(&next) || !traversable(map, roads, next, start, goal) {
                continue;
            }

            let tentative = current_g + 1;
            if tentative >= g_scores.get(&next).copied().unwrap_or(i32::MAX) {
                continue;
            }

            came_from.insert(next, current.pos);
            g_scores.insert(next, tentative);
            seq += 1;
            open.push(OpenNode { pos: next, f: tentative + next.manhattan(goal), seq });
        }
    }

    None
}

/// Breadth-first walk over passable tiles. `blocked` vetoes extra tiles;
/// the goal itself is never vetoed.
pub fn walk_path<F>(map: &MapData, start: Position, goal: Position, blocked: F) -> Option<Vec<Position>>
where
    F: Fn(Position) -> bool,
{
    let mut frontier = VecDeque::from([start]);
    let mut visited: HashSet<Position> = HashSet::from([start]);
    let mut came_from: HashMap<Position, Position> = HashMap::new();

    while let Some(current) = frontier.pop_front() {
        if current == goal {
            return Some(reconstruct(&came_from, goal));
        }

        for (dx, dy) in DIRECTIONS {
            let next = current.offset(dx, dy);
            if visited.contains(&next) || !map.is_passable(next) {
                continue;
            }
            if next != goal && blocked(next) {
                continue;
            }
            visited.insert(next);
            came_from.insert(next, current);
            frontier.push_back(next);
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<Position, Position>, mut current: Position) -> Vec<Position> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

// ── Cache ─────────────────────────────────────────────────────

type CacheKey = (u64, Position, Position);

/// Road paths memoized per network revision. Failed searches are not
/// stored, so a blocked pair is searched again on the next request.
#[derive(Debug, Clone, Default)]
pub struct PathCache {
    revision: u64,
    entries:  HashMap<CacheKey, Vec<Position>>,
    searches: u64,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of A* searches actually run through this cache.
    pub fn searches(&self) -> u64 {
        self.searches
    }

    /// Drop every entry. Call once per road/building network change.
    pub fn invalidate(&mut self) {
        self.revision += 1;
        self.entries.clear();
    }

    /// Cached road path; callers get their own copy.
    pub fn get_or_find(
        &mut self,
        map: &MapData,
        roads: &HashMap<Position, EntityId>,
        start: Position,
        goal: Position,
    ) -> Option<Vec<Position>> {
        let key = (self.revision, start, goal);
        if let Some(path) = self.entries.get(&key) {
            return Some(path.clone());
        }

        self.searches += 1;
        let path = find_path(map, roads, start, goal)?;
        self.entries.insert(key, path.clone());
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_gen::{generate, MapSize, TerrainKind};

    fn open_map(w: i32, h: i32) -> MapData {
        let mut map = generate(1, MapSize::new(w, h));
        for tile in &mut map.tiles {
            tile.terrain = TerrainKind::Grass;
            tile.passable = true;
        }
        map
    }

    fn roads(tiles: &[(i32, i32)]) -> HashMap<Position, EntityId> {
        tiles
            .iter()
            .enumerate()
            .map(|(i, (x, y))| (Position::new(*x, *y), i as EntityId + 1))
            .collect()
    }

    #[test]
    fn search_stays_on_roads_between_endpoints() {
        let map = open_map(8, 8);
        let network = roads(&[(2, 1), (3, 1), (4, 1)]);
        let path = find_path(&map, &network, Position::new(1, 1), Position::new(4, 2)).unwrap();
        assert_eq!(
            path,
            vec![
                Position::new(1, 1),
                Position::new(2, 1),
                Position::new(3, 1),
                Position::new(4, 1),
                Position::new(4, 2),
            ]
        );
    }

    #[test]
    fn no_road_means_no_path() {
        let map = open_map(8, 8);
        let network = roads(&[]);
        assert!(find_path(&map, &network, Position::new(1, 1), Position::new(5, 1)).is_none());
    }

    #[test]
    fn start_equal_to_goal_is_a_single_tile_path() {
        let map = open_map(4, 4);
        let path = find_path(&map, &roads(&[]), Position::new(2, 2), Position::new(2, 2)).unwrap();
        assert_eq!(path, vec![Position::new(2, 2)]);
    }

    #[test]
    fn walk_path_honours_blocked_tiles_except_goal() {
        let map = open_map(5, 3);
        let wall: HashSet<Position> = [Position::new(2, 0), Position::new(2, 1)].into_iter().collect();
        let path = walk_path(&map, Position::new(0, 0), Position::new(4, 0), |p| wall.contains(&p)).unwrap();
        assert!(path.contains(&Position::new(2, 2)));
        assert_eq!(path.first(), Some(&Position::new(0, 0)));
        assert_eq!(path.last(), Some(&Position::new(4, 0)));

        let direct = walk_path(&map, Position::new(0, 1), Position::new(2, 1), |p| wall.contains(&p)).unwrap();
        assert_eq!(direct.len(), 3);
    }

    #[test]
    fn cache_skips_second_search_until_invalidated() {
        let map = open_map(6, 6);
        let network = roads(&[(1, 0), (2, 0)]);
        let mut cache = PathCache::new();

        let first = cache.get_or_find(&map, &network, Position::new(0, 0), Position::new(3, 0));
        let second = cache.get_or_find(&map, &network, Position::new(0, 0), Position::new(3, 0));
        assert_eq!(first, second);
        assert_eq!(cache.searches(), 1);
        assert_eq!(cache.len(), 1);

        cache.invalidate();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.revision(), 1);

        cache.get_or_find(&map, &network, Position::new(0, 0), Position::new(3, 0));
        assert_eq!(cache.searches(), 2);
    }
}
