//! Road-restricted A*, the pedestrian walk, and the path cache.

use std::collections::HashMap;

use agentworks_core::{
    blueprint::BlueprintSet,
    components::{BuildingKind, Position},
    map_gen::{MapData, TerrainKind, TerrainTile},
    pathfinder::{find_path, walk_path, PathCache},
    types::EntityId,
    world::World,
};

fn grass_map(width: i32, height: i32) -> MapData {
    let tile = TerrainTile { terrain: TerrainKind::Grass, passable: true };
    MapData { width, height, tiles: vec![tile; (width * height) as usize] }
}

fn flood(map: &mut MapData, pos: Position) {
    if let Some(tile) = map.tile_mut(pos) {
        tile.terrain = TerrainKind::Water;
        tile.passable = false;
    }
}

fn roads(tiles: &[(i32, i32)]) -> HashMap<Position, EntityId> {
    tiles
        .iter()
        .enumerate()
        .map(|(i, (x, y))| (Position::new(*x, *y), i as EntityId + 1))
        .collect()
}

fn assert_contiguous(path: &[Position]) {
    for pair in path.windows(2) {
        assert_eq!(pair[0].manhattan(pair[1]), 1, "gap between {} and {}", pair[0], pair[1]);
    }
}

#[test]
fn path_stays_on_roads_between_endpoints() {
    let map = grass_map(10, 10);
    // An L-shaped road; the direct diagonal is open grass but not road.
    let network = roads(&[(2, 1), (3, 1), (4, 1), (4, 2), (4, 3), (4, 4)]);

    let path = find_path(&map, &network, Position::new(1, 1), Position::new(5, 4)).expect("path");

    assert_eq!(path.first(), Some(&Position::new(1, 1)));
    assert_eq!(path.last(), Some(&Position::new(5, 4)));
    assert_eq!(path.len(), 8);
    assert_contiguous(&path);
    for interior in &path[1..path.len() - 1] {
        assert!(network.contains_key(interior), "{interior} is off road");
    }
}

#[test]
fn broken_road_yields_no_path() {
    let map = grass_map(10, 10);
    let network = roads(&[(2, 1), (3, 1), (5, 1), (6, 1)]);
    assert_eq!(find_path(&map, &network, Position::new(1, 1), Position::new(7, 1)), None);
}

#[test]
fn impassable_endpoint_yields_no_path() {
    let mut map = grass_map(6, 6);
    flood(&mut map, Position::new(4, 1));
    let network = roads(&[(2, 1), (3, 1)]);
    assert_eq!(find_path(&map, &network, Position::new(1, 1), Position::new(4, 1)), None);
}

#[test]
fn same_tile_is_a_single_node_path() {
    let map = grass_map(4, 4);
    let path = find_path(&map, &HashMap::new(), Position::new(2, 2), Position::new(2, 2));
    assert_eq!(path, Some(vec![Position::new(2, 2)]));
}

#[test]
fn equal_length_routes_resolve_identically() {
    let map = grass_map(8, 8);
    // A full road block gives many shortest routes.
    let mut tiles = Vec::new();
    for y in 1..6 {
        for x in 1..6 {
            tiles.push((x, y));
        }
    }
    let network = roads(&tiles);

    let first = find_path(&map, &network, Position::new(1, 1), Position::new(5, 5)).expect("path");
    for _ in 0..5 {
        let again = find_path(&map, &network, Position::new(1, 1), Position::new(5, 5)).expect("path");
        assert_eq!(again, first);
    }
    assert_eq!(first.len(), 9);
    assert_contiguous(&first);
}

#[test]
fn walk_goes_around_water_and_ignores_roads() {
    let mut map = grass_map(7, 5);
    for y in 0..4 {
        flood(&mut map, Position::new(3, y));
    }

    let path = walk_path(&map, Position::new(1, 1), Position::new(5, 1), |_| false).expect("walk");

    assert_contiguous(&path);
    assert!(path.contains(&Position::new(3, 4)), "must cross at the only gap");
    assert!(path.iter().all(|p| map.is_passable(*p)));
}

#[test]
fn walk_veto_never_applies_to_the_goal() {
    let map = grass_map(5, 1);
    let goal = Position::new(4, 0);
    let path = walk_path(&map, Position::new(0, 0), goal, |pos| pos == goal);
    assert_eq!(path.map(|p| p.len()), Some(5));

    let walled = walk_path(&map, Position::new(0, 0), goal, |pos| pos == Position::new(2, 0));
    assert_eq!(walled, None);
}

#[test]
fn cache_serves_repeats_until_invalidated() {
    let map = grass_map(10, 10);
    let network = roads(&[(2, 1), (3, 1), (4, 1)]);
    let mut cache = PathCache::new();

    let a = cache.get_or_find(&map, &network, Position::new(1, 1), Position::new(5, 1));
    let b = cache.get_or_find(&map, &network, Position::new(1, 1), Position::new(5, 1));
    assert_eq!(a, b);
    assert_eq!(cache.searches(), 1);
    assert_eq!(cache.len(), 1);

    let revision = cache.revision();
    cache.invalidate();
    assert_eq!(cache.revision(), revision + 1);
    assert!(cache.is_empty());

    cache.get_or_find(&map, &network, Position::new(1, 1), Position::new(5, 1));
    assert_eq!(cache.searches(), 2);
}

#[test]
fn failed_searches_are_not_cached() {
    let map = grass_map(10, 10);
    let mut cache = PathCache::new();

    assert_eq!(cache.get_or_find(&map, &HashMap::new(), Position::new(1, 1), Position::new(5, 1)), None);
    assert_eq!(cache.get_or_find(&map, &HashMap::new(), Position::new(1, 1), Position::new(5, 1)), None);
    assert_eq!(cache.searches(), 2);
    assert!(cache.is_empty());
}

#[test]
fn world_road_path_sees_roads_built_after_invalidation() {
    let mut world = World::empty(1, grass_map(10, 10), 500, BlueprintSet::default());
    world.add_building(BuildingKind::Market, Position::new(1, 1), None, 0);
    world.add_building(BuildingKind::Housing, Position::new(5, 1), None, 0);

    assert_eq!(world.road_path(Position::new(1, 1), Position::new(5, 1)), None);

    for x in 2..5 {
        world.add_road(Position::new(x, 1), None);
    }
    world.invalidate_paths();

    let path = world.road_path(Position::new(1, 1), Position::new(5, 1)).expect("connected");
    assert_eq!(path.len(), 5);
}
