//! The shipped content directory loads and behaves as designed.

use dungeon::{
    BumpOutcome, ContentLoader, EntityKind, GameLevel, LevelSource, MapData, MemoryDiagnostics,
    MoveResolver, Placement,
};
use hero::{Ability, UpgradeTable};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

fn load(number: u32, diag: &MemoryDiagnostics) -> GameLevel {
    let loader = ContentLoader::open(data_dir(), Rc::new(diag.clone())).unwrap();
    loader.load(number).unwrap()
}

fn index_of(level: &GameLevel, name: &str) -> usize {
    level.find_by_name(name).next().unwrap()
}

fn tile_of(level: &GameLevel, name: &str) -> u32 {
    level.entity(index_of(level, name)).unwrap().tile_id
}

#[test]
fn test_levels_are_numbered_from_one() {
    let loader = ContentLoader::open(data_dir(), Rc::new(MemoryDiagnostics::new())).unwrap();
    assert!(!loader.has_level(0));
    assert!(loader.has_level(1));
    assert!(loader.has_level(2));
    assert!(!loader.has_level(3));
}

#[test]
fn test_first_level_player_uses_definition_stats() {
    let diag = MemoryDiagnostics::new();
    let level = load(1, &diag);
    let player = level.player().unwrap();

    assert_eq!(player.position(), (2, 5));
    assert_eq!(player.stats.health, 10.0);
    assert_eq!(player.stats.attack, 2.0);
    assert_eq!(player.modes, vec!["walk".to_string()]);
    assert!(diag.errors().is_empty());

    let sentry = level.entity(index_of(&level, "sentry1")).unwrap();
    assert_eq!(sentry.kind, EntityKind::Ai);
    assert_eq!(sentry.stats.health, 4.0);
}

#[test]
fn test_placement_names_survive_for_fingers() {
    let level = load(2, &MemoryDiagnostics::new());
    for name in ["sentry1", "sentry2", "door_a", "door_b", "lamp", "console"] {
        assert_eq!(level.find_by_name(name).count(), 1, "{}", name);
    }
}

#[test]
fn test_defined_name_overrides_placement() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("characters.json"),
        r#"{"70": {"name": "warden", "type": "ai", "health": 3}}"#,
    )
    .unwrap();
    let mut map = MapData::filled(4, 4, 1);
    map.objects.push(Placement {
        gid: 70,
        x: 1,
        y: 1,
        name: "guard7".to_string(),
        kind: "door".to_string(),
        ..Placement::default()
    });
    fs::create_dir(dir.path().join("levels")).unwrap();
    fs::write(
        dir.path().join("levels").join("level1.json"),
        serde_json::to_string(&map).unwrap(),
    )
    .unwrap();

    let diag = MemoryDiagnostics::new();
    let loader = ContentLoader::open(dir.path(), Rc::new(diag.clone())).unwrap();
    let level = loader.load(1).unwrap();

    let warden = &level.entities()[0];
    assert_eq!(warden.name, "warden");
    assert_eq!(warden.kind, EntityKind::Ai);
    assert_eq!(warden.stats.health, 3.0);
    assert_eq!(level.find_by_name("guard7").count(), 0);
}

#[test]
fn test_switch_opens_door() {
    let diag = MemoryDiagnostics::new();
    let mut level = load(1, &diag);
    let player = level.player_index().unwrap();
    let switch = index_of(&level, "switch1");
    let resolver = MoveResolver::new(&diag);

    assert!(level.map().blocks(tile_of(&level, "door1")));
    assert_eq!(resolver.bump(&mut level, player, switch), BumpOutcome::Block);
    assert_eq!(tile_of(&level, "door1"), 21);
    assert_eq!(tile_of(&level, "switch1"), 31);
    assert!(!level.map().blocks(21));

    // the switch flips back, the door stays open
    resolver.bump(&mut level, player, switch);
    assert_eq!(tile_of(&level, "switch1"), 30);
    assert_eq!(tile_of(&level, "door1"), 21);
    assert!(diag.lines().iter().any(|l| l == "finger switch1 -> door1"));
}

#[test]
fn test_console_fires_every_finger() {
    let diag = MemoryDiagnostics::new();
    let mut level = load(2, &diag);
    let player = level.player_index().unwrap();
    let console = index_of(&level, "console");

    let outcome = MoveResolver::new(&diag).bump(&mut level, player, console);
    assert_eq!(outcome, BumpOutcome::Pass);
    assert_eq!(tile_of(&level, "door_a"), 21);
    assert_eq!(tile_of(&level, "door_b"), 21);
    assert_eq!(tile_of(&level, "lamp"), 32);
    assert!(diag.errors().is_empty());
}

#[test]
fn test_shipped_upgrade_table_matches_builtin() {
    let table = UpgradeTable::load(&data_dir().join("upgrades.json")).unwrap();
    assert_eq!(table, UpgradeTable::builtin());
    assert_eq!(table.none().name(), "none");
}
