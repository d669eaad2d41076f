use super::*;
use chrono::TimeZone;
use shared::domain::AgentId;

fn paths(dir: &tempfile::TempDir) -> (PathBuf, PathBuf) {
    (dir.path().join("clips.json"), dir.path().join("clips.txt"))
}

fn actions(value: f32) -> ActionMap {
    ActionMap::from([(AgentId::new("blue"), vec![value])])
}

#[test]
fn opening_creates_missing_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (clip_path, legend_path) = paths(&dir);
    let nested = dir.path().join("store").join("clips.json");

    let library = ClipLibrary::open(&clip_path, &legend_path).expect("open");
    assert!(library.is_empty());
    assert!(clip_path.exists());
    assert!(legend_path.exists());

    ClipLibrary::open(&nested, dir.path().join("store").join("clips.txt")).expect("nested");
    assert!(nested.exists());
}

#[test]
fn registered_clips_are_saved_with_a_legend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (clip_path, legend_path) = paths(&dir);
    let library = ClipLibrary::open(&clip_path, &legend_path).expect("open");

    let first = library
        .register(GameState::at_tick(3), vec![actions(1.0), actions(2.0)])
        .expect("first");
    let second = library.register(GameState::at_tick(9), vec![]).expect("second");
    assert!(first.starts_with("Clip_"));

    let legend = fs::read_to_string(&legend_path).expect("legend");
    assert_eq!(legend, format!("0 - {first}\n1 - {second}\n"));

    let stored = read_clips(&clip_path).expect("read");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].starting_state, GameState::at_tick(3));
    assert_eq!(stored[0].actions, vec![actions(1.0), actions(2.0)]);
}

#[test]
fn unload_keeps_files_and_reload_restores() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (clip_path, legend_path) = paths(&dir);
    let library = ClipLibrary::open(&clip_path, &legend_path).expect("open");
    library.register(GameState::default(), vec![actions(0.5)]).expect("register");

    library.unload();
    assert!(library.is_empty());
    assert_eq!(library.reload().expect("reload"), 1);
    assert_eq!(library.get(0).map(|clip| clip.len()), Some(1));

    let reopened = ClipLibrary::open(&clip_path, &legend_path).expect("reopen");
    assert_eq!(reopened.names(), library.names());
}

#[test]
fn corrupt_clip_file_is_a_json_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (clip_path, legend_path) = paths(&dir);
    fs::write(&clip_path, "not json").expect("write");

    let error = ClipLibrary::open(&clip_path, &legend_path).err().expect("corrupt");
    assert!(matches!(error, ClipStoreError::Json { .. }));
    assert!(error.to_string().contains("clips.json"));
}

#[test]
fn clip_names_use_day_before_month() {
    let at = Local
        .with_ymd_and_hms(2024, 3, 7, 14, 5, 9)
        .single()
        .expect("local time");
    assert_eq!(clip_name(at), "Clip_20240703140509000000");
}
