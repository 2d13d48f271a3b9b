use std::fs;
use std::path::Path;

use pipeline_slicer::commands::display_relative;
use pipeline_slicer::{canonicalize_or_current, infer_project_name, init_logging};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let original = std::env::current_dir().expect("cwd");
    let tmp = tempdir().expect("tempdir");
    std::env::set_current_dir(tmp.path()).expect("chdir tmp");

    let result = canonicalize_or_current(".").expect("canonicalize").canonicalize().expect("canon");
    let expected = tmp.path().canonicalize().expect("canon tmp");
    assert_eq!(result, expected);

    std::env::set_current_dir(original).expect("restore cwd");
}

#[test]
fn canonicalize_or_current_resolves_existing_absolute_path() {
    let tmp = tempdir().expect("tempdir");
    let subdir = tmp.path().join("nested");
    fs::create_dir_all(&subdir).expect("create nested");

    let result = canonicalize_or_current(subdir.to_str().unwrap()).expect("canonicalize nested");
    assert_eq!(result, subdir.canonicalize().expect("canonicalize subdir"));
}

#[test]
fn infer_project_name_uses_last_path_component() {
    assert_eq!(infer_project_name(Path::new("C:/work/storefront")), "storefront");
    assert_eq!(infer_project_name(Path::new("/tmp/project-root")), "project-root");
}

#[test]
fn infer_project_name_falls_back_when_missing() {
    assert_eq!(infer_project_name(Path::new("/")), "unnamed-pipeline");
}

#[test]
fn display_relative_strips_the_root_when_possible() {
    let root = Path::new("/work/project");
    assert_eq!(display_relative(Path::new("/work/project/dist/x.json"), root), "dist/x.json");
    assert_eq!(display_relative(Path::new("/elsewhere/y.ts"), root), "/elsewhere/y.ts");
}

#[test]
fn init_logging_can_be_called_twice() {
    init_logging(false);
    init_logging(true);
}
