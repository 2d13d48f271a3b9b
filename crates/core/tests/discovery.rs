use std::fs;

use pipeline_core::discovery::{discover, file_name_regex, DiscoveryError, FilePattern};
use tempfile::tempdir;

fn touch(dir: &std::path::Path, rel: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "export {};\n").unwrap();
}

#[test]
fn discovers_sorted_unique_absolute_paths() {
    let dir = tempdir().unwrap();
    touch(dir.path(), "resolvers/b.ts");
    touch(dir.path(), "resolvers/a.ts");
    touch(dir.path(), "resolvers/notes.md");
    touch(dir.path(), "resolvers/nested/c.ts");

    let patterns = vec!["resolvers/*.ts".to_string(), "./resolvers/a.ts".to_string()];
    let files = discover(&patterns, dir.path()).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.ts", "b.ts"]);
    assert!(files.iter().all(|p| p.is_absolute()));
}

#[test]
fn no_matches_error_lists_every_pattern() {
    let dir = tempdir().unwrap();
    let patterns = vec!["nowhere/*.ts".to_string(), "src/*.resolver.ts".to_string()];
    let err = discover(&patterns, dir.path()).unwrap_err();
    assert!(matches!(err, DiscoveryError::NoMatches { .. }));
    let message = err.to_string();
    assert!(message.contains("nowhere/*.ts"));
    assert!(message.contains("src/*.resolver.ts"));
}

#[test]
fn question_mark_matches_exactly_one_character() {
    let pattern = FilePattern::parse("r/step?.ts", std::path::Path::new("/tmp")).unwrap();
    assert!(pattern.matches("step1.ts"));
    assert!(!pattern.matches("step10.ts"));
    assert!(!pattern.matches("step.ts"));
    assert_eq!(file_name_regex("a.*"), "^a\\..*$");
}

#[test]
fn missing_base_directory_expands_to_nothing() {
    let dir = tempdir().unwrap();
    let pattern = FilePattern::parse("missing/*.ts", dir.path()).unwrap();
    assert!(pattern.expand().unwrap().is_empty());
}

#[test]
fn unsupported_patterns_are_rejected() {
    let root = std::path::Path::new("/project");
    for bad in ["src/**/*.ts", "src/*/x.ts", "", "src/"] {
        let err = FilePattern::parse(bad, root).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidPattern { .. }), "{bad} should be invalid");
    }
}
