//! Integration tests for the Vagrant VM registry and hostname allocation

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use oct::hostname::{DEFAULT_HOSTNAME, next_available};
use oct::vagrant::{GROUPS_FILE, VARIABLES_FILE, scan};

fn provision(root: &Path, name: &str, groups: Option<&str>) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(VARIABLES_FILE), "---\norigin_ci_vagrant_provider: libvirt\n").unwrap();
    if let Some(groups) = groups {
        fs::write(dir.join(GROUPS_FILE), groups).unwrap();
    }
}

#[test]
fn test_missing_root_is_created_and_empty() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("vagrant");

    let registry = scan(&root).unwrap();
    assert!(registry.is_empty());
    assert!(root.is_dir());
    assert_eq!(registry.root(), root.as_path());

    // Scanning again is harmless
    assert!(scan(&root).unwrap().is_empty());
}

#[test]
fn test_only_directories_with_variables_count() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    provision(root, "openshiftdevel", None);
    provision(root, "openshiftdevel0", Some("---\n- masters\n- nodes\n"));
    // Box cache and half-created machines are not machines
    fs::create_dir_all(root.join("boxes")).unwrap();
    fs::create_dir_all(root.join("openshiftdevel1")).unwrap();
    fs::write(root.join("openshiftdevel1").join(GROUPS_FILE), "---\n- masters\n").unwrap();

    let registry = scan(root).unwrap();
    let names: Vec<String> = registry.machines().iter().map(|m| m.hostname()).collect();
    assert_eq!(names, vec!["openshiftdevel", "openshiftdevel0"]);

    let first = registry.find("openshiftdevel").unwrap();
    assert!(first.groups().unwrap().is_empty());
    let second = registry.find("openshiftdevel0").unwrap();
    assert_eq!(second.groups().unwrap(), vec!["masters", "nodes"]);
    assert_eq!(second.directory(), root.join("openshiftdevel0"));
}

#[test]
fn test_half_created_directory_still_blocks_its_name() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    provision(root, DEFAULT_HOSTNAME, None);
    fs::create_dir_all(root.join("openshiftdevel0")).unwrap();

    assert_eq!(scan(root).unwrap().len(), 1);
    assert_eq!(next_available(root, DEFAULT_HOSTNAME).unwrap(), "openshiftdevel1");
}

#[test]
fn test_allocation_after_each_provision() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let mut allocated = Vec::new();
    for _ in 0..4 {
        let name = next_available(root, DEFAULT_HOSTNAME).unwrap();
        provision(root, &name, None);
        allocated.push(name);
    }

    assert_eq!(
        allocated,
        vec!["openshiftdevel", "openshiftdevel0", "openshiftdevel1", "openshiftdevel2"]
    );
    assert_eq!(scan(root).unwrap().len(), 4);
}
