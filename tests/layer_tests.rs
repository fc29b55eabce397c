//! Integration tests for file layering.
//!
//! Covers parent discovery through the naming convention, explicit `$parent`
//! declarations and symlinks, plus the resolver's error cases.

use std::fs;
use std::path::{Path, PathBuf};
use strata::{ErrorCode, Evaluator, Format, Settings, Value};
use tempfile::TempDir;

fn yaml(s: &str) -> Value {
    Format::Yaml.decode(s).unwrap()
}

/// Evaluator that does not read the process environment.
fn evaluator() -> Evaluator {
    Evaluator::new(Settings {
        inherit_env: false,
        ..Settings::default()
    })
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

mod convention_tests {
    use super::*;

    #[test]
    fn test_single_file_without_parent() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "app.yaml", "name: app\nport: 80\n");

        let out = evaluator().evaluate_file(&path).unwrap();
        assert_eq!(out, vec![yaml("{name: app, port: 80}")]);
    }

    #[test]
    fn test_three_layer_chain() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app.yaml", "name: app\nport: 80\ntags: [base]\n");
        write(temp.path(), "app.prod.yaml", "port: 443\ntags: [prod]\n");
        let leaf = write(temp.path(), "app.prod.eu.yaml", "region: eu\n");

        let out = evaluator().evaluate_file(&leaf).unwrap();
        assert_eq!(
            out,
            vec![yaml("{name: app, port: 443, tags: [base, prod], region: eu}")]
        );
    }

    #[test]
    fn test_parent_in_another_format() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "svc.json", r#"{"replicas": 1, "image": "svc:1"}"#);
        let child = write(temp.path(), "svc.staging.yaml", "replicas: 2\n");

        let out = evaluator().evaluate_file(&child).unwrap();
        assert_eq!(out, vec![yaml("{replicas: 2, image: 'svc:1'}")]);
    }

    #[test]
    fn test_missing_parent() {
        let temp = TempDir::new().unwrap();
        let child = write(temp.path(), "app.prod.yaml", "port: 443\n");

        let err = evaluator().evaluate_file(&child).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingFile);
    }

    #[test]
    fn test_ambiguous_parent_extension() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app.yaml", "a: 1\n");
        write(temp.path(), "app.json", r#"{"a": 2}"#);
        let child = write(temp.path(), "app.prod.yaml", "b: 1\n");

        let err = evaluator().evaluate_file(&child).unwrap_err();
        assert_eq!(err.code, ErrorCode::MultiMatch);
    }

    #[test]
    fn test_empty_segment_is_invalid() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "app..yaml", "a: 1\n");

        let err = evaluator().evaluate_file(&path).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFilename);
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = evaluator()
            .evaluate_file(&temp.path().join("nope.yaml"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingFile);
    }
}

mod explicit_parent_tests {
    use super::*;

    #[test]
    fn test_parent_by_name() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "defaults.yaml", "timeout: 30\nretries: 3\n");
        let child = write(temp.path(), "service.yaml", "$parent: defaults\nretries: 5\n");

        let out = evaluator().evaluate_file(&child).unwrap();
        assert_eq!(out, vec![yaml("{timeout: 30, retries: 5}")]);
    }

    #[test]
    fn test_parent_false_disables_convention() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app.yaml", "a: 1\n");
        let child = write(temp.path(), "app.prod.yaml", "$parent: false\nb: 2\n");

        let out = evaluator().evaluate_file(&child).unwrap();
        assert_eq!(out, vec![yaml("{b: 2}")]);
    }

    #[test]
    fn test_parent_with_extension_in_subdirectory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("common")).unwrap();
        write(&temp.path().join("common"), "base.toml", "level = \"info\"\n");
        let child = write(temp.path(), "app.yaml", "$parent: common/base.toml\nname: app\n");

        let out = evaluator().evaluate_file(&child).unwrap();
        assert_eq!(out, vec![yaml("{level: info, name: app}")]);
    }

    #[test]
    fn test_cycle_is_circular_ref() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.yaml", "$parent: b\nx: 1\n");
        let b = write(temp.path(), "b.yaml", "$parent: a\ny: 1\n");

        let err = evaluator().evaluate_file(&b).unwrap_err();
        assert_eq!(err.code, ErrorCode::CircularRef);
    }

    #[test]
    fn test_conflicting_parents_across_documents() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "one.yaml", "a: 1\n");
        write(temp.path(), "two.yaml", "b: 1\n");
        let child = write(
            temp.path(),
            "child.yaml",
            "$parent: one\nx: 1\n---\n$parent: two\ny: 1\n",
        );

        let err = evaluator().evaluate_file(&child).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConflictingParent);
    }

    #[test]
    fn test_diamond_loads_shared_parent_once() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "base.yaml", "a: 1\nlist: [base]\n");
        write(temp.path(), "left.yaml", "$parent: base\nl: 1\n");
        write(temp.path(), "right.yaml", "$parent: base\nr: 1\n");
        let top = write(temp.path(), "top.yaml", "$parent: [left, right]\nt: 1\n");

        let out = evaluator().evaluate_file(&top).unwrap();
        assert_eq!(out, vec![yaml("{a: 1, list: [base], l: 1, r: 1, t: 1}")]);
    }
}

#[cfg(unix)]
mod symlink_tests {
    use super::*;

    #[test]
    fn test_symlink_uses_target_name_for_parent() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app.yaml", "a: 1\n");
        write(temp.path(), "app.prod.yaml", "b: 2\n");
        let link = temp.path().join("current.yaml");
        std::os::unix::fs::symlink("app.prod.yaml", &link).unwrap();

        let out = evaluator().evaluate_file(&link).unwrap();
        assert_eq!(out, vec![yaml("{a: 1, b: 2}")]);
    }
}

mod multi_document_tests {
    use super::*;

    #[test]
    fn test_child_documents_select_parent_documents() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "fleet.yaml",
            "name: web\nsize: 1\n---\nname: db\nsize: 1\n",
        );
        let child = write(
            temp.path(),
            "fleet.prod.yaml",
            "$match: {name: db}\nsize: 3\n",
        );

        let out = evaluator().evaluate_file(&child).unwrap();
        assert_eq!(out, vec![yaml("{name: web, size: 1}"), yaml("{name: db, size: 3}")]);
    }

    #[test]
    fn test_unmatched_selector_fails() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "fleet.yaml", "name: web\n");
        let child = write(temp.path(), "fleet.prod.yaml", "$match: {name: cache}\nsize: 3\n");

        let err = evaluator().evaluate_file(&child).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoMatchFound);
    }
}
