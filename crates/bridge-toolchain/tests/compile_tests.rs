//! Compile categories, skip policy and the standard steps on disk

use std::fs;

use bridge_spec::{Spec, keys};
use bridge_test_utils::SourceTree;
use bridge_toolchain::compile::{self, CompileCategory, Processor};
use bridge_toolchain::standard::ASSEMBLED_MANIFEST_NAME;
use bridge_toolchain::{Error, RunStatus, SkippedEntry, Toolchain};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn spec_with_build_dir(tree: &SourceTree) -> Spec {
    let mut spec = Spec::new();
    spec.set(
        keys::BUILD_DIR,
        tree.dir("build").to_string_lossy().into_owned(),
    );
    spec
}

#[test]
fn test_standard_run_transpiles_bundles_and_assembles() {
    let tree = SourceTree::new();
    tree.file("src/app/main.js", "import util from 'app/util';");
    tree.file("src/app/util.js", "export default {};");
    tree.file("assets/logo.txt", "LOGO");
    tree.file("assets/theme/dark.css", "body {}");

    let mut spec = Spec::new();
    spec.set(
        keys::BUILD_DIR,
        tree.scratch_path("out/build").to_string_lossy().into_owned(),
    );
    spec.set(
        "transpile_sourcepath",
        tree.sourcepath_map(&[("app/main", "src/app/main.js"), ("app/util", "src/app/util.js")]),
    );
    spec.set(
        "bundle_sourcepath",
        tree.sourcepath_map(&[("logo", "assets/logo.txt"), ("theme", "assets/theme")]),
    );

    let outcome = Toolchain::builder("standard").build().run(&mut spec);
    assert_eq!(outcome.status, RunStatus::Success);
    assert!(!outcome.is_partial());

    let build_dir = spec.get_path(keys::BUILD_DIR).unwrap();
    assert_eq!(
        fs::read_to_string(build_dir.join("app/main.js")).unwrap(),
        "import util from 'app/util';"
    );
    assert_eq!(fs::read_to_string(build_dir.join("logo")).unwrap(), "LOGO");
    assert!(build_dir.join("theme/dark.css").is_file());

    assert_eq!(
        spec.get("transpiled_targetpaths"),
        Some(&json!({"app/main": "app/main.js", "app/util": "app/util.js"}))
    );
    assert_eq!(
        spec.get("transpiled_modpaths"),
        Some(&json!({"app/main": "app/main", "app/util": "app/util"}))
    );
    assert_eq!(
        spec.get("bundled_targetpaths"),
        Some(&json!({"logo": "logo", "theme": "theme"}))
    );
    // directories are bundled but not exported
    assert_eq!(
        spec.get(keys::EXPORT_MODULE_NAMES),
        Some(&json!(["app/main", "app/util", "logo"]))
    );

    let manifest_path = spec.get_path(keys::ASSEMBLED_MANIFEST).unwrap();
    assert_eq!(manifest_path, build_dir.join(ASSEMBLED_MANIFEST_NAME));
    let manifest: Value =
        serde_json::from_str(&fs::read_to_string(manifest_path).unwrap()).unwrap();
    assert_eq!(manifest["toolchain"], json!("standard"));
    assert_eq!(manifest["modpaths"]["transpiled"]["app/main"], json!("app/main"));
    assert_eq!(manifest["modpaths"]["bundled"]["theme"], json!("theme"));
}

#[test]
fn test_custom_transpiler_and_suffix() {
    let tree = SourceTree::new();
    tree.file("src/widget.ts", "let x = 1;");

    let toolchain = Toolchain::builder("typed")
        .filename_suffix(".ts")
        .compile_categories(vec![CompileCategory::transpile()])
        .transpiler(|_: &Spec, source: &str| -> bridge_toolchain::Result<String> {
            Ok(format!("// generated\n{source}"))
        })
        .build();
    let mut spec = spec_with_build_dir(&tree);
    spec.set(
        "transpile_sourcepath",
        tree.sourcepath_map(&[("widget", "src/widget.ts")]),
    );

    compile::compile(&toolchain, &mut spec).unwrap();

    let written = fs::read_to_string(tree.path().join("build/widget.ts")).unwrap();
    assert_eq!(written, "// generated\nlet x = 1;");
    assert!(!spec.contains_key("bundled_modpaths"));
}

#[test]
fn test_transpiler_error_fails_compile() {
    let tree = SourceTree::new();
    tree.file("bad.js", "syntax error here");

    let toolchain = Toolchain::builder("strict")
        .transpiler(|_: &Spec, _: &str| -> bridge_toolchain::Result<String> {
            Err(Error::Transpile {
                modname: "bad".to_string(),
                message: "unexpected token".to_string(),
            })
        })
        .build();
    let mut spec = spec_with_build_dir(&tree);
    spec.set("transpile_sourcepath", tree.sourcepath_map(&[("bad", "bad.js")]));

    let err = compile::compile(&toolchain, &mut spec).unwrap_err();
    assert!(matches!(err, Error::Transpile { .. }));
}

#[test]
fn test_missing_source_failure_names_the_entry() {
    let tree = SourceTree::new();
    let missing = tree.scratch_path("app/main.js");

    let mut spec = spec_with_build_dir(&tree);
    spec.set(
        "transpile_sourcepath",
        json!({ "app/main": missing.to_string_lossy() }),
    );

    let outcome = Toolchain::builder("standard").build().run(&mut spec);

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.failed_step.as_deref(), Some("compile"));
    let error = outcome.error.unwrap();
    assert!(error.contains("'app/main'"), "{error}");
    assert!(error.contains(&*missing.to_string_lossy()), "{error}");

    let failure = spec.get_object(keys::TOOLCHAIN_FAILURE).unwrap();
    assert_eq!(failure["error"], json!(error));
}

#[test]
fn test_bundle_copy_failure_names_the_entry() {
    let tree = SourceTree::new();
    let toolchain = Toolchain::builder("assets")
        .compile_categories(vec![CompileCategory::bundle()])
        .build();
    tree.file("data.json", "{}");
    // a file where the target's parent directory should go
    tree.file("build/blocked", "");

    let mut spec = spec_with_build_dir(&tree);
    spec.set(
        "bundle_sourcepath",
        tree.sourcepath_map(&[("blocked/data", "data.json")]),
    );

    let err = compile::compile(&toolchain, &mut spec).unwrap_err();
    match err {
        Error::Entry { modname, path, .. } => {
            assert_eq!(modname, "blocked/data");
            assert_eq!(path, tree.path().join("build/blocked"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_relative_sources_resolve_against_working_dir() {
    let tree = SourceTree::new();
    tree.file("lib/entry.js", "entry");

    let mut spec = spec_with_build_dir(&tree);
    spec.set(keys::WORKING_DIR, tree.path().to_string_lossy().into_owned());
    spec.set("transpile_sourcepath", json!({"entry": "lib/entry.js"}));

    compile::compile(&Toolchain::builder("standard").build(), &mut spec).unwrap();
    assert!(tree.path().join("build/entry.js").is_file());
}

#[test]
fn test_category_with_existing_output_key_is_refused() {
    let tree = SourceTree::new();
    tree.file("a.js", "a");
    tree.file("b.txt", "b");

    let mut spec = spec_with_build_dir(&tree);
    spec.set("transpiled_modpaths", json!({"preset": "preset"}));
    spec.set("transpile_sourcepath", tree.sourcepath_map(&[("a", "a.js")]));
    spec.set("bundle_sourcepath", tree.sourcepath_map(&[("b", "b.txt")]));

    compile::compile(&Toolchain::builder("standard").build(), &mut spec).unwrap();

    assert_eq!(spec.get("transpiled_modpaths"), Some(&json!({"preset": "preset"})));
    assert!(!spec.contains_key("transpiled_targetpaths"));
    assert!(!tree.path().join("build/a.js").exists());
    assert!(tree.path().join("build/b").is_file());
    assert_eq!(spec.get(keys::EXPORT_MODULE_NAMES), Some(&json!(["b"])));
}

#[test]
fn test_export_module_names_must_be_a_list() {
    let tree = SourceTree::new();
    let mut spec = spec_with_build_dir(&tree);
    spec.set(keys::EXPORT_MODULE_NAMES, "app/main");

    let err = compile::compile(&Toolchain::builder("standard").build(), &mut spec).unwrap_err();
    assert!(matches!(
        err,
        Error::Spec(bridge_spec::Error::KeyType { expected: "array", .. })
    ));
}

#[test]
fn test_existing_export_module_names_are_extended() {
    let tree = SourceTree::new();
    tree.file("main.js", "main");

    let mut spec = spec_with_build_dir(&tree);
    spec.set(keys::EXPORT_MODULE_NAMES, json!(["vendor/lib"]));
    spec.set("transpile_sourcepath", tree.sourcepath_map(&[("main", "main.js")]));

    compile::compile(&Toolchain::builder("standard").build(), &mut spec).unwrap();
    assert_eq!(
        spec.get(keys::EXPORT_MODULE_NAMES),
        Some(&json!(["vendor/lib", "main"]))
    );
}

#[test]
fn test_compile_requires_build_dir() {
    let mut spec = Spec::new();
    let err = compile::compile(&Toolchain::builder("standard").build(), &mut spec).unwrap_err();
    assert!(matches!(err, Error::MissingKey { .. }));
}

#[test]
fn test_target_escaping_build_dir_is_rejected() {
    let tree = SourceTree::new();
    tree.file("evil.js", "evil");

    let mut spec = spec_with_build_dir(&tree);
    spec.set(
        "transpile_sourcepath",
        tree.sourcepath_map(&[("../../evil", "evil.js")]),
    );

    let err = compile::compile(&Toolchain::builder("standard").build(), &mut spec).unwrap_err();
    assert!(matches!(err, Error::TargetOutsideBuildDir { .. }));
}

#[test]
fn test_non_string_sources_and_missing_bundles_are_ignored() {
    let tree = SourceTree::new();
    let mut spec = spec_with_build_dir(&tree);
    spec.set("transpile_sourcepath", json!({"numeric": 42}));
    spec.set(
        "bundle_sourcepath",
        tree.sourcepath_map(&[("ghost", "does/not/exist")]),
    );

    compile::compile(&Toolchain::builder("standard").build(), &mut spec).unwrap();
    assert_eq!(spec.get("transpiled_modpaths"), Some(&json!({})));
    assert_eq!(spec.get("bundled_modpaths"), Some(&json!({"ghost": "ghost"})));
    assert_eq!(spec.get(keys::EXPORT_MODULE_NAMES), Some(&json!([])));
}

#[test]
fn test_skip_entries_and_patterns_make_run_partial() {
    let tree = SourceTree::new();
    for name in ["keep", "drop", "legacy_one"] {
        tree.file(&format!("{name}.js"), name);
    }

    let mut spec = spec_with_build_dir(&tree);
    spec.set(
        "transpile_sourcepath",
        tree.sourcepath_map(&[
            ("keep", "keep.js"),
            ("drop", "drop.js"),
            ("legacy_one", "legacy_one.js"),
        ]),
    );
    spec.set(keys::SKIP_ENTRIES, json!(["drop"]));
    spec.set(keys::SKIP_PATTERNS, json!(["legacy_.*"]));

    let outcome = Toolchain::builder("standard").build().run(&mut spec);

    assert_eq!(outcome.status, RunStatus::Success);
    assert!(outcome.is_partial());
    assert_eq!(outcome.exit_code(), 3);
    assert_eq!(
        outcome.skipped_entries,
        vec![
            SkippedEntry {
                category: "transpiled".to_string(),
                modname: "drop".to_string(),
                reason: "listed in skip_entries".to_string(),
            },
            SkippedEntry {
                category: "transpiled".to_string(),
                modname: "legacy_one".to_string(),
                reason: "matched skip pattern 'legacy_.*'".to_string(),
            },
        ]
    );
    assert_eq!(spec.get(keys::EXPORT_MODULE_NAMES), Some(&json!(["keep"])));
    assert!(!tree.path().join("build/drop.js").exists());
    assert_eq!(
        spec.get(keys::SKIPPED_ENTRIES).and_then(Value::as_array).map(Vec::len),
        Some(2)
    );
}

#[test]
fn test_skips_survive_a_later_category_failure() {
    let tree = SourceTree::new();
    tree.file("keep.js", "keep");
    tree.file("drop.js", "drop");
    tree.file("data.json", "{}");
    tree.file("build/blocked", "");

    let mut spec = spec_with_build_dir(&tree);
    spec.set(
        "transpile_sourcepath",
        tree.sourcepath_map(&[("keep", "keep.js"), ("drop", "drop.js")]),
    );
    spec.set(
        "bundle_sourcepath",
        tree.sourcepath_map(&[("blocked/data", "data.json")]),
    );
    spec.set(keys::SKIP_ENTRIES, json!(["drop"]));

    let outcome = Toolchain::builder("standard").build().run(&mut spec);

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.failed_step.as_deref(), Some("compile"));
    assert_eq!(
        outcome.skipped_entries,
        vec![SkippedEntry {
            category: "transpiled".to_string(),
            modname: "drop".to_string(),
            reason: "listed in skip_entries".to_string(),
        }]
    );
}

#[test]
fn test_bundle_only_category_list() {
    let tree = SourceTree::new();
    tree.file("data.json", "{}");

    let toolchain = Toolchain::builder("assets")
        .compile_categories(vec![CompileCategory::new(Processor::Bundle, "assets", "copied")])
        .build();
    let mut spec = spec_with_build_dir(&tree);
    spec.set("assets_sourcepath", tree.sourcepath_map(&[("data", "data.json")]));

    compile::compile(&toolchain, &mut spec).unwrap();
    assert_eq!(spec.get("copied_targetpaths"), Some(&json!({"data": "data"})));
    assert!(tree.path().join("build/data").is_file());
}

#[test]
fn test_export_target_receives_manifest() {
    let tree = SourceTree::new();
    tree.file("main.js", "main");
    let target = tree.scratch_path("dist/bundle.json");

    let mut spec = Spec::new();
    spec.set("transpile_sourcepath", tree.sourcepath_map(&[("main", "main.js")]));
    spec.set(keys::EXPORT_TARGET, target.to_string_lossy().into_owned());

    let outcome = Toolchain::builder("standard").build().run(&mut spec);
    assert_eq!(outcome.status, RunStatus::Success);

    let exported: Value = serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(exported["export_module_names"], json!(["main"]));

    // the scratch build directory is gone once the run has cleaned up
    let build_dir = spec.get_path(keys::BUILD_DIR).unwrap();
    assert!(!build_dir.exists());
}

#[cfg(unix)]
mod link {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_link_runs_configured_binary_with_substituted_args() {
        let tree = SourceTree::new();
        let script = tree.file(
            "bin/fake-linker",
            "#!/bin/sh\necho \"linked $1\"\ncp \"$1\" \"$2\"\n",
        );
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let target = tree.scratch_path("linked.json");

        let mut spec = spec_with_build_dir(&tree);
        spec.set(keys::TOOLCHAIN_BIN_PATH, script.to_string_lossy().into_owned());
        spec.set(keys::EXPORT_TARGET, target.to_string_lossy().into_owned());
        spec.set(keys::LINK_ARGS, json!(["${manifest}", "${export_target}"]));

        let outcome = Toolchain::builder("standard").build().run(&mut spec);
        assert_eq!(outcome.status, RunStatus::Success, "{:?}", outcome.error);

        let linked: Value = serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(linked["toolchain"], json!("standard"));
    }

    #[test]
    fn test_failing_linker_fails_link_step() {
        let tree = SourceTree::new();
        let script = tree.file("bin/broken-linker", "#!/bin/sh\necho nope >&2\nexit 4\n");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let mut spec = spec_with_build_dir(&tree);
        spec.set(keys::TOOLCHAIN_BIN_PATH, script.to_string_lossy().into_owned());

        let outcome = Toolchain::builder("standard").build().run(&mut spec);
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.failed_step.as_deref(), Some("link"));
    }
}
