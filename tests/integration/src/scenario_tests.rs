//! End-to-end runs of the standard toolchain
//!
//! These exercise the whole flow: advice packages -> setup -> the five
//! standard steps -> success -> cleanup, against real directories.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use bridge_spec::advice::{AFTER_PREPARE, CLEANUP, SUCCESS};
use bridge_spec::{AdviceError, AdviceResult, Spec, keys};
use bridge_test_utils::{AdviceRecorder, SourceTree};
use bridge_toolchain::{AdviceRegistry, RunStatus, Toolchain};
use pretty_assertions::assert_eq;
use serde_json::json;

/// Provider that removes the configured build directory on cleanup
fn scratch_remover(spec: &mut Spec, _extras: &[String]) -> AdviceResult {
    spec.add_advice(CLEANUP, |spec: &mut Spec| {
        if let Some(dir) = spec.get_path(keys::BUILD_DIR)
            && dir.exists()
        {
            fs::remove_dir_all(&dir).map_err(AdviceError::failed)?;
        }
        Ok(())
    })
    .map_err(AdviceError::failed)
}

#[test]
fn test_scratch_build_dir_created_then_removed_by_provider() {
    let root = SourceTree::new();
    root.file("src/index.js", "export const ready = true;");
    let scratch = root.scratch_path("scratch/build");

    let mut registry = AdviceRegistry::new();
    registry.register("scratch-remover", "standard", scratch_remover);
    let toolchain = Toolchain::builder("standard")
        .advice_registry(registry)
        .default_advice_package("scratch-remover")
        .build();

    let mut spec = Spec::new();
    spec.set(keys::BUILD_DIR, scratch.to_string_lossy().into_owned());
    spec.set(
        "transpile_sourcepath",
        root.sourcepath_map(&[("index", "src/index.js")]),
    );

    let seen_after_prepare: Rc<RefCell<Option<bool>>> = Rc::new(RefCell::new(None));
    {
        let seen = Rc::clone(&seen_after_prepare);
        spec.add_advice(AFTER_PREPARE, move |spec: &mut Spec| {
            let exists = spec.get_path(keys::BUILD_DIR).is_some_and(|dir| dir.is_dir());
            *seen.borrow_mut() = Some(exists);
            Ok(())
        })
        .unwrap();
    }
    let recorder = AdviceRecorder::new();
    recorder.attach(&mut spec, SUCCESS);

    assert!(!scratch.exists());
    let outcome = toolchain.run(&mut spec);

    assert_eq!(outcome.status, RunStatus::Success);
    assert!(!outcome.is_partial());
    assert_eq!(*seen_after_prepare.borrow(), Some(true));
    assert_eq!(recorder.count(SUCCESS), 1);
    assert!(!scratch.exists(), "scratch build dir survived cleanup");
    assert_eq!(
        spec.get(keys::ADVICE_PACKAGES_APPLIED_REQUIREMENTS),
        Some(&json!(["scratch-remover"]))
    );
}

#[test]
fn test_skipping_one_of_three_entries() {
    let root = SourceTree::new();
    for name in ["alpha", "beta", "gamma"] {
        root.file(&format!("src/{name}.js"), &format!("// {name}"));
    }
    let build_dir = root.dir("build");

    let mut spec = Spec::new();
    spec.set(keys::BUILD_DIR, build_dir.to_string_lossy().into_owned());
    spec.set(
        "transpile_sourcepath",
        root.sourcepath_map(&[
            ("alpha", "src/alpha.js"),
            ("beta", "src/beta.js"),
            ("gamma", "src/gamma.js"),
        ]),
    );
    spec.set(keys::SKIP_ENTRIES, json!(["beta"]));

    let outcome = Toolchain::builder("standard").build().run(&mut spec);

    assert_eq!(outcome.status, RunStatus::Success);
    assert!(outcome.error.is_none());

    let mut artifacts: Vec<PathBuf> = fs::read_dir(&build_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "js"))
        .collect();
    artifacts.sort();
    assert_eq!(
        artifacts,
        vec![build_dir.join("alpha.js"), build_dir.join("gamma.js")]
    );

    assert_eq!(outcome.skipped_entries.len(), 1);
    assert_eq!(outcome.skipped_entries[0].modname, "beta");
    assert!(outcome.advice_failures.is_empty());
    assert!(outcome.is_partial());
    assert_eq!(
        spec.get(keys::EXPORT_MODULE_NAMES),
        Some(&json!(["alpha", "gamma"]))
    );
}

#[test]
fn test_abort_in_before_assemble_leaves_no_manifest() {
    let root = SourceTree::new();
    root.file("src/app.js", "app");
    let build_dir = root.dir("build");

    let mut spec = Spec::new();
    spec.set(keys::BUILD_DIR, build_dir.to_string_lossy().into_owned());
    spec.set("transpile_sourcepath", root.sourcepath_map(&[("app", "src/app.js")]));
    spec.add_advice(bridge_spec::advice::BEFORE_ASSEMBLE, |_: &mut Spec| {
        Err(AdviceError::abort("nothing to ship"))
    })
    .unwrap();
    let recorder = AdviceRecorder::new();
    recorder.attach_all(&mut spec, &[SUCCESS, CLEANUP]);

    let outcome = Toolchain::builder("standard").build().run(&mut spec);

    assert_eq!(outcome.status, RunStatus::Aborted);
    assert!(build_dir.join("app.js").is_file());
    assert!(!build_dir.join("assembled.json").exists());
    assert_eq!(recorder.events(), vec![CLEANUP]);
}

#[test]
fn test_null_advice_package_list_with_empty_registry() {
    let mut with_null = Spec::new();
    with_null.set(keys::ADVICE_PACKAGES, serde_json::Value::Null);
    let mut without = Spec::new();

    let toolchain = Toolchain::builder("standard").build();
    let a = toolchain.run(&mut with_null);
    let b = toolchain.run(&mut without);

    assert_eq!(a.status, RunStatus::Success);
    assert_eq!(a.status, b.status);
    assert_eq!(a.completed_steps, b.completed_steps);
    assert!(a.advice_failures.is_empty() && b.advice_failures.is_empty());
    assert!(!with_null.contains_key(keys::ADVICE_PACKAGES_APPLIED_REQUIREMENTS));
}
