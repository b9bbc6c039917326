//! Reserved Spec keys
//!
//! These names form part of the stable contract between toolchains,
//! advice providers and the command-line layer. Downstream packages read
//! and write them directly, so they must not be renamed.

/// Directory all compiled artifacts are written into.
pub const BUILD_DIR: &str = "build_dir";

/// List of configuration files consumed by the linking tool.
pub const CONFIG_FILES: &str = "config_files";

/// Requirements (`name[extra,...]`) naming advice packages to apply.
pub const ADVICE_PACKAGES: &str = "advice_packages";

/// Requirements that have already been applied to this Spec.
pub const ADVICE_PACKAGES_APPLIED_REQUIREMENTS: &str = "advice_packages_applied_requirements";

/// Debug level; a boolean or a non-negative integer.
pub const DEBUG: &str = "debug";

/// Module names exported by the compile step.
pub const EXPORT_MODULE_NAMES: &str = "export_module_names";

/// Final artifact path produced by the link step.
pub const EXPORT_TARGET: &str = "export_target";

/// Whether an existing export target may be replaced.
pub const EXPORT_TARGET_OVERWRITE: &str = "export_target_overwrite";

/// Packages whose sources feed this run.
pub const SOURCE_PACKAGE_NAMES: &str = "source_package_names";

/// Path of the external linking binary.
pub const TOOLCHAIN_BIN_PATH: &str = "toolchain_bin_path";

/// Base directory relative paths resolve against.
pub const WORKING_DIR: &str = "working_dir";

/// Exact compile entry names to bypass.
pub const SKIP_ENTRIES: &str = "skip_entries";

/// Regular expressions; compile entry names fully matching one are bypassed.
pub const SKIP_PATTERNS: &str = "skip_patterns";

/// Entries bypassed during compile, recorded as `{category, modname, reason}`.
pub const SKIPPED_ENTRIES: &str = "skipped_entries";

/// Failure record (`{step, error}`) written when a step fails.
pub const TOOLCHAIN_FAILURE: &str = "toolchain_failure";

/// Path of the manifest written by the assemble step.
pub const ASSEMBLED_MANIFEST: &str = "assembled_manifest";

/// Arguments passed to the linking binary.
pub const LINK_ARGS: &str = "link_args";

/// Suffix of the compile read key holding `modname -> source path`.
pub const SOURCEPATH_SUFFIX: &str = "_sourcepath";

/// Suffix of the compile store key holding `modname -> modpath`.
pub const MODPATH_SUFFIX: &str = "_modpaths";

/// Suffix of the compile store key holding `modname -> target path`.
pub const TARGETPATH_SUFFIX: &str = "_targetpaths";

/// Every reserved key, in declaration order
pub fn all() -> &'static [&'static str] {
    &[
        BUILD_DIR,
        CONFIG_FILES,
        ADVICE_PACKAGES,
        ADVICE_PACKAGES_APPLIED_REQUIREMENTS,
        DEBUG,
        EXPORT_MODULE_NAMES,
        EXPORT_TARGET,
        EXPORT_TARGET_OVERWRITE,
        SOURCE_PACKAGE_NAMES,
        TOOLCHAIN_BIN_PATH,
        WORKING_DIR,
        SKIP_ENTRIES,
        SKIP_PATTERNS,
        SKIPPED_ENTRIES,
        TOOLCHAIN_FAILURE,
        ASSEMBLED_MANIFEST,
        LINK_ARGS,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reserved_keys_unique() {
        let keys = all();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_stable_key_names() {
        assert_eq!(BUILD_DIR, "build_dir");
        assert_eq!(CONFIG_FILES, "config_files");
    }
}
