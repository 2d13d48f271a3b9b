use std::path::{Path, PathBuf};

use crate::project::BuildConfig;

/// Logical layout of a build on disk.
///
/// This is derived from the config root and the configured temp/dist
/// directories. It does *not* perform any IO itself.
#[derive(Debug, Clone)]
pub struct BuildLayout {
    /// Directory holding the config file; relative patterns resolve here.
    pub root: PathBuf,
    /// Scratch root, wiped at the start of every build.
    pub temp_root: PathBuf,
    /// Pre-bundled resolver modules.
    pub resolvers_dir: PathBuf,
    /// Per-step sliced modules.
    pub sliced_dir: PathBuf,
    /// Per-step driver modules.
    pub steps_dir: PathBuf,
    /// Post-bundled artifacts waiting for their resolver to finish.
    pub staging_dir: PathBuf,
    pub dist_root: PathBuf,
    pub functions_dir: PathBuf,
    pub pipelines_dir: PathBuf,
    pub metadata_dir: PathBuf,
}

impl BuildLayout {
    pub fn new(root: impl AsRef<Path>, temp_dir: &str, dist_dir: &str) -> Self {
        let root = root.as_ref().to_path_buf();
        let temp_root = join_dir(&root, temp_dir);
        let dist_root = join_dir(&root, dist_dir);
        Self {
            resolvers_dir: temp_root.join("resolvers"),
            sliced_dir: temp_root.join("sliced"),
            steps_dir: temp_root.join("steps"),
            staging_dir: temp_root.join("staging"),
            functions_dir: dist_root.join("functions"),
            pipelines_dir: dist_root.join("pipelines"),
            metadata_dir: dist_root.join("metadata"),
            root,
            temp_root,
            dist_root,
        }
    }

    pub fn from_config(root: impl AsRef<Path>, config: &BuildConfig) -> Self {
        Self::new(root, &config.temp_dir, &config.dist_dir)
    }

    /// `<tempRoot>/resolvers/<fileStem>.js`
    pub fn bundled_resolver(&self, source: &Path) -> PathBuf {
        let stem = source.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        self.resolvers_dir.join(format!("{}.js", file_safe(&stem)))
    }

    pub fn sliced_module(&self, resolver: &str, step: &str) -> PathBuf {
        self.sliced_dir.join(step_file_name(resolver, step))
    }

    pub fn driver(&self, resolver: &str, step: &str) -> PathBuf {
        self.steps_dir.join(step_file_name(resolver, step))
    }

    pub fn staged_artifact(&self, resolver: &str, step: &str) -> PathBuf {
        self.staging_dir.join(file_safe(resolver)).join(step_file_name(resolver, step))
    }

    pub fn staged_dir(&self, resolver: &str) -> PathBuf {
        self.staging_dir.join(file_safe(resolver))
    }

    /// `<distRoot>/functions/<resolver>__<step>.js`, both parts encoded with [`file_safe`].
    pub fn artifact(&self, resolver: &str, step: &str) -> PathBuf {
        self.functions_dir.join(step_file_name(resolver, step))
    }

    pub fn manifest(&self, resolver: &str) -> PathBuf {
        self.pipelines_dir.join(format!("{}.json", file_safe(resolver)))
    }

    pub fn metadata(&self, resolver: &str) -> PathBuf {
        self.metadata_dir.join(format!("{}.json", file_safe(resolver)))
    }
}

fn join_dir(root: &Path, dir: &str) -> PathBuf {
    let dir = Path::new(dir);
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

/// `<resolver>__<step>.js`, shared by sliced modules, drivers and artifacts.
///
/// Distinct `(resolver, step)` pairs always map to distinct names, since
/// [`file_safe`] never emits `__`.
pub fn step_file_name(resolver: &str, step: &str) -> String {
    format!("{}__{}.js", file_safe(resolver), file_safe(step))
}

/// Injective file-name encoding.
///
/// ASCII alphanumerics, `-` and non-leading `.` pass through; every other
/// byte, `_` included, becomes `_` plus two hex digits. The empty name is `_`.
pub fn file_safe(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(name.len());
    for (i, byte) in name.bytes().enumerate() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || (byte == b'.' && i > 0) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}
