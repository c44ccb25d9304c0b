//! Scene source implementations
//!
//! [`DirectorySource`] reads a scene laid out on disk; [`MemorySource`] serves
//! the same data from in-memory maps.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::{AssetError, SceneSource};
use crate::config::SceneLayout;

/// Lazily built file stem -> path index of one directory
#[derive(Debug)]
struct DirectoryIndex {
    dir: PathBuf,
    entries: OnceLock<Result<HashMap<String, PathBuf>, String>>,
}

impl DirectoryIndex {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            entries: OnceLock::new(),
        }
    }

    /// Fail unless the directory can be listed
    fn check_readable(&self) -> Result<(), AssetError> {
        fs::read_dir(&self.dir).map(drop).map_err(|e| AssetError::Index {
            dir: self.dir.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn lookup(&self, kind: &'static str, id: &str) -> Result<&Path, AssetError> {
        let entries = self
            .entries
            .get_or_init(|| Self::scan(&self.dir))
            .as_ref()
            .map_err(|reason| AssetError::Index {
                dir: self.dir.display().to_string(),
                reason: reason.clone(),
            })?;

        entries
            .get(id)
            .map(PathBuf::as_path)
            .ok_or_else(|| AssetError::NotFound {
                kind,
                id: id.to_string(),
            })
    }

    fn scan(dir: &Path) -> Result<HashMap<String, PathBuf>, String> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| e.to_string())? {
            let path = entry.map_err(|e| e.to_string())?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        // Sorted so duplicate stems resolve the same way every run
        paths.sort();

        let mut entries = HashMap::with_capacity(paths.len());
        for path in paths {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                entries.entry(stem.to_string()).or_insert(path);
            }
        }

        log::debug!("Indexed {} files in {}", entries.len(), dir.display());
        Ok(entries)
    }
}

/// Scene stored as a directory tree
///
/// ```text
/// <root>/instance_tree.json
/// <root>/materials/<materialId>[.ext]
/// <root>/meshes/<sceneId>-<nodeId>-<fragmentId>[.ext]
/// ```
///
/// File names are matched on their stem, so any extension is accepted. Each
/// directory is listed once, on its first lookup.
#[derive(Debug)]
pub struct DirectorySource {
    scene_id: String,
    root: PathBuf,
    instance_tree: PathBuf,
    materials: DirectoryIndex,
    meshes: DirectoryIndex,
}

impl DirectorySource {
    /// Open a scene directory
    ///
    /// The scene id defaults to the directory name. The material and mesh
    /// directories must be listable; their contents are indexed on first use.
    pub fn open(root: impl AsRef<Path>, layout: &SceneLayout) -> Result<Self, AssetError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(AssetError::NotFound {
                kind: "scene directory",
                id: root.display().to_string(),
            });
        }

        let scene_id = Self::directory_name(&root)?;
        let materials = DirectoryIndex::new(root.join(&layout.materials_dir));
        let meshes = DirectoryIndex::new(root.join(&layout.meshes_dir));
        materials.check_readable()?;
        meshes.check_readable()?;

        log::info!("Opening scene {} at {}", scene_id, root.display());

        Ok(Self {
            scene_id,
            instance_tree: root.join(&layout.instance_tree_file),
            materials,
            meshes,
            root,
        })
    }

    /// Last path component, resolving `.` and `..` first
    fn directory_name(root: &Path) -> Result<String, AssetError> {
        let name = match root.file_name() {
            Some(name) => name.to_os_string(),
            None => root
                .canonicalize()?
                .file_name()
                .map(ToOwned::to_owned)
                .unwrap_or_default(),
        };

        match name.to_str() {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(AssetError::InvalidData(format!(
                "cannot derive a scene id from {}",
                root.display()
            ))),
        }
    }

    /// Override the scene id
    #[must_use]
    pub fn with_scene_id(mut self, scene_id: impl Into<String>) -> Self {
        self.scene_id = scene_id.into();
        self
    }

    /// Scene root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(kind: &'static str, path: &Path) -> Result<Vec<u8>, AssetError> {
        fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AssetError::NotFound {
                kind,
                id: path.display().to_string(),
            },
            _ => AssetError::IoError(e),
        })
    }
}

impl SceneSource for DirectorySource {
    fn scene_id(&self) -> &str {
        &self.scene_id
    }

    fn instance_tree(&self) -> Result<Vec<u8>, AssetError> {
        Self::read("instance tree", &self.instance_tree)
    }

    fn material(&self, id: &str) -> Result<Vec<u8>, AssetError> {
        Self::read("material", self.materials.lookup("material", id)?)
    }

    fn mesh(&self, composite_id: &str) -> Result<Vec<u8>, AssetError> {
        Self::read("mesh", self.meshes.lookup("mesh", composite_id)?)
    }
}

/// Scene held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    scene_id: String,
    instance_tree: Vec<u8>,
    materials: HashMap<String, Vec<u8>>,
    meshes: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Create a source from an instance tree document
    pub fn new(scene_id: impl Into<String>, instance_tree: impl Into<Vec<u8>>) -> Self {
        Self {
            scene_id: scene_id.into(),
            instance_tree: instance_tree.into(),
            ..Self::default()
        }
    }

    /// Add a material descriptor
    #[must_use]
    pub fn with_material(mut self, id: impl Into<String>, descriptor: impl Into<Vec<u8>>) -> Self {
        self.materials.insert(id.into(), descriptor.into());
        self
    }

    /// Add a geometry blob
    #[must_use]
    pub fn with_mesh(mut self, composite_id: impl Into<String>, blob: impl Into<Vec<u8>>) -> Self {
        self.meshes.insert(composite_id.into(), blob.into());
        self
    }
}

impl SceneSource for MemorySource {
    fn scene_id(&self) -> &str {
        &self.scene_id
    }

    fn instance_tree(&self) -> Result<Vec<u8>, AssetError> {
        Ok(self.instance_tree.clone())
    }

    fn material(&self, id: &str) -> Result<Vec<u8>, AssetError> {
        self.materials.get(id).cloned().ok_or_else(|| AssetError::NotFound {
            kind: "material",
            id: id.to_string(),
        })
    }

    fn mesh(&self, composite_id: &str) -> Result<Vec<u8>, AssetError> {
        self.meshes
            .get(composite_id)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                kind: "mesh",
                id: composite_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scene_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("materials")).unwrap();
        fs::create_dir(dir.path().join("meshes")).unwrap();
        fs::write(dir.path().join("instance_tree.json"), br#"{ "childs": [] }"#).unwrap();
        fs::write(dir.path().join("materials/2.json"), b"{}").unwrap();
        fs::write(dir.path().join("meshes/lobby-12-51.bin"), [1u8, 2, 3]).unwrap();
        dir
    }

    #[test]
    fn test_directory_lookup_by_stem() {
        let dir = scene_dir();
        let source = DirectorySource::open(dir.path(), &SceneLayout::default())
            .unwrap()
            .with_scene_id("lobby");

        assert_eq!(source.scene_id(), "lobby");
        assert_eq!(source.instance_tree().unwrap(), br#"{ "childs": [] }"#);
        assert_eq!(source.material("2").unwrap(), b"{}");
        assert_eq!(source.mesh("lobby-12-51").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_directory_missing_entries() {
        let dir = scene_dir();
        let source = DirectorySource::open(dir.path(), &SceneLayout::default()).unwrap();

        assert!(matches!(
            source.material("99"),
            Err(AssetError::NotFound { kind: "material", .. })
        ));
        assert!(matches!(
            DirectorySource::open(dir.path().join("nope"), &SceneLayout::default()),
            Err(AssetError::NotFound { .. })
        ));
    }

    #[test]
    fn test_directory_missing_subdirectory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            DirectorySource::open(dir.path(), &SceneLayout::default()),
            Err(AssetError::Index { .. })
        ));

        fs::create_dir(dir.path().join("materials")).unwrap();
        match DirectorySource::open(dir.path(), &SceneLayout::default()) {
            Err(AssetError::Index { dir, .. }) => assert!(dir.ends_with("meshes")),
            other => panic!("expected index error, got {other:?}"),
        }

        fs::create_dir(dir.path().join("meshes")).unwrap();
        let source = DirectorySource::open(dir.path(), &SceneLayout::default()).unwrap();
        assert!(matches!(
            source.instance_tree(),
            Err(AssetError::NotFound { kind: "instance tree", .. })
        ));
    }

    #[test]
    fn test_scene_id_from_relative_root() {
        let dir = scene_dir();
        let nested = dir.path().join("meshes").join("..");
        let source = DirectorySource::open(&nested, &SceneLayout::default()).unwrap();

        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            source.scene_id(),
            expected.file_name().unwrap().to_str().unwrap()
        );
        assert!(!source.scene_id().is_empty());
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new("s", "{}")
            .with_material("2", "{}")
            .with_mesh("s-1-1", vec![0u8; 4]);

        assert_eq!(source.scene_id(), "s");
        assert_eq!(source.mesh("s-1-1").unwrap().len(), 4);
        assert!(source.mesh("s-1-2").is_err());
    }
}
