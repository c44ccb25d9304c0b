//! Instance tree walker
//!
//! Visits every node of the instance tree and turns Mesh nodes into jobs:
//! one material job per distinct material id, and mesh jobs that decode
//! fragments in fixed-size chunks.
//!
//! Material jobs are always added before the first chunk that needs them.
//! Workers take jobs in insertion order, so a mesh job blocked on a material
//! slot always has that material's job running or finished on another worker.

use std::sync::Arc;

use crate::assets::{
    Asset, AssetError, DecodeMode, GeometryDecoder, InstanceTree, MaterialStore, NodeType,
    Reservation, SceneNode, SceneSource,
};
use crate::config::LoaderConfig;
use crate::jobs::{JobResult, JobScheduler};
use crate::render::{Material, Mesh};

use super::mesh_store::MeshStore;

/// What a walk scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Nodes visited, every type included
    pub nodes_visited: usize,
    /// Material jobs added
    pub material_jobs: usize,
    /// Mesh chunk jobs added
    pub mesh_jobs: usize,
    /// Fragments handed to mesh jobs
    pub fragments_scheduled: usize,
    /// Fragments skipped for having zero polygons
    pub fragments_skipped: usize,
    /// Mesh nodes whose parallel lists disagree in length
    pub inconsistent_nodes: usize,
}

struct PendingFragment {
    composite_id: String,
    material_id: String,
}

/// Schedules material and mesh jobs for an instance tree
pub struct SceneWalker<'a> {
    scheduler: &'a JobScheduler,
    source: Arc<dyn SceneSource>,
    materials: Arc<MaterialStore>,
    meshes: Arc<MeshStore>,
    decode_mode: DecodeMode,
    chunk_size: usize,
    chunk: Vec<PendingFragment>,
    report: WalkReport,
}

impl<'a> SceneWalker<'a> {
    /// Create a walker writing into the given stores
    pub fn new(
        scheduler: &'a JobScheduler,
        source: Arc<dyn SceneSource>,
        materials: Arc<MaterialStore>,
        meshes: Arc<MeshStore>,
        config: &LoaderConfig,
    ) -> Self {
        let chunk_size = config.mesh_chunk_size.max(1);
        Self {
            scheduler,
            source,
            materials,
            meshes,
            decode_mode: config.decode_mode,
            chunk_size,
            chunk: Vec::with_capacity(chunk_size),
            report: WalkReport::default(),
        }
    }

    /// Walk the whole tree and schedule every job
    ///
    /// Returns once the jobs are added; it does not wait for them.
    pub fn walk(mut self, tree: &InstanceTree) -> WalkReport {
        for node in tree.roots() {
            self.visit(node);
        }
        self.flush_chunk();

        log::info!(
            "Walked {} nodes: {} fragments in {} mesh jobs, {} material jobs, {} empty fragments skipped",
            self.report.nodes_visited,
            self.report.fragments_scheduled,
            self.report.mesh_jobs,
            self.report.material_jobs,
            self.report.fragments_skipped
        );
        self.report
    }

    fn visit(&mut self, node: &SceneNode) {
        self.report.nodes_visited += 1;

        match &node.node_type {
            NodeType::Mesh => self.visit_mesh(node),
            // Transform matrices are not composed; fragments stay in their own space
            NodeType::Transform => {}
            NodeType::Other(tag) => log::trace!("Walking through {} node {}", tag, node.id),
        }

        for child in node.children() {
            self.visit(child);
        }
    }

    fn visit_mesh(&mut self, node: &SceneNode) {
        if !node.has_consistent_lists() {
            self.report.inconsistent_nodes += 1;
            log::warn!(
                "Mesh node {} has {} fragments, {} materials and {:?} polygon counts; using the common prefix",
                node.id,
                node.fragments.len(),
                node.materials.len(),
                node.frag_polys.as_ref().map(Vec::len)
            );
        }

        for fragment in node.fragment_refs() {
            if !fragment.has_geometry() {
                self.report.fragments_skipped += 1;
                continue;
            }

            let material_id = fragment.material.to_string();
            self.schedule_material(&material_id);

            self.chunk.push(PendingFragment {
                composite_id: format!("{}-{}-{}", self.source.scene_id(), node.id, fragment.fragment),
                material_id,
            });
            self.report.fragments_scheduled += 1;

            if self.chunk.len() >= self.chunk_size {
                self.flush_chunk();
            }
        }
    }

    fn schedule_material(&mut self, material_id: &str) {
        let Some(reservation) = self.materials.reserve(material_id) else {
            return;
        };

        let source = Arc::clone(&self.source);
        let job_id = format!("{}-material-{}", self.source.scene_id(), material_id);
        self.scheduler
            .add(job_id, move || load_material(source.as_ref(), reservation));
        self.report.material_jobs += 1;
    }

    fn flush_chunk(&mut self) {
        if self.chunk.is_empty() {
            return;
        }

        let fragments = std::mem::replace(&mut self.chunk, Vec::with_capacity(self.chunk_size));
        let source = Arc::clone(&self.source);
        let materials = Arc::clone(&self.materials);
        let meshes = Arc::clone(&self.meshes);
        let mode = self.decode_mode;

        let job_id = format!("{}-meshes-{}", self.source.scene_id(), self.report.mesh_jobs);
        self.scheduler.add(job_id, move || {
            load_chunk(source.as_ref(), &materials, &meshes, mode, &fragments)
        });
        self.report.mesh_jobs += 1;
    }
}

fn load_material(source: &dyn SceneSource, reservation: Reservation) -> JobResult {
    let loaded = source
        .material(reservation.id())
        .and_then(|bytes| Material::from_bytes(&bytes));

    match loaded {
        Ok(material) => {
            reservation.resolve(material);
            Ok(())
        }
        Err(err) => {
            reservation.fail(&err);
            Err(err.into())
        }
    }
}

fn load_chunk(
    source: &dyn SceneSource,
    materials: &MaterialStore,
    meshes: &MeshStore,
    mode: DecodeMode,
    fragments: &[PendingFragment],
) -> JobResult {
    let mut failed = 0;
    for fragment in fragments {
        match load_fragment(source, materials, mode, fragment) {
            Ok(mesh) => {
                meshes.insert(mesh);
            }
            Err(err) => {
                failed += 1;
                log::warn!("Dropping fragment {}: {}", fragment.composite_id, err);
            }
        }
    }

    if failed == 0 {
        Ok(())
    } else {
        Err(format!("{failed} of {} fragments failed", fragments.len()).into())
    }
}

fn load_fragment(
    source: &dyn SceneSource,
    materials: &MaterialStore,
    mode: DecodeMode,
    fragment: &PendingFragment,
) -> Result<Mesh, AssetError> {
    let bytes = source.mesh(&fragment.composite_id)?;
    let material = materials.wait_for(&fragment.material_id)?;
    Ok(GeometryDecoder::decode_mesh(
        fragment.composite_id.as_str(),
        &bytes,
        mode,
        material,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::geometry::mesh_parser::tests::{encode, split_quad};
    use crate::assets::MemorySource;
    use crate::jobs::JobStatus;

    const GRAY: &str = r#"{ "userassets": ["0"], "materials": { "0": { "properties": {
        "colors": { "generic_diffuse": { "values": [{ "r": 0.4, "g": 0.4, "b": 0.4 }] } }
    } } } }"#;

    const TREE: &str = r#"{ "childs": [
        { "id": 1, "type": "Transform", "childs": [
            { "id": 10, "type": "Mesh", "fragments": [51], "materials": [2], "fragPolys": [2] },
            { "id": 11, "type": "Mesh", "fragments": [107], "materials": [2], "fragPolys": [2] }
        ] },
        { "id": 12, "type": "Mesh", "fragments": [992], "materials": [4], "fragPolys": [0] }
    ] }"#;

    struct Fixture {
        scheduler: JobScheduler,
        materials: Arc<MaterialStore>,
        meshes: Arc<MeshStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scheduler: JobScheduler::new(2).unwrap(),
                materials: Arc::new(MaterialStore::new()),
                meshes: Arc::new(MeshStore::new()),
            }
        }

        fn walk(&self, source: MemorySource, tree: &str, config: &LoaderConfig) -> WalkReport {
            let tree = InstanceTree::from_slice(tree.as_bytes()).unwrap();
            let report = SceneWalker::new(
                &self.scheduler,
                Arc::new(source),
                Arc::clone(&self.materials),
                Arc::clone(&self.meshes),
                config,
            )
            .walk(&tree);
            self.scheduler.wait();
            report
        }
    }

    #[test]
    fn test_shared_material_and_empty_fragment() {
        let fixture = Fixture::new();
        let source = MemorySource::new("s", TREE)
            .with_material("2", GRAY)
            .with_mesh("s-10-51", split_quad())
            .with_mesh("s-11-107", split_quad());

        let report = fixture.walk(source, TREE, &LoaderConfig::default());

        assert_eq!(report.nodes_visited, 4);
        assert_eq!(report.material_jobs, 1);
        assert_eq!(report.fragments_scheduled, 2);
        assert_eq!(report.fragments_skipped, 1);
        assert_eq!(report.mesh_jobs, 1);

        assert_eq!(fixture.meshes.len(), 2);
        assert_eq!(fixture.materials.len(), 1);
        let a = fixture.meshes.get("s-10-51").unwrap();
        let b = fixture.meshes.get("s-11-107").unwrap();
        assert!(Arc::ptr_eq(a.material(), b.material()));
        assert_eq!(fixture.scheduler.summary().errored, 0);
    }

    #[test]
    fn test_fragments_are_chunked() {
        let fixture = Fixture::new();
        let fragments: Vec<String> = (0..45).map(|i| i.to_string()).collect();
        let tree = format!(
            r#"{{ "childs": [ {{ "id": 5, "type": "Mesh", "fragments": [{0}], "materials": [{1}] }} ] }}"#,
            fragments.join(","),
            vec!["2"; 45].join(",")
        );

        let mut source = MemorySource::new("s", tree.as_str()).with_material("2", GRAY);
        for fragment in &fragments {
            source = source.with_mesh(format!("s-5-{fragment}"), split_quad());
        }

        let report = fixture.walk(source, &tree, &LoaderConfig::default());
        assert_eq!(report.fragments_scheduled, 45);
        assert_eq!(report.mesh_jobs, 3);
        assert_eq!(fixture.meshes.len(), 45);

        // One material job plus three chunks
        assert_eq!(fixture.scheduler.job_count(), 4);
    }

    #[test]
    fn test_failing_fragment_leaves_rest_of_chunk() {
        let fixture = Fixture::new();
        let tree = r#"{ "childs": [
            { "id": 7, "type": "Mesh", "fragments": [1, 2, 3], "materials": [2, 2, 2] }
        ] }"#;
        let source = MemorySource::new("s", tree)
            .with_material("2", GRAY)
            .with_mesh("s-7-1", split_quad())
            .with_mesh("s-7-2", encode(&[0.0, 0.0, 0.0], &[0, 0, 0], &[]))
            .with_mesh("s-7-3", split_quad());

        fixture.walk(source, tree, &LoaderConfig::default());

        assert_eq!(fixture.meshes.len(), 2);
        assert!(!fixture.meshes.contains("s-7-2"));
        assert!(matches!(
            fixture.scheduler.status("s-meshes-0"),
            Some(JobStatus::Errored(_))
        ));
    }

    #[test]
    fn test_missing_material_drops_its_fragments() {
        let fixture = Fixture::new();
        let tree = r#"{ "childs": [
            { "id": 7, "type": "Mesh", "fragments": [1, 2], "materials": [2, 9] }
        ] }"#;
        let source = MemorySource::new("s", tree)
            .with_material("2", GRAY)
            .with_mesh("s-7-1", split_quad())
            .with_mesh("s-7-2", split_quad());

        let config = LoaderConfig::default().with_mesh_chunk_size(1);
        let report = fixture.walk(source, tree, &config);

        assert_eq!(report.material_jobs, 2);
        assert_eq!(report.mesh_jobs, 2);
        assert!(fixture.meshes.contains("s-7-1"));
        assert!(!fixture.meshes.contains("s-7-2"));
        assert!(matches!(
            fixture.scheduler.status("s-material-9"),
            Some(JobStatus::Errored(_))
        ));
        assert_eq!(fixture.scheduler.status("s-meshes-0"), Some(JobStatus::Completed));
    }

    #[test]
    fn test_inconsistent_lists_counted() {
        let fixture = Fixture::new();
        let tree = r#"{ "childs": [
            { "id": 7, "type": "Mesh", "fragments": [1, 2], "materials": [2] }
        ] }"#;
        let source = MemorySource::new("s", tree)
            .with_material("2", GRAY)
            .with_mesh("s-7-1", split_quad());

        let report = fixture.walk(source, tree, &LoaderConfig::default());
        assert_eq!(report.inconsistent_nodes, 1);
        assert_eq!(report.fragments_scheduled, 1);
        assert_eq!(fixture.meshes.len(), 1);
    }
}
