use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use codecity_core::aggregate::Aggregate;
use codecity_core::types::{MetricsRecord, ObjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Project,
    Package,
    File,
    Struct,
}

/// One node of the package → file → struct tree rendered as a city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityNode {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub lines: usize,
    pub methods: usize,
    pub attributes: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CityNode>,
}

impl CityNode {
    fn new(name: &str, kind: NodeKind, path: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            path: path.map(str::to_string),
            lines: 0,
            methods: 0,
            attributes: 0,
            children: Vec::new(),
        }
    }

    fn add_metrics(&mut self, record: &MetricsRecord) {
        self.lines += record.lines;
        self.methods += record.methods;
        self.attributes += record.attributes;
    }

    fn push_child(&mut self, child: CityNode) {
        self.lines += child.lines;
        self.methods += child.methods;
        self.attributes += child.attributes;
        self.children.push(child);
    }

    /// Number of `Struct` nodes in this subtree.
    pub fn struct_count(&self) -> usize {
        let own = usize::from(self.kind == NodeKind::Struct);
        own + self.children.iter().map(CityNode::struct_count).sum::<usize>()
    }
}

/// Flat per-identity entry, sorted by (path, package, name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub path: String,
    pub package: String,
    pub name: String,
    pub lines: usize,
    pub methods: usize,
    pub attributes: usize,
}

impl ObjectEntry {
    fn new(id: &ObjectId, record: &MetricsRecord) -> Self {
        Self {
            path: id.path.clone(),
            package: id.package.clone(),
            name: record.name.clone(),
            lines: record.lines,
            methods: record.methods,
            attributes: record.attributes,
        }
    }
}

/// Document handed to the city renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityDocument {
    pub project: String,
    pub generated_at: DateTime<Utc>,
    pub root: CityNode,
    pub objects: Vec<ObjectEntry>,
}

#[derive(Default)]
struct FileGroup<'a> {
    residual: Option<&'a MetricsRecord>,
    structs: Vec<&'a MetricsRecord>,
}

fn package_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => ".",
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl CityDocument {
    pub fn new(project: &str, aggregate: &Aggregate) -> Self {
        // directory -> file path -> objects
        let mut packages: BTreeMap<&str, BTreeMap<&str, FileGroup>> = BTreeMap::new();
        for (id, record) in aggregate {
            let group = packages
                .entry(package_dir(&id.path))
                .or_default()
                .entry(id.path.as_str())
                .or_default();
            if id.is_residual() {
                group.residual = Some(record);
            } else {
                group.structs.push(record);
            }
        }

        let mut root = CityNode::new(project, NodeKind::Project, None);
        for (dir, files) in packages {
            let mut package = CityNode::new(dir, NodeKind::Package, Some(dir));
            for (path, group) in files {
                let mut file = CityNode::new(file_name(path), NodeKind::File, Some(path));
                if let Some(residual) = group.residual {
                    file.add_metrics(residual);
                }
                for record in group.structs {
                    let mut node = CityNode::new(&record.name, NodeKind::Struct, Some(path));
                    node.add_metrics(record);
                    file.push_child(node);
                }
                package.push_child(file);
            }
            root.push_child(package);
        }

        let objects = aggregate
            .iter()
            .map(|(id, record)| ObjectEntry::new(id, record))
            .collect();

        Self {
            project: project.to_string(),
            generated_at: Utc::now(),
            root,
            objects,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
