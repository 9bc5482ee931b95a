//! Addressable resources exposed to the agent layer.
//!
//! Filesystem roots are one kind among several; website and applet
//! resources share the same registry and persistence but carry no local
//! index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use filesystem::{file_uri_to_path, path_to_file_uri};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Website,
    Applet,
    File,
    Directory,
    Image,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Applet => "applet",
            Self::File => "file",
            Self::Directory => "directory",
            Self::Image => "image",
        }
    }

    /// True for kinds backed by a local path and routed to the path registry.
    pub fn is_filesystem_backed(self) -> bool {
        matches!(self, Self::File | Self::Directory | Self::Image)
    }
}

/// An addressable item with a URI and a set of invocable actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub icons: Vec<String>,
    /// Action id → JSON schema of its arguments.
    #[serde(default)]
    pub actions: HashMap<String, serde_json::Value>,
}

impl Resource {
    /// Builds a directory resource with the standard file actions.
    pub fn directory(path: &Path) -> Self {
        Self {
            uri: path_to_file_uri(path),
            name: display_name(path),
            description: format!("Local directory {}", path.display()),
            kind: ResourceKind::Directory,
            icons: Vec::new(),
            actions: file_actions(),
        }
    }

    /// Builds a single-file resource.
    pub fn file(path: &Path) -> Self {
        Self {
            uri: path_to_file_uri(path),
            name: display_name(path),
            description: format!("Local file {}", path.display()),
            kind: ResourceKind::File,
            icons: Vec::new(),
            actions: file_actions(),
        }
    }

    pub fn is_filesystem_backed(&self) -> bool {
        self.kind.is_filesystem_backed()
    }

    /// Local path for filesystem-backed resources.
    pub fn fs_path(&self) -> Option<PathBuf> {
        if !self.is_filesystem_backed() {
            return None;
        }
        file_uri_to_path(&self.uri).ok()
    }

    /// The root path this resource registers under: the path itself for
    /// directories, the parent directory for single files and images.
    pub fn registration_root(&self) -> Option<PathBuf> {
        let path = self.fs_path()?;
        match self.kind {
            ResourceKind::Directory => Some(path),
            _ => path.parent().map(Path::to_path_buf),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_actions() -> HashMap<String, serde_json::Value> {
    let mut actions = HashMap::new();
    actions.insert(
        "search".to_string(),
        json!({ "query": { "type": "string" } }),
    );
    actions.insert(
        "list".to_string(),
        json!({ "pattern": { "type": "string", "optional": true } }),
    );
    actions.insert("read".to_string(), json!({ "path": { "type": "string" } }));
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_resource_round_trips_its_path() {
        let resource = Resource::directory(Path::new("/data/projects"));
        assert_eq!(resource.uri, "file:///data/projects");
        assert_eq!(resource.name, "projects");
        assert_eq!(resource.fs_path(), Some(PathBuf::from("/data/projects")));
        assert_eq!(
            resource.registration_root(),
            Some(PathBuf::from("/data/projects"))
        );
    }

    #[test]
    fn file_resource_registers_under_its_parent() {
        let resource = Resource::file(Path::new("/data/projects/todo.md"));
        assert_eq!(
            resource.registration_root(),
            Some(PathBuf::from("/data/projects"))
        );
    }

    #[test]
    fn website_resources_have_no_fs_path() {
        let resource = Resource {
            uri: "https://example.com".to_string(),
            name: "example".to_string(),
            description: String::new(),
            kind: ResourceKind::Website,
            icons: Vec::new(),
            actions: HashMap::new(),
        };
        assert!(!resource.is_filesystem_backed());
        assert!(resource.fs_path().is_none());
    }

    #[test]
    fn serde_uses_camel_case_and_type_tag() {
        let resource = Resource::file(Path::new("/a/b.txt"));
        let value = serde_json::to_value(&resource).expect("serialize");
        assert_eq!(value["type"], "file");
        assert!(value.get("actions").is_some());
    }
}
