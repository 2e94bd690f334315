use tracing::debug;

use crate::domain::TVError;
use crate::table::DataTable;

#[derive(Debug)]
struct MountPoint {
    id: String,
    content: Option<DataTable>,
}

/// Named containers a table can be mounted into.
#[derive(Debug, Default)]
pub struct Screen {
    mounts: Vec<MountPoint>,
}

impl Screen {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mounts: ids
                .into_iter()
                .map(|id| MountPoint {
                    id: id.into(),
                    content: None,
                })
                .collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mounts.iter().any(|m| m.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&DataTable> {
        self.mounts
            .iter()
            .find(|m| m.id == id)
            .and_then(|m| m.content.as_ref())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DataTable> {
        self.mounts
            .iter_mut()
            .find(|m| m.id == id)
            .and_then(|m| m.content.as_mut())
    }

    /// Replaces whatever the mount point held.
    pub(crate) fn replace(&mut self, id: &str, table: DataTable) -> Result<&mut DataTable, TVError> {
        let mount = self
            .mounts
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| TVError::MountPointNotFound(id.to_string()))?;
        if mount.content.is_some() {
            debug!("Replacing content of mount point \"{id}\"");
        }
        Ok(mount.content.insert(table))
    }
}
