//! Binary resource manager: uploaded images and their derived previews.
//!
//! Each slot holds at most one [`ImageResource`] plus exactly one preview
//! file on disk. Replacing or clearing a slot deletes the superseded
//! preview synchronously, never deferring to teardown, so the invariant
//! "live preview files == occupied slots" holds at every step.
//!
//! Preview files are never shared between slots: copying a resource into
//! another slot mints a fresh preview owned by the target slot.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Named holder for one image resource and its derived preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    EmbedInput,
    ExtractOriginal,
    ExtractSuspect,
    VerifyInput,
}

impl SlotKey {
    pub fn label(&self) -> &'static str {
        match self {
            SlotKey::EmbedInput => "embed input image",
            SlotKey::ExtractOriginal => "original image",
            SlotKey::ExtractSuspect => "suspect image",
            SlotKey::VerifyInput => "suspect image",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            SlotKey::EmbedInput => "embed-input",
            SlotKey::ExtractOriginal => "extract-original",
            SlotKey::ExtractSuspect => "extract-suspect",
            SlotKey::VerifyInput => "verify-input",
        }
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write preview {path}: {source}")]
    Preview {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// An uploaded or exported binary image. Immutable once created.
#[derive(Debug, Clone)]
pub struct ImageResource {
    bytes: Vec<u8>,
    mime_type: String,
    name: String,
}

impl ImageResource {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            name: name.into(),
        }
    }

    /// Build a resource from a file on disk, guessing the mime type from
    /// the extension.
    pub fn from_file(path: &Path) -> Result<Self, ResourceError> {
        let bytes = fs::read(path).map_err(|source| ResourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime = mime_for_extension(path);
        Ok(Self::new(bytes, mime, name))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[derive(Debug)]
struct SlotEntry {
    resource: ImageResource,
    preview: PathBuf,
}

/// Owns all resource slots and their preview files.
///
/// The store is the sole mutator of preview lifetime; no other component
/// may delete or reassign a preview it does not own.
#[derive(Debug)]
pub struct ResourceStore {
    preview_dir: PathBuf,
    slots: HashMap<SlotKey, SlotEntry>,
}

impl ResourceStore {
    pub fn new(preview_dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&preview_dir)?;
        Ok(Self {
            preview_dir,
            slots: HashMap::new(),
        })
    }

    /// Place a resource in a slot, deriving a fresh preview file and
    /// revoking the slot's previous preview (if any) immediately.
    pub fn set_resource(
        &mut self,
        slot: SlotKey,
        resource: ImageResource,
    ) -> Result<&ImageResource, ResourceError> {
        let preview = self
            .preview_dir
            .join(format!("{}-{}.png", slot.file_stem(), Uuid::new_v4()));
        fs::write(&preview, resource.bytes()).map_err(|source| ResourceError::Preview {
            path: preview.clone(),
            source,
        })?;

        if let Some(prev) = self.slots.insert(slot, SlotEntry { resource, preview }) {
            // Revocation is synchronous: the superseded preview must be
            // gone before the caller observes the new one.
            let _ = fs::remove_file(&prev.preview);
            debug!(slot = slot.file_stem(), "replaced slot resource, previous preview revoked");
        } else {
            debug!(slot = slot.file_stem(), "slot resource set");
        }
        Ok(&self.slots[&slot].resource)
    }

    /// Revoke the slot's preview and drop the resource reference.
    pub fn clear(&mut self, slot: SlotKey) {
        if let Some(entry) = self.slots.remove(&slot) {
            let _ = fs::remove_file(&entry.preview);
            debug!(slot = slot.file_stem(), "slot cleared");
        }
    }

    pub fn get(&self, slot: SlotKey) -> Option<&ImageResource> {
        self.slots.get(&slot).map(|e| &e.resource)
    }

    pub fn preview_path(&self, slot: SlotKey) -> Option<&Path> {
        self.slots.get(&slot).map(|e| e.preview.as_path())
    }

    pub fn is_set(&self, slot: SlotKey) -> bool {
        self.slots.contains_key(&slot)
    }

    pub fn occupied_slots(&self) -> usize {
        self.slots.len()
    }

    /// Count preview files actually present on disk. Used to check the
    /// leak-freedom invariant: this must equal `occupied_slots()`.
    pub fn live_previews(&self) -> std::io::Result<usize> {
        Ok(fs::read_dir(&self.preview_dir)?.count())
    }

    pub fn clear_all(&mut self) {
        let keys: Vec<SlotKey> = self.slots.keys().copied().collect();
        for slot in keys {
            self.clear(slot);
        }
    }
}

impl Drop for ResourceStore {
    fn drop(&mut self) {
        self.clear_all();
        let _ = fs::remove_dir(&self.preview_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ResourceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ResourceStore::new(dir.path().join("previews")).unwrap();
        (dir, store)
    }

    fn res(name: &str, fill: u8) -> ImageResource {
        ImageResource::new(vec![fill; 16], "image/png", name)
    }

    #[test]
    fn test_set_then_replace_leaves_one_preview() {
        let (_dir, mut store) = store();
        store.set_resource(SlotKey::EmbedInput, res("a.png", 1)).unwrap();
        let first = store
            .preview_path(SlotKey::EmbedInput)
            .unwrap()
            .to_path_buf();
        assert!(first.exists());

        store.set_resource(SlotKey::EmbedInput, res("b.png", 2)).unwrap();
        let second = store
            .preview_path(SlotKey::EmbedInput)
            .unwrap()
            .to_path_buf();

        assert_ne!(first, second);
        assert!(!first.exists(), "superseded preview must be revoked");
        assert!(second.exists());
        assert_eq!(store.live_previews().unwrap(), 1);
        assert_eq!(store.get(SlotKey::EmbedInput).unwrap().name(), "b.png");
    }

    #[test]
    fn test_clear_revokes_preview() {
        let (_dir, mut store) = store();
        store.set_resource(SlotKey::VerifyInput, res("v.png", 3)).unwrap();
        let preview = store
            .preview_path(SlotKey::VerifyInput)
            .unwrap()
            .to_path_buf();
        store.clear(SlotKey::VerifyInput);
        assert!(!preview.exists());
        assert!(store.get(SlotKey::VerifyInput).is_none());
        assert_eq!(store.live_previews().unwrap(), 0);
    }

    #[test]
    fn test_copy_across_slots_mints_own_preview() {
        let (_dir, mut store) = store();
        let original = res("shared.png", 7);
        store
            .set_resource(SlotKey::EmbedInput, original.clone())
            .unwrap();
        store
            .set_resource(SlotKey::ExtractOriginal, original)
            .unwrap();

        let a = store.preview_path(SlotKey::EmbedInput).unwrap();
        let b = store.preview_path(SlotKey::ExtractOriginal).unwrap();
        assert_ne!(a, b, "slots must not share preview ownership");
        assert_eq!(store.live_previews().unwrap(), 2);

        // Clearing one slot must not touch the other's preview.
        let b = b.to_path_buf();
        store.clear(SlotKey::EmbedInput);
        assert!(b.exists());
        assert_eq!(store.live_previews().unwrap(), 1);
    }

    #[test]
    fn test_previews_match_occupied_slots() {
        let (_dir, mut store) = store();
        store.set_resource(SlotKey::EmbedInput, res("1.png", 1)).unwrap();
        store.set_resource(SlotKey::ExtractOriginal, res("2.png", 2)).unwrap();
        store.set_resource(SlotKey::ExtractSuspect, res("3.png", 3)).unwrap();
        store.set_resource(SlotKey::EmbedInput, res("4.png", 4)).unwrap();
        assert_eq!(store.occupied_slots(), 3);
        assert_eq!(store.live_previews().unwrap(), 3);
    }

    #[test]
    fn test_mime_guess() {
        assert_eq!(mime_for_extension(Path::new("x.PNG")), "image/png");
        assert_eq!(mime_for_extension(Path::new("x.jpeg")), "image/jpeg");
        assert_eq!(
            mime_for_extension(Path::new("x.dat")),
            "application/octet-stream"
        );
    }
}
