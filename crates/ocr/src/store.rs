use image::ImageFormat;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Content-addressed on-disk store for original uploads.
///
/// Files are keyed by the SHA-256 of their bytes and get an extension derived
/// from the detected image format. Client-supplied filenames never reach the
/// filesystem.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write `data` under its content hash; an existing file with the same
    /// hash is overwritten with identical bytes.
    pub fn put(&self, data: &[u8], format: Option<ImageFormat>) -> io::Result<PathBuf> {
        let hash_hex = to_hex(&sha256_bytes(data));
        let dest = upload_path(&self.root, &hash_hex, extension_for(format));
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, data)?;
        Ok(dest)
    }
}

fn extension_for(format: Option<ImageFormat>) -> &'static str {
    format
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("bin")
}

pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex, 64 chars.
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Layout: `<base>/<first_2_hex_chars>/<full_hex>.<ext>`
pub fn upload_path(base: &Path, hash_hex: &str, ext: &str) -> PathBuf {
    base.join(&hash_hex[..2]).join(format!("{hash_hex}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            to_hex(&sha256_bytes(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn upload_path_layout() {
        let base = PathBuf::from("/srv/uploads");
        let hash = "ab".repeat(32);
        assert_eq!(
            upload_path(&base, &hash, "png"),
            PathBuf::from(format!("/srv/uploads/ab/{hash}.png"))
        );
    }

    #[test]
    fn put_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let a = store.put(b"same bytes", Some(ImageFormat::Png)).unwrap();
        let b = store.put(b"same bytes", Some(ImageFormat::Png)).unwrap();
        let c = store.put(b"other bytes", Some(ImageFormat::Png)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with(dir.path()));
        assert_eq!(a.extension().unwrap(), "png");
        assert_eq!(std::fs::read(&a).unwrap(), b"same bytes");
    }

    #[test]
    fn unknown_format_uses_bin_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let p = store.put(b"????", None).unwrap();
        assert_eq!(p.extension().unwrap(), "bin");
    }
}
