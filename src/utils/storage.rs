use actix_web::web;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

pub const BUCKET: &str = "attendance-photos";

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

pub fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&JPEG_MAGIC)
}

/// Check-in photos on disk, exposed under a public base URL.
#[derive(Clone, Debug)]
pub struct PhotoStorage {
    root: PathBuf,
    public_base: String,
}

impl PhotoStorage {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    pub fn object_name(user_id: u64, at: DateTime<Utc>) -> String {
        format!("attendance_{}_{}.jpg", user_id, at.timestamp_millis())
    }

    /// Only names produced by [`PhotoStorage::object_name`] are served.
    pub fn is_valid_name(name: &str) -> bool {
        let Some(stem) = name
            .strip_prefix("attendance_")
            .and_then(|rest| rest.strip_suffix(".jpg"))
        else {
            return false;
        };
        let mut parts = stem.split('_');
        matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(user), Some(millis), None)
                if !user.is_empty()
                    && !millis.is_empty()
                    && user.bytes().all(|b| b.is_ascii_digit())
                    && millis.bytes().all(|b| b.is_ascii_digit())
        )
    }

    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.public_base.trim_end_matches('/'), BUCKET, name)
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(BUCKET).join(name)
    }

    /// Writes the photo without overwriting and returns its public URL.
    pub async fn upload(&self, user_id: u64, bytes: Vec<u8>, at: DateTime<Utc>) -> Result<String> {
        let name = Self::object_name(user_id, at);
        let path = self.path_of(&name);

        web::block(move || -> Result<()> {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            }
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            file.write_all(&bytes)?;
            Ok(())
        })
        .await
        .map_err(|e| anyhow!("photo upload task failed: {e}"))??;

        Ok(self.public_url(&name))
    }

    /// `None` when the name is not a stored photo.
    pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if !Self::is_valid_name(name) {
            return Ok(None);
        }
        let path = self.path_of(name);

        web::block(move || match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow!(e).context(format!("reading {}", path.display()))),
        })
        .await
        .map_err(|e| anyhow!("photo read task failed: {e}"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_storage() -> PhotoStorage {
        let root = std::env::temp_dir().join(format!("absensi-photos-{}", uuid::Uuid::new_v4()));
        PhotoStorage::new(root, "https://cdn.sekolah.sch.id/photos/")
    }

    #[test]
    fn names_are_per_user_and_timestamped() {
        let at = Utc.timestamp_millis_opt(1_760_680_000_123).unwrap();
        let name = PhotoStorage::object_name(42, at);
        assert_eq!(name, "attendance_42_1760680000123.jpg");
        assert!(PhotoStorage::is_valid_name(&name));
    }

    #[test]
    fn traversal_and_foreign_names_are_invalid() {
        for name in [
            "../etc/passwd",
            "attendance_1_2.png",
            "attendance__2.jpg",
            "attendance_1_2_3.jpg",
            "attendance_1_..jpg",
            "photo.jpg",
        ] {
            assert!(!PhotoStorage::is_valid_name(name), "{name}");
        }
    }

    #[test]
    fn public_url_joins_bucket() {
        let storage = temp_storage();
        assert_eq!(
            storage.public_url("attendance_1_2.jpg"),
            "https://cdn.sekolah.sch.id/photos/attendance-photos/attendance_1_2.jpg"
        );
    }

    #[test]
    fn jpeg_magic_is_checked() {
        assert!(looks_like_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]));
        assert!(!looks_like_jpeg(b"\x89PNG\r\n"));
        assert!(!looks_like_jpeg(&[]));
    }

    #[actix_web::test]
    async fn upload_then_read_back_without_overwrite() {
        let storage = temp_storage();
        let at = Utc.timestamp_millis_opt(1_760_680_000_000).unwrap();
        let photo = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];

        let url = storage.upload(5, photo.clone(), at).await.unwrap();
        assert!(url.ends_with("/attendance-photos/attendance_5_1760680000000.jpg"));

        let stored = storage.read("attendance_5_1760680000000.jpg").await.unwrap();
        assert_eq!(stored, Some(photo.clone()));

        // same user, same millisecond
        assert!(storage.upload(5, photo, at).await.is_err());
        assert_eq!(storage.read("attendance_5_1.jpg").await.unwrap(), None);
    }
}
