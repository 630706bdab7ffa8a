use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Directory under the web root holding uploaded images.
pub const IMAGE_DIR: &str = "images";

const FALLBACK_STEM: &str = "image";
const FALLBACK_EXTENSION: &str = "bin";

#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// File name as sent by the client, possibly with a path.
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("the uploaded file is empty")]
    Empty,
    #[error("could not store the uploaded image: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ImageUploader {
    public_dir: PathBuf,
}

impl ImageUploader {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    pub fn image_dir(&self) -> PathBuf {
        self.public_dir.join(IMAGE_DIR)
    }

    /// Writes the image under `images/` and returns its path relative to the
    /// web root.
    pub async fn store(&self, image: &UploadedImage) -> Result<String, UploadError> {
        if image.bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        let dir = self.image_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let filename = unique_filename(image);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&filename))
            .await?;
        file.write_all(&image.bytes).await?;
        file.flush().await?;

        tracing::debug!(%filename, size = image.bytes.len(), "stored uploaded image");
        Ok(format!("{IMAGE_DIR}/{filename}"))
    }

    pub async fn remove(&self, relative_path: &str) -> Result<(), UploadError> {
        let Some(filename) = relative_path.strip_prefix(&format!("{IMAGE_DIR}/")) else {
            return Ok(());
        };
        tokio::fs::remove_file(self.image_dir().join(filename)).await?;
        Ok(())
    }

    /// Resolves a stored relative path against the web root.
    pub fn resolve(&self, relative_path: &str) -> PathBuf {
        relative_path
            .split('/')
            .fold(self.public_dir.clone(), |path, part| path.join(part))
    }
}

/// `<slug of the original stem>-<random token>.<extension>`
pub fn unique_filename(image: &UploadedImage) -> String {
    format!(
        "{}-{}.{}",
        safe_stem(&image.original_name),
        uniqueness_token(),
        guess_extension(&image.bytes, image.content_type.as_deref())
    )
}

fn safe_stem(original_name: &str) -> String {
    // Clients may send full paths, with either separator.
    let name = original_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let stem = Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let slug = slug::slugify(stem);
    if slug.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        slug
    }
}

fn uniqueness_token() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}

/// Content sniffing first, then the declared content type.
pub fn guess_extension(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.extension().to_string();
    }
    content_type
        .and_then(mime_guess::get_mime_extensions_str)
        .and_then(|extensions| extensions.first())
        .map(|extension| extension.to_string())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Signature, an IHDR chunk for a 1x1 image and IEND.
    const PNG_HEADER: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R', 0,
        0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0, 0x1F, 0x15, 0xC4, 0x89, 0, 0, 0, 0, b'I', b'E', b'N',
        b'D', 0xAE, 0x42, 0x60, 0x82,
    ];

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("newsroom-uploads-{}", uniqueness_token()))
    }

    fn png(name: &str) -> UploadedImage {
        UploadedImage {
            original_name: name.to_string(),
            content_type: Some("image/png".into()),
            bytes: PNG_HEADER.to_vec(),
        }
    }

    #[test]
    fn filename_keeps_slugged_stem_and_detected_extension() {
        let name = unique_filename(&png("My Holiday Photo.PNG"));
        let (stem, rest) = name.split_at("my-holiday-photo-".len());
        assert_eq!(stem, "my-holiday-photo-");
        let (token, extension) = rest.split_once('.').unwrap();
        assert_eq!(token.len(), 16);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(extension, "png");
    }

    #[test]
    fn client_paths_are_dropped() {
        assert!(unique_filename(&png("../../etc/passwd")).starts_with("passwd-"));
        assert!(unique_filename(&png("C:\\Users\\me\\cat.png")).starts_with("cat-"));
        assert!(unique_filename(&png("???.png")).starts_with("image-"));
    }

    #[test]
    fn two_uploads_of_the_same_file_get_different_names() {
        let image = png("cat.png");
        assert_ne!(unique_filename(&image), unique_filename(&image));
    }

    #[test]
    fn extension_falls_back_to_content_type_then_bin() {
        assert_eq!(guess_extension(PNG_HEADER, Some("image/jpeg")), "png");
        let from_type = guess_extension(b"plain", Some("image/gif"));
        assert_eq!(from_type, "gif");
        assert_eq!(guess_extension(b"plain", None), "bin");
        assert_eq!(guess_extension(b"plain", Some("nonsense")), "bin");
    }

    #[tokio::test]
    async fn stored_path_resolves_to_the_uploaded_bytes() {
        let uploader = ImageUploader::new(scratch_dir());
        let image = png("cat.png");
        let path = uploader.store(&image).await.unwrap();
        assert!(path.starts_with("images/cat-"));
        assert!(path.ends_with(".png"));
        let stored = tokio::fs::read(uploader.resolve(&path)).await.unwrap();
        assert_eq!(stored, image.bytes);

        uploader.remove(&path).await.unwrap();
        assert!(!uploader.resolve(&path).exists());
    }

    #[tokio::test]
    async fn empty_files_are_refused() {
        let uploader = ImageUploader::new(scratch_dir());
        let mut image = png("cat.png");
        image.bytes.clear();
        assert!(matches!(uploader.store(&image).await, Err(UploadError::Empty)));
    }

    #[tokio::test]
    async fn unwritable_target_is_an_io_failure() {
        let root = scratch_dir();
        tokio::fs::create_dir_all(&root).await.unwrap();
        // A plain file where the web root should be.
        let blocker = root.join("public");
        tokio::fs::write(&blocker, b"not a directory").await.unwrap();
        let uploader = ImageUploader::new(&blocker);
        assert!(matches!(
            uploader.store(&png("cat.png")).await,
            Err(UploadError::Io(_))
        ));
    }
}
