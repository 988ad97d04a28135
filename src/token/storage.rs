use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Where persisted auth data lives. Implementations store one JSON document.
pub trait TokenStorage: Send + Sync {
    fn read(&self) -> io::Result<Option<String>>;
    fn write(&self, contents: &str) -> io::Result<()>;
    fn remove(&self) -> io::Result<()>;
}

impl<T: TokenStorage + ?Sized> TokenStorage for Box<T> {
    fn read(&self) -> io::Result<Option<String>> {
        (**self).read()
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        (**self).write(contents)
    }

    fn remove(&self) -> io::Result<()> {
        (**self).remove()
    }
}

/// `auth-<profile>.json` under the client config directory.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(dir: impl AsRef<Path>, profile: &str) -> Self {
        Self { path: dir.as_ref().join(format!("auth-{}.json", profile)) }
    }

    /// `$NVLP_CONFIG_DIR`, falling back to `~/.config/nvlp`.
    pub fn default_dir() -> io::Result<PathBuf> {
        if let Ok(custom_dir) = std::env::var("NVLP_CONFIG_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }
        let home = std::env::var("HOME")
            .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME environment variable not set"))?;
        Ok(PathBuf::from(home).join(".config").join("nvlp"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents)
    }

    fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    contents: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(self.contents.lock().map_err(|_| poisoned())?.clone())
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        *self.contents.lock().map_err(|_| poisoned())? = Some(contents.to_string());
        Ok(())
    }

    fn remove(&self) -> io::Result<()> {
        *self.contents.lock().map_err(|_| poisoned())? = None;
        Ok(())
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "token storage lock poisoned")
}
