//! Image collaborator.
//!
//! Pixel work is not done here. [`ImageStore`] is the seam a host plugs a
//! real imaging backend into; [`ImageRegistry`] is the default store, which
//! only tracks names, geometry and provenance.

use indexmap::IndexMap;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Keyed registry of named images plus one working pointer.
pub trait ImageStore: std::fmt::Debug {
    /// Loads `path` under `name` and makes it the working image.
    fn load(&mut self, name: &str, path: &Path) -> Result<()>;

    fn save(&mut self, name: &str, path: &Path) -> Result<()>;

    /// Composites the file at `path` onto `target`.
    fn overlay(&mut self, target: &str, path: &Path, at: Point) -> Result<()>;

    /// Composites the named image `source` onto `target`.
    fn draw(&mut self, target: &str, source: &str, at: Point) -> Result<()>;

    /// Creates a blank image filled with `color` and makes it the working image.
    fn background(&mut self, name: &str, color: &str, size: Size) -> Result<()>;

    fn resize(&mut self, name: &str, size: Size) -> Result<()>;

    fn set_working(&mut self, name: &str) -> Result<()>;

    fn working(&self) -> Option<String>;

    fn clear(&mut self);
}

/// One layer composited onto an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    File { path: PathBuf, at: Point },
    Image { name: String, at: Point },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageEntry {
    pub source: Option<PathBuf>,
    pub size: Option<Size>,
    pub background: Option<String>,
    pub layers: Vec<Layer>,
}

/// Default store: remembers what was done to each image.
///
/// Saving an untouched image that came from a file copies that file to the
/// destination. Anything else needs a real imaging backend.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    images: IndexMap<String, ImageEntry>,
    working: Option<String>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ImageEntry> {
        self.images.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut ImageEntry> {
        self.images
            .get_mut(name)
            .ok_or_else(|| Error::ImageError(format!("no image named '{}'", name)))
    }
}

impl ImageStore for ImageRegistry {
    fn load(&mut self, name: &str, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(Error::ImageError(format!("'{}' is not a file", path.display())));
        }
        self.images.insert(
            name.to_string(),
            ImageEntry { source: Some(path.to_path_buf()), ..Default::default() },
        );
        self.working = Some(name.to_string());
        debug!("Loaded image '{}' from '{}'", name, path.display());
        Ok(())
    }

    fn save(&mut self, name: &str, path: &Path) -> Result<()> {
        let entry = self.entry_mut(name)?;
        let source = match (&entry.source, entry.size, entry.layers.is_empty()) {
            (Some(source), None, true) => source.clone(),
            _ => {
                return Err(Error::ImageError(format!(
                    "image '{}' has no pixel data to write without an imaging backend",
                    name
                )))
            }
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, path)?;
        debug!("Saved image '{}' to '{}'", name, path.display());
        Ok(())
    }

    fn overlay(&mut self, target: &str, path: &Path, at: Point) -> Result<()> {
        let entry = self.entry_mut(target)?;
        entry.layers.push(Layer::File { path: path.to_path_buf(), at });
        Ok(())
    }

    fn draw(&mut self, target: &str, source: &str, at: Point) -> Result<()> {
        if !self.images.contains_key(source) {
            return Err(Error::ImageError(format!("no image named '{}'", source)));
        }
        let entry = self.entry_mut(target)?;
        entry.layers.push(Layer::Image { name: source.to_string(), at });
        Ok(())
    }

    fn background(&mut self, name: &str, color: &str, size: Size) -> Result<()> {
        self.images.insert(
            name.to_string(),
            ImageEntry {
                size: Some(size),
                background: Some(color.to_string()),
                ..Default::default()
            },
        );
        self.working = Some(name.to_string());
        Ok(())
    }

    fn resize(&mut self, name: &str, size: Size) -> Result<()> {
        self.entry_mut(name)?.size = Some(size);
        Ok(())
    }

    fn set_working(&mut self, name: &str) -> Result<()> {
        if !self.images.contains_key(name) {
            return Err(Error::ImageError(format!("no image named '{}'", name)));
        }
        self.working = Some(name.to_string());
        Ok(())
    }

    fn working(&self) -> Option<String> {
        self.working.clone()
    }

    fn clear(&mut self) {
        self.images.clear();
        self.working = None;
    }
}
