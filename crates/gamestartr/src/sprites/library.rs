use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use image::ImageReader;
use serde::Deserialize;
use tracing::{debug, info};

use super::decoder::{
    DecodedSprite, PixelBuffer, SpriteDecoder, SpriteDirection, SpriteError, SpriteLayout,
    SpriteMultiple, SpritePart,
};
use super::keys::{validate_sprite_key, validate_sprite_path};
use crate::canvas::Rgba;
use crate::things::Thing;

pub const SPRITE_MANIFEST_FILE: &str = "sprites.json";

/// Unscaled RGBA source art for one sprite or sprite part.
#[derive(Clone, PartialEq, Eq)]
pub struct SpriteImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl fmt::Debug for SpriteImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl SpriteImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, SpriteError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(SpriteError::BufferSize {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn from_fn(width: u32, height: u32, color_at: impl Fn(u32, u32) -> Rgba) -> Self {
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&color_at(x, y));
            }
        }
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn solid(width: u32, height: u32, color: Rgba) -> Self {
        Self::from_fn(width, height, |_, _| color)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Nearest-neighbour resample to `width` x `height` device pixels.
    fn resample(&self, width: u32, height: u32) -> PixelBuffer {
        let mut out = Vec::with_capacity(width as usize * height as usize * 4);
        if self.width == 0 || self.height == 0 {
            out.resize(width as usize * height as usize * 4, 0);
            return out;
        }
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as usize;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as usize;
                let offset = (src_y * self.width as usize + src_x) * 4;
                out.extend_from_slice(&self.rgba[offset..offset + 4]);
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
enum LibraryEntry {
    Single(SpriteImage),
    Multiple {
        direction: SpriteDirection,
        layout: SpriteLayout,
        parts: BTreeMap<SpritePart, SpriteImage>,
    },
}

/// In-memory sprite registry that decodes keys by scaling registered art to each Thing's sprite
/// size.
///
/// Keys resolve by longest registered prefix: `"Player walking left"` falls back to
/// `"Player walking"` and then `"Player"`.
#[derive(Debug, Default)]
pub struct SpriteLibrary {
    entries: HashMap<String, LibraryEntry>,
    decoded: HashMap<(String, u32, u32), DecodedSprite>,
}

impl SpriteLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn register(&mut self, key: &str, image: SpriteImage) -> Result<(), SpriteError> {
        validate_key(key)?;
        self.insert(key, LibraryEntry::Single(image));
        Ok(())
    }

    pub fn register_multiple(
        &mut self,
        key: &str,
        direction: SpriteDirection,
        layout: SpriteLayout,
        parts: impl IntoIterator<Item = (SpritePart, SpriteImage)>,
    ) -> Result<(), SpriteError> {
        validate_key(key)?;
        self.insert(
            key,
            LibraryEntry::Multiple {
                direction,
                layout,
                parts: parts.into_iter().collect(),
            },
        );
        Ok(())
    }

    /// Loads `sprites.json` and the PNG files it names from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, SpriteError> {
        let manifest_path = dir.join(SPRITE_MANIFEST_FILE);
        let raw = fs::read_to_string(&manifest_path).map_err(|source| SpriteError::Io {
            path: manifest_path.clone(),
            source,
        })?;
        let deserializer = &mut serde_json::Deserializer::from_str(&raw);
        let manifest: SpriteManifest =
            serde_path_to_error::deserialize(deserializer).map_err(|error| {
                SpriteError::Manifest {
                    path: manifest_path.clone(),
                    message: format!("{}: {}", error.path(), error.inner()),
                }
            })?;

        let mut library = Self::new();
        for (key, entry) in manifest.sprites {
            match entry.direction {
                Some(direction) => {
                    let direction = direction.parse::<SpriteDirection>()?;
                    let mut parts = BTreeMap::new();
                    for (part_name, image_path) in &entry.parts {
                        let part = part_name.parse::<SpritePart>()?;
                        parts.insert(part, load_png(dir, image_path)?);
                    }
                    let layout = SpriteLayout {
                        top_height: entry.top_height,
                        right_width: entry.right_width,
                        bottom_height: entry.bottom_height,
                        left_width: entry.left_width,
                        middle_stretch: entry.middle_stretch,
                    };
                    library.register_multiple(&key, direction, layout, parts)?;
                }
                None => {
                    let image_path = entry
                        .image
                        .as_deref()
                        .ok_or_else(|| SpriteError::MissingImage { key: key.clone() })?;
                    library.register(&key, load_png(dir, image_path)?)?;
                }
            }
        }
        info!(
            dir = %dir.display(),
            sprite_count = library.len(),
            "sprite_library_loaded"
        );
        Ok(library)
    }

    fn insert(&mut self, key: &str, entry: LibraryEntry) {
        self.decoded.retain(|(decoded_key, _, _), _| decoded_key != key);
        self.entries.insert(key.to_string(), entry);
    }

    fn resolve(&self, key: &str) -> Option<(&str, &LibraryEntry)> {
        let mut candidate = key;
        loop {
            if let Some((stored_key, entry)) = self.entries.get_key_value(candidate) {
                return Some((stored_key.as_str(), entry));
            }
            let (shorter, _) = candidate.rsplit_once(' ')?;
            candidate = shorter;
        }
    }
}

impl SpriteDecoder for SpriteLibrary {
    fn decode(&mut self, key: &str, thing: &Thing) -> Result<DecodedSprite, SpriteError> {
        validate_key(key)?;
        let width = thing.sprite_width_pixels();
        let height = thing.sprite_height_pixels();
        let (resolved_key, entry) = self
            .resolve(key)
            .ok_or_else(|| SpriteError::UnknownSprite {
                key: key.to_string(),
            })?;
        let cache_key = (resolved_key.to_string(), width, height);
        if let Some(decoded) = self.decoded.get(&cache_key) {
            return Ok(decoded.clone());
        }

        let decoded = match entry {
            LibraryEntry::Single(image) => DecodedSprite::Single(image.resample(width, height)),
            LibraryEntry::Multiple {
                direction,
                layout,
                parts,
            } => DecodedSprite::Multiple(parts.iter().fold(
                SpriteMultiple::with_direction(*direction).with_layout(*layout),
                |sprite, (part, image)| sprite.with_part(*part, image.resample(width, height)),
            )),
        };
        debug!(key, resolved_key = %cache_key.0, width, height, "sprite_decoded");
        self.decoded.insert(cache_key, decoded.clone());
        Ok(decoded)
    }
}

#[derive(Debug, Deserialize)]
struct SpriteManifest {
    sprites: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    parts: BTreeMap<String, String>,
    #[serde(default)]
    top_height: Option<f64>,
    #[serde(default)]
    right_width: Option<f64>,
    #[serde(default)]
    bottom_height: Option<f64>,
    #[serde(default)]
    left_width: Option<f64>,
    #[serde(default)]
    middle_stretch: bool,
}

fn validate_key(key: &str) -> Result<(), SpriteError> {
    validate_sprite_key(key).map_err(|source| SpriteError::InvalidKey {
        key: key.to_string(),
        source,
    })
}

fn load_png(dir: &Path, relative: &str) -> Result<SpriteImage, SpriteError> {
    validate_sprite_path(relative).map_err(|source| SpriteError::InvalidKey {
        key: relative.to_string(),
        source,
    })?;
    let path = dir.join(relative);
    let reader = ImageReader::open(&path).map_err(|source| SpriteError::Io {
        path: path.clone(),
        source,
    })?;
    let decoded = reader.decode().map_err(|source| SpriteError::Image {
        path: path.clone(),
        source,
    })?;
    let image = decoded.to_rgba8();
    SpriteImage::new(image.width(), image.height(), image.into_raw())
}
