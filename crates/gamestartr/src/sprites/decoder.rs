use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use super::keys::SpriteKeyError;
use crate::things::Thing;

/// Raw RGBA8 bytes, row-major, sized to the Thing's sprite in device pixels.
pub type PixelBuffer = Vec<u8>;

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("unknown sprite direction '{0}'; expected vertical, horizontal, or corners")]
    UnknownDirection(String),
    #[error("unknown sprite part '{0}'")]
    UnknownPart(String),
    #[error("no sprite registered for key '{key}'")]
    UnknownSprite { key: String },
    #[error("invalid sprite key or path '{key}': {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: SpriteKeyError,
    },
    #[error("sprite image {width}x{height} needs {expected} bytes, got {actual}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("sprite '{key}' is missing an image")]
    MissingImage { key: String },
    #[error("failed to read sprite file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode sprite image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid sprite manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },
}

/// Layout of a composite sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpriteDirection {
    Vertical,
    Horizontal,
    Corners,
}

impl FromStr for SpriteDirection {
    type Err = SpriteError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "vertical" => Ok(Self::Vertical),
            "horizontal" => Ok(Self::Horizontal),
            "corners" => Ok(Self::Corners),
            other => Err(SpriteError::UnknownDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpritePart {
    Top,
    Right,
    Bottom,
    Left,
    Middle,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl SpritePart {
    pub const ALL: [SpritePart; 9] = [
        SpritePart::Top,
        SpritePart::Right,
        SpritePart::Bottom,
        SpritePart::Left,
        SpritePart::Middle,
        SpritePart::TopLeft,
        SpritePart::TopRight,
        SpritePart::BottomLeft,
        SpritePart::BottomRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpritePart::Top => "top",
            SpritePart::Right => "right",
            SpritePart::Bottom => "bottom",
            SpritePart::Left => "left",
            SpritePart::Middle => "middle",
            SpritePart::TopLeft => "topLeft",
            SpritePart::TopRight => "topRight",
            SpritePart::BottomLeft => "bottomLeft",
            SpritePart::BottomRight => "bottomRight",
        }
    }
}

impl fmt::Display for SpritePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpritePart {
    type Err = SpriteError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|part| part.name() == value)
            .ok_or_else(|| SpriteError::UnknownPart(value.to_string()))
    }
}

/// Edge band sizes and middle behaviour of a composite. Band sizes are in tile units; `None`
/// means the band is one full sprite tile thick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpriteLayout {
    pub top_height: Option<f64>,
    pub right_width: Option<f64>,
    pub bottom_height: Option<f64>,
    pub left_width: Option<f64>,
    pub middle_stretch: bool,
}

/// A composite sprite: directional sub-sprites assembled around a middle.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteMultiple {
    direction: SpriteDirection,
    layout: SpriteLayout,
    parts: BTreeMap<SpritePart, PixelBuffer>,
}

impl SpriteMultiple {
    /// Parses the direction name; an unrecognized direction has no safe default layout and is
    /// rejected.
    pub fn new(direction: &str) -> Result<Self, SpriteError> {
        Ok(Self::with_direction(direction.parse()?))
    }

    pub fn with_direction(direction: SpriteDirection) -> Self {
        Self {
            direction,
            layout: SpriteLayout::default(),
            parts: BTreeMap::new(),
        }
    }

    pub fn with_part(mut self, part: SpritePart, pixels: PixelBuffer) -> Self {
        self.parts.insert(part, pixels);
        self
    }

    pub fn with_layout(mut self, layout: SpriteLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn direction(&self) -> SpriteDirection {
        self.direction
    }

    pub fn layout(&self) -> SpriteLayout {
        self.layout
    }

    pub fn parts(&self) -> impl Iterator<Item = (SpritePart, &[u8])> + '_ {
        self.parts
            .iter()
            .map(|(part, pixels)| (*part, pixels.as_slice()))
    }

    pub fn part(&self, part: SpritePart) -> Option<&[u8]> {
        self.parts.get(&part).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedSprite {
    Single(PixelBuffer),
    Multiple(SpriteMultiple),
}

/// Turns sprite keys into raw pixels for a Thing's current size.
pub trait SpriteDecoder {
    /// Deterministic for a given key and Thing state.
    fn decode(&mut self, key: &str, thing: &Thing) -> Result<DecodedSprite, SpriteError>;

    /// Copies raw RGBA bytes. Buffers are expected to be the same length; only the common
    /// prefix is copied when they are not.
    fn memcpy_u8(&self, source: &[u8], destination: &mut [u8]) {
        let len = source.len().min(destination.len());
        destination[..len].copy_from_slice(&source[..len]);
    }
}
