use std::collections::BTreeMap;

use crate::canvas::Canvas;
use crate::sprites::{SpriteDirection, SpriteLayout, SpritePart};

/// How a Thing's rasterized sprite reaches a target canvas.
#[derive(Debug, Clone)]
pub enum RenderMode {
    /// One pre-rendered canvas; every draw is a single blit or pattern fill.
    Cached(Canvas),
    /// A composite assembled from its part canvases on every draw.
    Live,
}

/// Part canvases of a composite sprite, one sprite tile each.
#[derive(Debug, Clone)]
pub struct SpriteCanvases {
    direction: SpriteDirection,
    layout: SpriteLayout,
    parts: BTreeMap<SpritePart, Canvas>,
}

impl SpriteCanvases {
    pub(crate) fn new(
        direction: SpriteDirection,
        layout: SpriteLayout,
        parts: BTreeMap<SpritePart, Canvas>,
    ) -> Self {
        Self {
            direction,
            layout,
            parts,
        }
    }

    pub fn direction(&self) -> SpriteDirection {
        self.direction
    }

    pub fn layout(&self) -> SpriteLayout {
        self.layout
    }

    pub fn part(&self, part: SpritePart) -> Option<&Canvas> {
        self.parts.get(&part)
    }

    pub fn parts(&self) -> impl Iterator<Item = (SpritePart, &Canvas)> + '_ {
        self.parts.iter().map(|(part, canvas)| (*part, canvas))
    }
}

/// Rasterized sprite state owned by a Thing. Dropped whenever the Thing's visual identity
/// changes so the next draw decodes again, and rebuilt when the Thing's box no longer matches
/// the footprint it was rasterized for.
#[derive(Debug, Clone)]
pub struct ThingSprite {
    num_sprites: usize,
    footprint: (u32, u32),
    render: RenderMode,
    canvases: Option<SpriteCanvases>,
}

impl ThingSprite {
    pub(crate) fn single(canvas: Canvas, footprint: (u32, u32)) -> Self {
        Self {
            num_sprites: 1,
            footprint,
            render: RenderMode::Cached(canvas),
            canvases: None,
        }
    }

    pub(crate) fn composite(
        render: RenderMode,
        canvases: SpriteCanvases,
        footprint: (u32, u32),
    ) -> Self {
        Self {
            num_sprites: 0,
            footprint,
            render,
            canvases: Some(canvases),
        }
    }

    /// 1 for a single sprite, 0 for a composite.
    pub fn num_sprites(&self) -> usize {
        self.num_sprites
    }

    /// Pixel size of the Thing's box when this sprite was rasterized.
    pub fn footprint(&self) -> (u32, u32) {
        self.footprint
    }

    pub fn is_composite(&self) -> bool {
        self.canvases.is_some()
    }

    pub fn render(&self) -> &RenderMode {
        &self.render
    }

    pub fn cached_canvas(&self) -> Option<&Canvas> {
        match &self.render {
            RenderMode::Cached(canvas) => Some(canvas),
            RenderMode::Live => None,
        }
    }

    pub fn canvases(&self) -> Option<&SpriteCanvases> {
        self.canvases.as_ref()
    }
}
