use gamestartr::sprites::{SpriteDirection, SpriteLayout, SpritePart};
use gamestartr::{Rgba, SpriteError, SpriteImage, SpriteLibrary};

pub const GRASS: Rgba = [84, 164, 64, 255];

const CLEAR: Rgba = [0, 0, 0, 0];
const LEAF: Rgba = [30, 110, 40, 255];
const LEAF_LIGHT: Rgba = [56, 140, 56, 255];
const BARK: Rgba = [110, 70, 30, 255];
const STONE: Rgba = [128, 128, 136, 255];
const STONE_DARK: Rgba = [88, 88, 96, 255];
const PETAL_RED: Rgba = [220, 60, 60, 255];
const PETAL_YELLOW: Rgba = [240, 210, 60, 255];
const WOOD: Rgba = [150, 100, 50, 255];
const WATER: Rgba = [60, 120, 220, 255];
const SHORE: Rgba = [200, 180, 120, 255];
const SKIN: Rgba = [240, 200, 160, 255];
const TUNIC: Rgba = [40, 60, 200, 255];
const EYE: Rgba = [20, 20, 20, 255];

/// Which way the hero sprite faces; doubles as the class added to the hero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Down,
    Up,
    Left,
    Right,
}

impl Facing {
    pub const ALL: [Facing; 4] = [Facing::Down, Facing::Up, Facing::Left, Facing::Right];

    pub fn class(self) -> &'static str {
        match self {
            Facing::Down => "down",
            Facing::Up => "up",
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }

    /// Facing for a movement direction; horizontal movement wins on diagonals.
    pub fn from_direction(dx: f64, dy: f64) -> Option<Self> {
        if dx < 0.0 {
            Some(Facing::Left)
        } else if dx > 0.0 {
            Some(Facing::Right)
        } else if dy < 0.0 {
            Some(Facing::Up)
        } else if dy > 0.0 {
            Some(Facing::Down)
        } else {
            None
        }
    }
}

/// Fills in every overworld sprite `library` does not already have, so art loaded from disk
/// takes precedence.
pub fn register_missing(library: &mut SpriteLibrary) -> Result<(), SpriteError> {
    let singles = [
        ("Tree", tree()),
        ("Rock", rock()),
        ("Flowers", flowers()),
    ];
    for (key, image) in singles {
        if !library.contains(key) {
            library.register(key, image)?;
        }
    }
    for facing in Facing::ALL {
        let key = format!("Hero {}", facing.class());
        if !library.contains(&key) {
            library.register(&key, hero(facing))?;
        }
    }

    if !library.contains("Fence") {
        library.register_multiple(
            "Fence",
            SpriteDirection::Horizontal,
            SpriteLayout {
                left_width: Some(4.0),
                right_width: Some(4.0),
                ..SpriteLayout::default()
            },
            [
                (SpritePart::Left, fence_post()),
                (SpritePart::Middle, fence_rails()),
                (SpritePart::Right, fence_post()),
            ],
        )?;
    }
    if !library.contains("Pond") {
        library.register_multiple(
            "Pond",
            SpriteDirection::Corners,
            SpriteLayout {
                top_height: Some(4.0),
                right_width: Some(4.0),
                bottom_height: Some(4.0),
                left_width: Some(4.0),
                middle_stretch: true,
            },
            [
                (SpritePart::TopLeft, SpriteImage::solid(1, 1, SHORE)),
                (SpritePart::Top, SpriteImage::solid(1, 1, SHORE)),
                (SpritePart::TopRight, SpriteImage::solid(1, 1, SHORE)),
                (SpritePart::Left, SpriteImage::solid(1, 1, SHORE)),
                (SpritePart::Middle, ripples()),
                (SpritePart::Right, SpriteImage::solid(1, 1, SHORE)),
                (SpritePart::BottomLeft, SpriteImage::solid(1, 1, SHORE)),
                (SpritePart::Bottom, SpriteImage::solid(1, 1, SHORE)),
                (SpritePart::BottomRight, SpriteImage::solid(1, 1, SHORE)),
            ],
        )?;
    }
    Ok(())
}

fn inside_ellipse(x: u32, y: u32, cx: f64, cy: f64, rx: f64, ry: f64) -> bool {
    let nx = (f64::from(x) + 0.5 - cx) / rx;
    let ny = (f64::from(y) + 0.5 - cy) / ry;
    nx * nx + ny * ny <= 1.0
}

fn tree() -> SpriteImage {
    SpriteImage::from_fn(16, 16, |x, y| {
        if y >= 11 && (6..10).contains(&x) {
            BARK
        } else if inside_ellipse(x, y, 8.0, 6.0, 7.0, 6.0) {
            if (x + y) % 5 == 0 {
                LEAF_LIGHT
            } else {
                LEAF
            }
        } else {
            CLEAR
        }
    })
}

fn rock() -> SpriteImage {
    SpriteImage::from_fn(16, 16, |x, y| {
        if !inside_ellipse(x, y, 8.0, 9.0, 7.0, 5.5) {
            CLEAR
        } else if y > 10 {
            STONE_DARK
        } else {
            STONE
        }
    })
}

fn flowers() -> SpriteImage {
    SpriteImage::from_fn(16, 16, |x, y| match (x, y) {
        (3, 4) | (11, 9) => PETAL_RED,
        (7, 12) | (13, 3) => PETAL_YELLOW,
        _ => CLEAR,
    })
}

fn hero(facing: Facing) -> SpriteImage {
    SpriteImage::from_fn(16, 16, move |x, y| {
        let head = inside_ellipse(x, y, 8.0, 5.0, 4.0, 4.0);
        let body = (4..12).contains(&x) && (9..15).contains(&y);
        let eye = match facing {
            Facing::Down => y == 5 && (x == 6 || x == 9),
            Facing::Up => false,
            Facing::Left => y == 5 && x == 5,
            Facing::Right => y == 5 && x == 10,
        };
        if eye {
            EYE
        } else if head {
            if facing == Facing::Up {
                BARK
            } else {
                SKIN
            }
        } else if body {
            TUNIC
        } else {
            CLEAR
        }
    })
}

fn fence_post() -> SpriteImage {
    SpriteImage::from_fn(16, 16, |_, y| if y >= 2 { WOOD } else { CLEAR })
}

fn fence_rails() -> SpriteImage {
    SpriteImage::from_fn(16, 16, |_, y| {
        if (5..7).contains(&y) || (10..12).contains(&y) {
            WOOD
        } else {
            CLEAR
        }
    })
}

fn ripples() -> SpriteImage {
    SpriteImage::from_fn(8, 8, |x, y| {
        if (x + 2 * y) % 7 == 0 {
            [120, 170, 240, 255]
        } else {
            WATER
        }
    })
}
