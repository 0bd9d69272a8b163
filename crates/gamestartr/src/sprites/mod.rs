mod decoder;
mod keys;
mod library;

pub use decoder::{
    DecodedSprite, PixelBuffer, SpriteDecoder, SpriteDirection, SpriteError, SpriteLayout,
    SpriteMultiple, SpritePart,
};
pub use keys::{validate_sprite_key, validate_sprite_path, SpriteKeyError};
pub use library::{SpriteImage, SpriteLibrary, SPRITE_MANIFEST_FILE};
