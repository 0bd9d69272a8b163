use std::path::{Component, Path};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("sprite name is empty")]
    Empty,
    #[error("words in a sprite key are separated by exactly one space")]
    Spacing,
    #[error("sprite path is absolute")]
    LeadingSlash,
    #[error("sprite path uses a backslash separator")]
    Backslash,
    #[error("sprite path climbs out of the sprite directory")]
    ParentTraversal,
    #[error("sprite path is not a .png file")]
    NotPng,
    #[error("'{character}' is not allowed in sprite names")]
    InvalidCharacter { character: char },
}

/// A sprite key is a title followed by zero or more class names, one space apart,
/// e.g. `"Player walking left"`.
pub fn validate_sprite_key(key: &str) -> Result<(), SpriteKeyError> {
    if key.is_empty() {
        return Err(SpriteKeyError::Empty);
    }
    if key.split(' ').any(str::is_empty) {
        return Err(SpriteKeyError::Spacing);
    }
    reject_chars(key, |ch| {
        ch.is_ascii_alphanumeric() || ch == ' ' || ch == '_' || ch == '-'
    })
}

/// Image paths in a sprite manifest are lowercase, relative, and stay inside the sprite
/// directory.
pub fn validate_sprite_path(path: &str) -> Result<(), SpriteKeyError> {
    if path.is_empty() {
        return Err(SpriteKeyError::Empty);
    }
    if path.contains('\\') {
        return Err(SpriteKeyError::Backslash);
    }
    for component in Path::new(path).components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {
                return Err(SpriteKeyError::LeadingSlash)
            }
            Component::ParentDir => return Err(SpriteKeyError::ParentTraversal),
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    if path.contains("..") {
        return Err(SpriteKeyError::ParentTraversal);
    }
    reject_chars(path, |ch| {
        ch.is_ascii_lowercase() || ch.is_ascii_digit() || "_-./".contains(ch)
    })?;
    match path.strip_suffix(".png") {
        Some(stem) if !stem.is_empty() && !stem.ends_with('/') => Ok(()),
        _ => Err(SpriteKeyError::NotPng),
    }
}

fn reject_chars(text: &str, allowed: impl Fn(char) -> bool) -> Result<(), SpriteKeyError> {
    match text.chars().find(|&ch| !allowed(ch)) {
        Some(character) => Err(SpriteKeyError::InvalidCharacter { character }),
        None => Ok(()),
    }
}
