use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Quit,
}

const ACTION_COUNT: usize = 5;

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Quit => 4,
        }
    }

    /// WASD and the arrow keys move; Escape quits.
    pub fn from_physical_key(key: PhysicalKey) -> Option<Self> {
        match key {
            PhysicalKey::Code(KeyCode::KeyW) | PhysicalKey::Code(KeyCode::ArrowUp) => {
                Some(InputAction::MoveUp)
            }
            PhysicalKey::Code(KeyCode::KeyS) | PhysicalKey::Code(KeyCode::ArrowDown) => {
                Some(InputAction::MoveDown)
            }
            PhysicalKey::Code(KeyCode::KeyA) | PhysicalKey::Code(KeyCode::ArrowLeft) => {
                Some(InputAction::MoveLeft)
            }
            PhysicalKey::Code(KeyCode::KeyD) | PhysicalKey::Code(KeyCode::ArrowRight) => {
                Some(InputAction::MoveRight)
            }
            PhysicalKey::Code(KeyCode::Escape) => Some(InputAction::Quit),
            _ => None,
        }
    }
}

/// Held state of every [`InputAction`], sampled once per simulation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    down: [bool; ACTION_COUNT],
}

impl InputState {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    /// Unit direction from the held movement keys; opposing keys cancel out.
    pub fn direction(&self) -> (f64, f64) {
        let axis = |negative: InputAction, positive: InputAction| {
            let held = |action: InputAction| f64::from(u8::from(self.is_down(action)));
            held(positive) - held(negative)
        };
        (
            axis(InputAction::MoveLeft, InputAction::MoveRight),
            axis(InputAction::MoveUp, InputAction::MoveDown),
        )
    }
}
