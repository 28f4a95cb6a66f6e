/// Opaque identifier the capture surface assigns to one finger/pointer contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TouchId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    TouchDown { lane: usize, y: f32, touch: TouchId },
    TouchUp { lane: usize, touch: TouchId },
}
