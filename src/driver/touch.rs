use crate::host::TouchPoint;

/// Contacts tracked at once.
pub const MAX_TOUCHES: usize = 8;

pub type TouchFrame = [Option<TouchPoint>; MAX_TOUCHES];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TouchAction {
    Released = 0,
    Pressed = 1,
    Moved = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub slot: usize,
    pub x: i32,
    pub y: i32,
    pub action: TouchAction,
}

/// Turns per-frame contact snapshots into press/move/release events.
#[derive(Debug, Default)]
pub struct TouchTracker {
    last: [Option<(i32, i32)>; MAX_TOUCHES],
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `frame` with the previous one. Coordinates are multiplied
    /// by `scale` and truncated. A contact that did not move emits nothing.
    pub fn update(&mut self, frame: &TouchFrame, scale: f32) -> Vec<TouchEvent> {
        let mut events = Vec::new();
        for (slot, (current, last)) in frame.iter().zip(self.last.iter_mut()).enumerate() {
            match (current, *last) {
                (Some(point), previous) => {
                    let position = ((point.x * scale) as i32, (point.y * scale) as i32);
                    let action = match previous {
                        None => Some(TouchAction::Pressed),
                        Some(before) if before != position => Some(TouchAction::Moved),
                        Some(_) => None,
                    };
                    if let Some(action) = action {
                        events.push(TouchEvent {
                            slot,
                            x: position.0,
                            y: position.1,
                            action,
                        });
                    }
                    *last = Some(position);
                }
                (None, Some((x, y))) => {
                    events.push(TouchEvent {
                        slot,
                        x,
                        y,
                        action: TouchAction::Released,
                    });
                    *last = None;
                }
                (None, None) => {}
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(points: &[(usize, f32, f32)]) -> TouchFrame {
        let mut frame = [None; MAX_TOUCHES];
        for &(slot, x, y) in points {
            frame[slot] = Some(TouchPoint { x, y });
        }
        frame
    }

    #[test]
    fn press_move_release_sequence() {
        let mut tracker = TouchTracker::new();

        let events = tracker.update(&frame(&[(0, 100.0, 51.0)]), 0.5);
        assert_eq!(
            events,
            [TouchEvent {
                slot: 0,
                x: 50,
                y: 25,
                action: TouchAction::Pressed
            }]
        );

        // sub-pixel motion after scaling is not a move
        assert!(tracker.update(&frame(&[(0, 101.0, 50.0)]), 0.5).is_empty());

        let events = tracker.update(&frame(&[(0, 120.0, 50.0)]), 0.5);
        assert_eq!(events[0].action, TouchAction::Moved);
        assert_eq!((events[0].x, events[0].y), (60, 25));

        let events = tracker.update(&frame(&[]), 0.5);
        assert_eq!(
            events,
            [TouchEvent {
                slot: 0,
                x: 60,
                y: 25,
                action: TouchAction::Released
            }]
        );
        assert!(tracker.update(&frame(&[]), 0.5).is_empty());
    }

    #[test]
    fn slots_are_independent() {
        let mut tracker = TouchTracker::new();
        tracker.update(&frame(&[(0, 10.0, 10.0)]), 1.0);
        let events = tracker.update(&frame(&[(0, 10.0, 10.0), (7, 3.0, 4.0)]), 1.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].slot, 7);
        assert_eq!(events[0].action, TouchAction::Pressed);
        assert_eq!(TouchAction::Pressed as i32, 1);
    }
}
