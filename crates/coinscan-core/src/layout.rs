use serde::{Deserialize, Serialize};

use crate::rect::RectF;

/// Number of coin slots in a column. Fixed by the reading format.
pub const SLOT_COUNT: usize = 6;

/// One slot of the vertical column.
///
/// `position` is the line number (1..=6, bottom-to-top), so the slot nearest
/// the top of the container carries position 6.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub position: u8,
    pub rect: RectF,
}

/// Geometry of the six-slot column, centred in its container.
///
/// Pure arithmetic over a container size; regenerate whenever the container
/// changes. No pixel data is involved.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SlotLayout {
    /// Side of one square slot, in container units.
    pub slot_side: f32,
    /// Vertical gap between consecutive slots.
    pub spacing: f32,
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self {
            slot_side: 100.0,
            spacing: 16.0,
        }
    }
}

impl SlotLayout {
    /// Six slot rects in container coordinates, top slot first.
    pub fn slots(&self, width: f32, height: f32) -> [Slot; SLOT_COUNT] {
        let total_height =
            SLOT_COUNT as f32 * self.slot_side + (SLOT_COUNT as f32 - 1.0) * self.spacing;
        let start_y = (height - total_height) / 2.0;
        let start_x = (width - self.slot_side) / 2.0;

        std::array::from_fn(|index| {
            let position = (SLOT_COUNT - index) as u8;
            let y = start_y + index as f32 * (self.slot_side + self.spacing);
            Slot {
                position,
                rect: RectF::new(start_x, y, self.slot_side, self.slot_side),
            }
        })
    }

    /// Six slot rects normalized to the container, top slot first.
    pub fn slots_normalized(&self, width: f32, height: f32) -> [Slot; SLOT_COUNT] {
        let mut slots = self.slots(width, height);
        for slot in &mut slots {
            slot.rect = RectF::new(
                slot.rect.x / width,
                slot.rect.y / height,
                slot.rect.width / width,
                slot.rect.height / height,
            );
        }
        slots
    }
}
