//! Moves an assembled table from letterboxed frame space back into
//! original-image space, frame by frame.

use std::collections::HashMap;

use crate::geometry::coords::{FrameSpace, ImageSpace};
use crate::geometry::letterbox::Letterbox;
use crate::pipeline::result_table::{ResultRow, ResultTable};

/// Undoes each row's letterbox, looked up by the row's frame id.
///
/// Box origin and landmarks lose the padding and are divided by the scale;
/// box extents are divided by the scale only. A frame without an entry is
/// taken as unscaled and unpadded. NaN coordinates stay NaN.
pub fn correct_letterbox(
    table: ResultTable<FrameSpace>,
    letterboxes: &HashMap<usize, Letterbox>,
) -> ResultTable<ImageSpace> {
    let model_info = table.model_info().clone();
    let rows = table
        .into_rows()
        .into_iter()
        .map(|row| match letterboxes.get(&row.frame) {
            Some(lb) => correct_row(row, lb),
            None => {
                let lb = Letterbox::identity(row.frame_width, row.frame_height);
                correct_row(row, &lb)
            }
        })
        .collect();
    ResultTable::from_rows(rows, model_info)
}

fn correct_row(row: ResultRow<FrameSpace>, lb: &Letterbox) -> ResultRow<ImageSpace> {
    let face_box = lb.undo_box(&row.face_box);
    let landmarks = lb.undo_landmarks(&row.landmarks);
    row.reproject(face_box, landmarks)
}
