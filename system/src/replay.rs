use crate::types::{DrawOp, StrokeData};

/// Drops every op before the most recent `Clear`. A clear logically
/// truncates history for replay purposes but stays in the sequence as the
/// newest authoritative reset.
pub fn compact(ops: Vec<DrawOp>) -> Vec<DrawOp> {
    match ops.iter().rposition(DrawOp::is_clear) {
        Some(idx) => ops.into_iter().skip(idx).collect(),
        None => ops,
    }
}

/// Replays a history against a blank canvas: the strokes a client would
/// see after applying every op in order.
pub fn visible_strokes(ops: &[DrawOp]) -> Vec<&StrokeData> {
    let mut visible = Vec::new();
    for op in ops {
        match op {
            DrawOp::Stroke(stroke) => visible.push(stroke),
            DrawOp::Clear { .. } => visible.clear(),
        }
    }
    visible
}
