use system::{ConnectionId, Point, RoomId, StrokeData};

/// In-progress stroke accumulated between draw-start and draw-end. Never
/// shared; dropped with the session if the connection dies mid-stroke.
#[derive(Debug)]
pub struct StrokeBuffer {
    pub path: Vec<Point>,
    pub color: String,
    pub width: f32,
}

/// Explicit per-connection state. A connection is in at most one room at a
/// time; joining a second room switches membership.
#[derive(Debug)]
pub struct SessionRecord {
    pub connection_id: ConnectionId,
    pub room_id: Option<RoomId>,
    pub cursor_color: String,
    stroke: Option<StrokeBuffer>,
}

impl SessionRecord {
    pub fn new(connection_id: ConnectionId, cursor_color: String) -> Self {
        Self {
            connection_id,
            room_id: None,
            cursor_color,
            stroke: None,
        }
    }

    pub fn in_room(&self, room_id: &str) -> bool {
        self.room_id.as_deref() == Some(room_id)
    }

    pub fn begin_stroke(&mut self, x: f32, y: f32, color: String, width: f32) {
        self.stroke = Some(StrokeBuffer {
            path: vec![Point { x, y }],
            color,
            width,
        });
    }

    pub fn push_point(&mut self, x: f32, y: f32) {
        if let Some(stroke) = &mut self.stroke {
            stroke.path.push(Point { x, y });
        }
    }

    /// Ends the stroke. The client-sent path wins when present (it is the
    /// authoritative completed stroke); the buffer is the fallback.
    pub fn end_stroke(&mut self, path: Vec<Point>, color: String, width: f32) -> StrokeData {
        let buffered = self.stroke.take();
        let path = if path.is_empty() {
            buffered.map(|b| b.path).unwrap_or_default()
        } else {
            path
        };
        StrokeData {
            path,
            color,
            width,
            timestamp: system::epoch_millis(),
        }
    }

    pub fn discard_stroke(&mut self) {
        self.stroke = None;
    }

    pub fn has_stroke(&self) -> bool {
        self.stroke.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accumulates_points_between_start_and_end() {
        let mut session = SessionRecord::new(1, "#e6194b".into());
        session.begin_stroke(10.0, 10.0, "#000".into(), 5.0);
        session.push_point(20.0, 20.0);

        let stroke = session.end_stroke(Vec::new(), "#000".into(), 5.0);
        assert_eq!(
            stroke.path,
            vec![Point { x: 10.0, y: 10.0 }, Point { x: 20.0, y: 20.0 }]
        );
        assert!(!session.has_stroke());
    }

    #[test]
    fn it_prefers_the_client_sent_path() {
        let mut session = SessionRecord::new(1, "#e6194b".into());
        session.begin_stroke(0.0, 0.0, "#000".into(), 5.0);

        let sent = vec![Point { x: 1.0, y: 1.0 }, Point { x: 2.0, y: 2.0 }];
        let stroke = session.end_stroke(sent.clone(), "#000".into(), 5.0);
        assert_eq!(stroke.path, sent);
    }

    #[test]
    fn it_discards_the_buffer_without_persisting() {
        let mut session = SessionRecord::new(1, "#e6194b".into());
        session.begin_stroke(0.0, 0.0, "#000".into(), 5.0);
        session.discard_stroke();
        assert!(!session.has_stroke());
    }
}
