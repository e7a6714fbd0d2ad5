use crate::types::ConnectionId;

const PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#9a6324",
];

/// Cursor color for a connection. Pure function of the id, so every
/// observer renders the same participant in the same color.
pub fn cursor_color(connection_id: ConnectionId) -> &'static str {
    let checksum = connection_id
        .to_le_bytes()
        .iter()
        .fold(0usize, |acc, b| acc.wrapping_add(*b as usize));
    PALETTE[checksum % PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_is_deterministic() {
        for id in 0..100u64 {
            assert_eq!(cursor_color(id), cursor_color(id));
        }
    }

    #[test]
    fn it_always_picks_from_the_palette() {
        for id in [0u64, 1, 7, 8, 255, 256, u64::MAX] {
            assert!(PALETTE.contains(&cursor_color(id)));
        }
    }
}
