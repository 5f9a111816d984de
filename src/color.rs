//! Deterministic color assignment.
//!
//! Salespeople are a closed set with fixed colors. Categories and
//! products are open sets colored by first-seen position modulo the
//! palette, so a color is stable within one recompute but can move when
//! new data changes which category appears first.

/// Cyclic palette for open sets.
pub const PALETTE: [&str; 6] = ["#60a5fa", "#8b5cf6", "#10b981", "#f59e0b", "#ef4444", "#06b6d4"];

/// Fixed colors for the known sales team.
pub const SALES_PERSON_COLORS: [(&str, &str); 4] = [
    ("松澤", "#60a5fa"),
    ("坂口", "#10b981"),
    ("斉藤", "#f59e0b"),
    ("泉水", "#8b5cf6"),
];

pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Closed-set lookup. Unknown names have no assigned color.
pub fn person_color(name: &str) -> Option<&'static str> {
    SALES_PERSON_COLORS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, color)| *color)
}

fn is_reserved(color: &str) -> bool {
    SALES_PERSON_COLORS.iter().any(|(_, c)| *c == color)
}

/// Palette cycle with the fixed salesperson colors left out, so an unknown
/// name never shares a card color with a known one.
pub fn unreserved_color(index: usize) -> &'static str {
    PALETTE
        .iter()
        .copied()
        .filter(|c| !is_reserved(c))
        .cycle()
        .nth(index)
        .unwrap_or_else(|| palette_color(index))
}

/// Color to render for a salesperson: the fixed color when known,
/// otherwise the unreserved palette entry for their position among
/// unknown names.
pub fn resolve_person_color(name: &str, unknown_index: usize) -> &'static str {
    person_color(name).unwrap_or_else(|| unreserved_color(unknown_index))
}

/// Pair each key with its palette color by position.
pub fn assign_open_set<'a, K: 'a, I>(keys: I) -> Vec<(&'a K, &'static str)>
where
    I: IntoIterator<Item = &'a K>,
{
    keys.into_iter()
        .enumerate()
        .map(|(i, k)| (k, palette_color(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_people() {
        assert_eq!(person_color("坂口"), Some("#10b981"));
        assert_eq!(person_color("Nobody"), None);
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(palette_color(0), "#60a5fa");
        assert_eq!(palette_color(5), "#06b6d4");
        assert_eq!(palette_color(6), "#60a5fa");
        assert_eq!(palette_color(13), "#8b5cf6");
    }

    #[test]
    fn test_unknown_person_falls_back_to_palette() {
        assert_eq!(resolve_person_color("斉藤", 0), "#f59e0b");
        assert_eq!(resolve_person_color("Nobody", 0), "#ef4444");
        assert_eq!(resolve_person_color("Nobody", 1), "#06b6d4");
        assert_eq!(resolve_person_color("Nobody", 2), "#ef4444");
    }

    #[test]
    fn test_unknown_never_takes_fixed_color() {
        for i in 0..PALETTE.len() * 2 {
            let color = unreserved_color(i);
            assert!(SALES_PERSON_COLORS.iter().all(|(_, fixed)| *fixed != color), "{}", color);
        }
    }

    #[test]
    fn test_open_set_by_position() {
        let cats = vec!["Hardware".to_string(), "Services".to_string()];
        let colors = assign_open_set(&cats);
        assert_eq!(colors[0], (&cats[0], "#60a5fa"));
        assert_eq!(colors[1], (&cats[1], "#8b5cf6"));
    }
}
