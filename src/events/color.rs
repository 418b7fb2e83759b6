use super::model::BucketType;

/// Reserved for away/active buckets so they never collide with an activity color.
pub const AFK_COLOR: &str = "gray";

pub const PALETTE: [&str; 12] = [
    "red", "orange", "amber", "yellow", "lime", "green", "teal", "cyan", "blue", "indigo",
    "violet", "pink",
];

/// Color token of an activity. Same name always maps to the same token, across sessions and
/// machines, so no palette state has to be stored anywhere.
pub fn color_for(display_name: &str, bucket_type: &BucketType) -> &'static str {
    if bucket_type.is_afk() {
        return AFK_COLOR;
    }
    PALETTE[(string_hash(display_name) % PALETTE.len() as u32) as usize]
}

/// 32-bit FNV-1a. Unlike [std::hash::DefaultHasher] it is guaranteed to stay the same between
/// releases.
fn string_hash(value: &str) -> u32 {
    value.bytes().fold(0x811c_9dc5u32, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(0x0100_0193)
    })
}

#[cfg(test)]
mod tests {
    use super::{color_for, string_hash, AFK_COLOR, PALETTE};
    use crate::events::model::BucketType;

    #[test]
    fn afk_gets_reserved_color() {
        assert_eq!(color_for("Away", &BucketType::AfkStatus), AFK_COLOR);
        assert_eq!(color_for("Active", &BucketType::AfkStatus), AFK_COLOR);
    }

    #[test]
    fn color_is_stable() {
        assert_eq!(string_hash(""), 0x811c_9dc5);
        assert_eq!(string_hash("a"), 0xe40c_292c);
        let first = color_for("Firefox", &BucketType::Window);
        assert_eq!(first, color_for("Firefox", &BucketType::Browser));
        assert!(PALETTE.contains(&first));
        assert_ne!(first, AFK_COLOR);
    }
}
