//! Avatars and colors unlocked by level.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CosmeticKind {
    Avatar,
    Color,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Cosmetic {
    pub id: &'static str,
    pub kind: CosmeticKind,
    pub unlock_level: u32,
}

pub const COSMETICS: &[Cosmetic] = &[
    Cosmetic {
        id: "avatar_box",
        kind: CosmeticKind::Avatar,
        unlock_level: 1,
    },
    Cosmetic {
        id: "color_slate",
        kind: CosmeticKind::Color,
        unlock_level: 1,
    },
    Cosmetic {
        id: "avatar_truck",
        kind: CosmeticKind::Avatar,
        unlock_level: 2,
    },
    Cosmetic {
        id: "color_teal",
        kind: CosmeticKind::Color,
        unlock_level: 3,
    },
    Cosmetic {
        id: "avatar_rocket",
        kind: CosmeticKind::Avatar,
        unlock_level: 4,
    },
    Cosmetic {
        id: "color_amber",
        kind: CosmeticKind::Color,
        unlock_level: 5,
    },
    Cosmetic {
        id: "avatar_owl",
        kind: CosmeticKind::Avatar,
        unlock_level: 6,
    },
    Cosmetic {
        id: "color_crimson",
        kind: CosmeticKind::Color,
        unlock_level: 8,
    },
    Cosmetic {
        id: "avatar_crown",
        kind: CosmeticKind::Avatar,
        unlock_level: 10,
    },
];

/// Every cosmetic available at `level` or below.
pub fn cosmetics_for_level(level: u32) -> impl Iterator<Item = &'static Cosmetic> {
    COSMETICS.iter().filter(move |c| c.unlock_level <= level)
}
