use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the fixed mood catalog. Ids are stable and externally
/// assigned; the slider index is a position in [`MOOD_CATALOG`], never an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub name: &'static str,
    pub emoji: &'static str,
}

const fn entry(id: u128, name: &'static str, emoji: &'static str) -> CatalogEntry {
    CatalogEntry {
        id: Uuid::from_u128(id),
        name,
        emoji,
    }
}

pub static MOOD_CATALOG: [CatalogEntry; 27] = [
    entry(0x0c201584_5002_4fbe_93c7_5dd880f66cda, "Envy", "😒"),
    entry(0x10eda853_f311_4c38_a1d5_73c8e2d9f6c7, "Sadness", "😢"),
    entry(0x146459cc_9fcb_424e_bb69_02165a2b1921, "Entrancement", "🌟"),
    entry(0x19157e19_e80d_4ca8_97be_776a6d7ec797, "Fear", "😨"),
    entry(0x1d04b2c6_d0fa_4816_b078_29e6e1bb1d6c, "Excitement", "🤗"),
    entry(0x205b014f_2442_4c3f_8ee3_8c1a18b2c010, "Nostalgia", "🥹"),
    entry(0x2ec9e382_5722_4911_b019_e10bf7f2c374, "Interest", "🤔"),
    entry(0x302386fe_8029_422a_8693_6bbe1b0bf7ab, "Boredom", "😑"),
    entry(0x35727e2f_e89c_45cc_859c_5b8ff727155f, "Romance", "💝"),
    entry(0x3ac06a09_761d_4810_a357_563cec631fb7, "Craving", "🤤"),
    entry(0x4ddd0dfd_cc92_4c52_80cf_a524496ff5ba, "Admiration", "🤩"),
    entry(0x5f19aae7_ecc6_4d76_af5d_bf39e968303b, "Disgust", "🤢"),
    entry(0x8a73b8bb_7f66_4fb4_93fe_927a234fae9e, "Anxiety", "😰"),
    entry(0xa2075d1e_6050_40d4_ac1c_03b4ad98d983, "Amusement", "😄"),
    entry(0xa6d2a478_927a_4c08_bc47_20f5258ee72a, "Joy", "😊"),
    entry(0xacff6c1d_20c9_45be_aa9c_30e079ab5029, "Awkwardness", "😅"),
    entry(0xb6ea9555_7a03_44c9_950d_acbd30d705fd, "Satisfaction", "😊"),
    entry(0xbaa95cca_0768_4e6f_84c7_838f2e18f076, "Aesthetic appreciation", "🎨"),
    entry(0xbabac918_83b2_4d4c_b046_bf7604a105e6, "Confusion", "😕"),
    entry(0xbe5139fa_7d5d_4474_a2ce_be8c2afdd180, "Sexual desire", "💖"),
    entry(0xc7a9bcf4_da1d_4d97_9b68_2a3391339e62, "Sympathy", "🫂"),
    entry(0xcdb8ca89_c02c_441b_bf8e_12b28888d8f0, "Empathetic pain", "💔"),
    entry(0xd79b5a3b_5987_419e_a9eb_8005872d37ab, "Adoration", "😍"),
    entry(0xda04488f_52ce_4c52_9937_6c2839cb5d8e, "Horror", "😱"),
    entry(0xdfc45935_a240_455b_b658_e7ed2a73032f, "Calmness", "😌"),
    entry(0xe210ef52_f332_4bd9_958b_46576d8dc035, "Triumph", "🏆"),
    entry(0xfdf256da_21fa_48f4_b5d9_e61ecfc5ed19, "Awe", "😲"),
];

/// Look up a catalog entry by its durable id.
pub fn find(id: Uuid) -> Option<&'static CatalogEntry> {
    MOOD_CATALOG.iter().find(|m| m.id == id)
}

/// Wire form of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mood {
    pub id: Uuid,
    pub name: String,
    pub emoji: String,
}

impl From<&CatalogEntry> for Mood {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.to_string(),
            emoji: entry.emoji.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_ids_are_unique() {
        let ids: HashSet<Uuid> = MOOD_CATALOG.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), MOOD_CATALOG.len());
    }

    #[test]
    fn find_uses_durable_ids() {
        let calm: Uuid = "dfc45935-a240-455b-b658-e7ed2a73032f".parse().unwrap();
        assert_eq!(find(calm).map(|m| m.name), Some("Calmness"));
        assert!(find(Uuid::nil()).is_none());
    }

    #[test]
    fn catalog_order_is_not_alphabetical() {
        let names: Vec<&str> = MOOD_CATALOG.iter().map(|m| m.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_ne!(names, sorted);
        assert_eq!(MOOD_CATALOG[13].name, "Amusement");
    }
}
