//! Codename generation.

use rand::Rng;

use super::Codename;
use crate::config::CodenameWords;
use crate::error::{GeoDropError, GeoDropResult};

/// Word list for codenames (256 entries, 8 bits each).
pub const WORDS: &[&str] = &[
    "acorn", "adobe", "aerial", "agate", "alder", "almond", "amber", "anchor", "anvil",
    "apple", "apricot", "arbor", "arctic", "argon", "arrow", "aspen", "atlas", "autumn",
    "avenue", "badge", "bagel", "bamboo", "banjo", "barley", "barrel", "basalt", "basin",
    "beacon", "beagle", "bellow", "beryl", "birch", "biscuit", "bison", "blanket", "blossom",
    "bluff", "bonfire", "border", "boulder", "bramble", "breeze", "brick", "brook", "buckle",
    "bugle", "bundle", "burrow", "cabin", "cactus", "camel", "canal", "candle", "canopy",
    "canyon", "carbon", "cargo", "carpet", "cascade", "castle", "cedar", "cellar", "chalk",
    "channel", "charcoal", "cherry", "chestnut", "chimney", "cinder", "citrus", "clover",
    "cobalt", "cocoa", "comet", "compass", "copper", "coral", "cotton", "cradle", "crater",
    "cricket", "crystal", "cypress", "dagger", "dahlia", "delta", "desert", "dewdrop", "dingo",
    "dolphin", "domino", "donkey", "dragon", "drizzle", "dune", "eagle", "easel", "echo",
    "eclipse", "ember", "emerald", "engine", "falcon", "feather", "fennel", "ferry", "fiddle",
    "fjord", "flannel", "flint", "forest", "fossil", "fountain", "foxglove", "fresco", "frost",
    "galaxy", "garnet", "geyser", "ginger", "glacier", "granite", "gravel", "grotto", "gull",
    "hammock", "harbor", "harvest", "hazel", "heron", "hickory", "hollow", "honey", "horizon",
    "hornet", "igloo", "indigo", "iris", "island", "ivory", "jasper", "jetty", "juniper",
    "kayak", "kernel", "kettle", "kiwi", "lagoon", "lantern", "larch", "lattice", "lemon",
    "lichen", "lilac", "linen", "lizard", "locket", "lotus", "lumber", "magnet", "mango",
    "maple", "marble", "meadow", "melon", "meteor", "mint", "mirror", "mitten", "monsoon",
    "mosaic", "moss", "mural", "nectar", "nickel", "nutmeg", "oasis", "oatmeal", "ocean",
    "olive", "onyx", "orchard", "orchid", "otter", "oyster", "paddle", "pebble", "pepper",
    "pigeon", "pillow", "pine", "plaza", "plume", "pocket", "pollen", "poplar", "prairie",
    "pumpkin", "quarry", "quartz", "quill", "rabbit", "radish", "raven", "reef", "ribbon",
    "ridge", "river", "robin", "rocket", "saddle", "saffron", "salmon", "sandal", "sapling",
    "satchel", "scarlet", "shadow", "shell", "sierra", "silver", "sketch", "sparrow", "spruce",
    "squall", "summit", "sunset", "swallow", "tablet", "tango", "thistle", "thunder", "timber",
    "topaz", "trout", "tulip", "tundra", "tunnel", "turnip", "umber", "valley", "vapor",
    "velvet", "violet", "walnut", "walrus", "wheat", "whistle", "willow", "wombat", "yarrow",
    "yucca", "zephyr", "zenith", "zigzag", "zinc",
];

/// Generate a fresh codename of `words` space-separated words.
///
/// `words` must fall inside the configured range.
pub fn generate_codename(words: usize, range: &CodenameWords) -> GeoDropResult<Codename> {
    if !(range.min..=range.max).contains(&words) {
        return Err(GeoDropError::InvalidCodename(format!(
            "word count must be within {}..={}",
            range.min, range.max
        )));
    }

    let mut rng = rand::rng();
    let phrase = (0..words)
        .map(|_| WORDS[rng.random_range(0..WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Codename::new(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_list_has_no_duplicates() {
        let mut sorted = WORDS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), WORDS.len());
        assert!(WORDS.iter().all(|w| !w.contains(' ')));
    }

    #[test]
    fn test_generate_word_count() {
        let range = CodenameWords::default();
        for words in range.min..=range.max {
            let codename = generate_codename(words, &range).unwrap();
            assert_eq!(codename.expose().split(' ').count(), words);
            assert!(codename.expose().split(' ').all(|w| WORDS.contains(&w)));
        }
    }

    #[test]
    fn test_generate_out_of_range() {
        let range = CodenameWords::default();
        assert!(matches!(
            generate_codename(6, &range),
            Err(GeoDropError::InvalidCodename(_))
        ));
        assert!(generate_codename(11, &range).is_err());
    }

    #[test]
    fn test_generate_is_random() {
        let range = CodenameWords::default();
        let a = generate_codename(8, &range).unwrap();
        let b = generate_codename(8, &range).unwrap();
        assert_ne!(a.expose(), b.expose());
    }
}
