/// Passphrase dictionary. Lowercase ASCII, no separators, no duplicates.
pub const WORDS: &[&str] = &[
    "amber", "anchor", "apple", "arrow", "aspen", "atlas", "autumn", "badger",
    "bamboo", "banner", "basin", "beacon", "birch", "blossom", "bramble", "breeze",
    "bronze", "cactus", "canyon", "carbon", "castle", "cedar", "cherry", "cinder",
    "citrus", "clover", "cobalt", "comet", "copper", "coral", "cosmic", "cradle",
    "crystal", "cypress", "dawn", "delta", "desert", "diamond", "dolphin", "dragon",
    "drift", "eagle", "echo", "ember", "emerald", "falcon", "feather", "fern",
    "field", "flint", "forest", "fossil", "galaxy", "garnet", "glacier", "golden",
    "granite", "harbor", "hazel", "heron", "horizon", "indigo", "island", "ivory",
    "jasper", "juniper", "kestrel", "lagoon", "lantern", "lemon", "lunar", "maple",
    "marble", "meadow", "meteor", "mirror", "monsoon", "mountain", "nebula", "nectar",
    "oasis", "ocean", "onyx", "orbit", "orchid", "otter", "pebble", "pepper",
    "phoenix", "pillar", "planet", "prairie", "quartz", "quiver", "rainbow", "raven",
    "reef", "ripple", "river", "saffron", "sapphire", "shadow", "silver", "solar",
    "sparrow", "spruce", "stellar", "summit", "sunrise", "thistle", "thunder", "tiger",
    "timber", "topaz", "tundra", "valley", "velvet", "violet", "walnut", "willow",
    "winter", "wizard", "zephyr", "harvest", "lotus", "cobble", "mosaic", "pine",
];
