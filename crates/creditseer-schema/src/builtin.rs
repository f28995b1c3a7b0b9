//! Schemas compiled into the crate

/// `(file name, json)` for every built-in schema document
pub(crate) const BUILTIN_SCHEMAS: &[(&str, &str)] = &[
    ("cover.stage1.json", include_str!("../schemas/cover.stage1.json")),
    ("definitions.stage1.json", include_str!("../schemas/definitions.stage1.json")),
    ("definitions.stage2.json", include_str!("../schemas/definitions.stage2.json")),
    ("credits.stage1.json", include_str!("../schemas/credits.stage1.json")),
    ("credits.stage2.json", include_str!("../schemas/credits.stage2.json")),
    ("representations.stage1.json", include_str!("../schemas/representations.stage1.json")),
    ("conditions.stage1.json", include_str!("../schemas/conditions.stage1.json")),
    (
        "affirmative_covenants.stage1.json",
        include_str!("../schemas/affirmative_covenants.stage1.json"),
    ),
    (
        "negative_covenants.stage1.json",
        include_str!("../schemas/negative_covenants.stage1.json"),
    ),
    (
        "negative_covenants.stage2.json",
        include_str!("../schemas/negative_covenants.stage2.json"),
    ),
    ("guarantee.stage1.json", include_str!("../schemas/guarantee.stage1.json")),
    (
        "events_of_default.stage1.json",
        include_str!("../schemas/events_of_default.stage1.json"),
    ),
    (
        "events_of_default.stage2.json",
        include_str!("../schemas/events_of_default.stage2.json"),
    ),
    (
        "administrative_agent.stage1.json",
        include_str!("../schemas/administrative_agent.stage1.json"),
    ),
    ("miscellaneous.stage1.json", include_str!("../schemas/miscellaneous.stage1.json")),
    ("unclassified.stage1.json", include_str!("../schemas/unclassified.stage1.json")),
];
