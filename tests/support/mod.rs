use ctf_parser::grammar::{Grammar, GrammarRecord};
use ctf_parser::mapping::{CtfMapping, MappingSpec};

/// The Peter/sees/a/squirrel grammar used throughout the documentation's concrete scenarios.
pub fn toy_grammar() -> Grammar {
    Grammar::from_records(toy_records()).expect("toy grammar is well-formed")
}

pub fn toy_records() -> Vec<GrammarRecord> {
    vec![
        GrammarRecord::Binary { lhs: "S".into(), rhs1: "NP".into(), rhs2: "VP".into(), prob: 1.0 },
        GrammarRecord::Binary { lhs: "VP".into(), rhs1: "V".into(), rhs2: "NP".into(), prob: 1.0 },
        GrammarRecord::Binary { lhs: "NP".into(), rhs1: "Det".into(), rhs2: "N".into(), prob: 0.5 },
        GrammarRecord::Terminal { lhs: "NP".into(), terminal: "Peter".into(), prob: 0.5 },
        GrammarRecord::Terminal { lhs: "V".into(), terminal: "sees".into(), prob: 1.0 },
        GrammarRecord::Terminal { lhs: "Det".into(), terminal: "a".into(), prob: 1.0 },
        GrammarRecord::Terminal { lhs: "N".into(), terminal: "squirrel".into(), prob: 1.0 },
        GrammarRecord::Words(vec!["Peter".into(), "a".into(), "sees".into(), "squirrel".into()]),
    ]
}

pub fn toy_sentence() -> Vec<String> {
    ["Peter", "sees", "a", "squirrel"].iter().map(|s| s.to_string()).collect()
}

/// Single-step mapping: `P: {HP: {S_: [S, VP]}, MP: {N_: [NP]}}`.
pub fn toy_mapping() -> CtfMapping {
    let spec: MappingSpec = serde_yaml::from_str(
        "P:\n  HP:\n    S_:\n      - S\n      - VP\n  MP:\n    N_:\n      - NP\n",
    )
    .unwrap();
    CtfMapping::from_spec(&spec).unwrap()
}
