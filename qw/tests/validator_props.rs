//! Property tests for the schema validator

use proptest::prelude::*;
use questwright::schema::{
    CollectedData, FieldSpec, GoalRegistry, GoalSchema, Normalizer, StaticGoalRegistry, missing_fields, normalize,
    validate,
};
use serde_json::{Value, json};

const FIELDS: [&str; 6] = ["target", "motivation", "quest_type", "reward", "location", "difficulty"];

/// Enum options, some of them not in normalized form
const OPTIONS: [&str; 5] = ["Zemsta", "Zlecenie", "Intryga", " Poszukiwanie ", "Stary  Obóz"];

const SYNONYMS: [&str; 5] = ["revenge", "POMSTA", " spisek", "zadanie", "old camp"];

/// One of: absent, null, "", or a real value
fn arb_slot() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        Just(Some(json!(""))),
        "[a-zA-Z ]{1,12}".prop_map(|s| Some(json!(s))),
        any::<i64>().prop_map(|n| Some(json!(n))),
    ]
}

fn arb_case() -> impl Strategy<Value = (GoalSchema, CollectedData)> {
    (
        prop::collection::vec(any::<bool>(), FIELDS.len()),
        prop::collection::vec(arb_slot(), FIELDS.len()),
    )
        .prop_map(|(required, slots)| {
            let fields = FIELDS
                .iter()
                .zip(&required)
                .map(|(name, req)| FieldSpec::new(*name, *req))
                .collect();
            let mut data = CollectedData::new();
            for (name, slot) in FIELDS.iter().zip(slots) {
                if let Some(value) = slot {
                    data.insert(name.to_string(), value);
                }
            }
            (GoalSchema::new("G", fields), data)
        })
}

fn value_missing(data: &CollectedData, name: &str) -> bool {
    match data.get(name) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn arb_normalizer() -> impl Strategy<Value = Option<Normalizer>> {
    prop_oneof![
        Just(None),
        Just(Some(Normalizer::Trim)),
        Just(Some(Normalizer::Lowercase)),
        Just(Some(Normalizer::Uppercase)),
        Just(Some(Normalizer::CollapseWhitespace)),
    ]
}

/// A plain or enum field the registry accepts
fn arb_field(name: &'static str) -> impl Strategy<Value = FieldSpec> {
    let plain = (any::<bool>(), arb_normalizer(), prop::option::of("[a-zA-Z ]{1,12}")).prop_map(
        move |(required, normalizer, default)| {
            let mut field = FieldSpec::new(name, required);
            field.normalize = normalizer;
            field.default = default.map(Value::String);
            field
        },
    );

    let enumeration = (
        any::<bool>(),
        prop::sample::subsequence(OPTIONS.to_vec(), 1..=OPTIONS.len()),
        prop::option::of(prop::collection::vec(
            (prop::sample::select(SYNONYMS.to_vec()), any::<prop::sample::Index>()),
            0..4,
        )),
        arb_normalizer(),
        prop::option::of(any::<prop::sample::Index>()),
    )
        .prop_map(move |(required, options, typings, normalizer, default)| {
            let mut field = FieldSpec::enumeration(name, required, &options);
            field.typings = typings.map(|pairs| {
                pairs
                    .iter()
                    .map(|(synonym, target)| (synonym.to_string(), target.get(&options).to_string()))
                    .collect()
            });
            field.normalize = normalizer;
            field.default = default.map(|i| json!(i.get(&options)));
            field
        });

    prop_oneof![plain, enumeration].prop_filter("registry must accept the field", |field| {
        StaticGoalRegistry::default()
            .register(GoalSchema::new("FIELD", vec![field.clone()]))
            .is_ok()
    })
}

/// Raw values as the oracle reports them: missing, blank, cased or padded words, noise
fn arb_raw_value() -> impl Strategy<Value = Option<Value>> {
    let words: Vec<&str> = OPTIONS.iter().chain(SYNONYMS.iter()).copied().collect();
    prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        Just(Some(json!(""))),
        Just(Some(json!("   "))),
        (prop::sample::select(words), any::<bool>(), any::<bool>()).prop_map(|(word, upper, pad)| {
            let word = if upper { word.to_uppercase() } else { word.to_lowercase() };
            let word = if pad { format!("  {} ", word) } else { word };
            Some(json!(word))
        }),
        "[a-zA-Z ]{1,12}".prop_map(|s| Some(json!(s))),
        any::<i64>().prop_map(|n| Some(json!(n))),
    ]
}

fn arb_registered_case() -> impl Strategy<Value = (GoalSchema, CollectedData)> {
    let fields: Vec<_> = FIELDS.iter().map(|name| arb_field(name)).collect();
    (fields, prop::collection::vec(arb_raw_value(), FIELDS.len())).prop_map(|(fields, slots)| {
        let mut registry = StaticGoalRegistry::default();
        registry
            .register(GoalSchema::new("G", fields))
            .expect("fields accepted one by one form a valid goal");
        let schema = registry.get_goal_schema("G").cloned().expect("goal was just registered");

        let mut data = CollectedData::new();
        for (name, slot) in FIELDS.iter().zip(slots) {
            if let Some(value) = slot {
                data.insert(name.to_string(), value);
            }
        }
        data.insert("extra".to_string(), json!(" untouched "));
        (schema, data)
    })
}

proptest! {
    #[test]
    fn missing_required_is_exact((schema, data) in arb_case()) {
        let expected: Vec<String> = schema
            .fields
            .iter()
            .filter(|f| f.required && value_missing(&data, &f.name))
            .map(|f| f.name.clone())
            .collect();
        prop_assert_eq!(missing_fields(&schema, &data).required, expected);
    }

    #[test]
    fn missing_partitions_every_missing_field((schema, data) in arb_case()) {
        let missing = missing_fields(&schema, &data);
        let total = schema.fields.iter().filter(|f| value_missing(&data, &f.name)).count();
        prop_assert_eq!(missing.required.len() + missing.recommended.len(), total);
        for name in &missing.recommended {
            prop_assert!(!schema.field(name).unwrap().required);
        }
    }

    #[test]
    fn validate_agrees_with_missing_required((schema, data) in arb_case()) {
        let report = validate(&schema, &data);
        let missing = missing_fields(&schema, &data);
        prop_assert_eq!(report.valid, missing.required.is_empty());
        prop_assert_eq!(report.errors.len(), missing.required.len());
    }

    #[test]
    fn normalize_is_idempotent((schema, data) in arb_registered_case()) {
        let once = normalize(&schema, &data);
        let twice = normalize(&schema, &once);
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn normalize_leaves_input_untouched((schema, data) in arb_registered_case()) {
        let before = data.clone();
        let _ = normalize(&schema, &data);
        prop_assert_eq!(data, before);
    }
}

#[test]
fn enum_synonyms_map_to_canonical_option() {
    let registry = StaticGoalRegistry::builtin().unwrap();
    let schema = registry.get_goal_schema("GENERATE_QUEST").unwrap();

    let mut data = CollectedData::new();
    data.insert("quest_type".to_string(), json!("ZEMSTA"));
    let out = normalize(schema, &data);

    assert_eq!(out["quest_type"], json!("Zemsta"));
    assert_eq!(out["difficulty"], json!("Średni"));
    assert!(validate(schema, &out).errors.iter().all(|e| e.field != "quest_type"));
}
