use crate::{FieldType, Schema, SchemaField, FIELD_ID, FIELD_VERSION};
use proptest::{prelude::*, sample::SizeRange, string::string_regex};

/**
 * Strategy for field names. Reserved names are mixed in on purpose so that
 * properties over schemas see them regularly.
 */
fn field_name() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => string_regex("[A-Za-z][A-Za-z0-9_]{0,11}").unwrap(),
        1 => Just(FIELD_ID.to_string()),
        1 => Just(FIELD_VERSION.to_string()),
    ]
}

fn field_type() -> impl Strategy<Value = FieldType> {
    prop_oneof![
        Just(FieldType::String),
        Just(FieldType::Int),
        Just(FieldType::Long),
        Just(FieldType::Float),
        Just(FieldType::Double),
        Just(FieldType::Boolean),
        Just(FieldType::Other("text_general".to_string())),
    ]
}

impl Arbitrary for SchemaField {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            field_name(),
            field_type(),
            proptest::option::of(any::<bool>()),
            proptest::option::of(any::<bool>()),
        )
            .prop_map(|(name, field_type, indexed, stored)| {
                let mut field = SchemaField::new(name, field_type);
                if let Some(indexed) = indexed {
                    field = field.with_indexed(indexed);
                }
                if let Some(stored) = stored {
                    field = field.with_stored(stored);
                }
                field
            })
            .boxed()
    }
}

/**
 * Strategy for schemas. The unique key is either the default or one of the
 * generated field names.
 */
pub fn arbitrary_schema(num_fields: impl Into<SizeRange>) -> impl Strategy<Value = Schema> {
    (
        proptest::collection::vec(any::<SchemaField>(), num_fields),
        any::<prop::sample::Index>(),
        any::<bool>(),
    )
        .prop_map(|(fields, key_index, custom_key)| {
            let unique_key = if custom_key && !fields.is_empty() {
                key_index.get(&fields).name().to_string()
            } else {
                FIELD_ID.to_string()
            };
            Schema::new(unique_key, fields)
        })
}
