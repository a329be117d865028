#![no_main]

use libfuzzer_sys::fuzz_target;
use orbit_activities::query::QueryBuilder;

fuzz_target!(|input: (String, String, Vec<String>)| {
    let (field, value, in_values) = input;
    // Building never panics and renders one pair per clause value.
    let params = QueryBuilder::new()
        .where_equals(field.clone(), value)
        .where_in(field, in_values.clone())
        .build();
    assert_eq!(params.len(), 1 + in_values.len());
});
