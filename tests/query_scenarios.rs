use std::io::Write;
use std::sync::Arc;
use std::thread;

use roastindex::prelude::*;
use roastindex::ConditionSet;
use roastindex::store::LoadOptions;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const REVIEWS_JSON: &str = r#"[
    {"name": "Sunrise", "roaster": "Alpha", "roast": "Light", "loc_country": "United States",
     "origin": "Ethiopia", "100g_USD": 10.0, "rating": 90, "review_date": "January 2020",
     "review": "Fruity and bright"},
    {"name": "Midday", "roaster": "Beta", "roast": " medium ", "loc_country": "Taiwan",
     "origin": "Kenya", "100g_USD": 20.0, "rating": 85, "review_date": "June 2020",
     "review": "Bright citrus with a long finish"},
    {"name": "Dusk", "roaster": "Gamma", "roast": "Light Roast", "loc_country": "Canada",
     "origin": "Colombia", "100g_USD": 30.0, "rating": 95, "review_date": "December 2020",
     "review": "Fruity berry jam, bright acidity"},
    {"name": "Night", "roaster": "Delta", "roast": "Dark", "loc_country": "United States",
     "origin": "Sumatra", "100g_USD": 5.0, "rating": 88, "review_date": "March 2019",
     "review": "Smoky cedar and dark chocolate"},
    {"name": "Noon", "roaster": "Alpha", "roast": "Medium-Light", "loc_country": "Kenya",
     "origin": "Kenya", "100g_USD": 14.0, "rating": 92, "review_date": "May 2021",
     "review": "Sweet caramel, nutty and round"}
]"#;

fn store_for(kind: IndexKind) -> RecordStore {
    let options = LoadOptions::for_index(kind, &IndexConfig::default());
    RecordStore::from_json_str(REVIEWS_JSON, options).unwrap()
}

#[test]
fn test_three_row_scenario_on_every_variant() {
    init_logging();
    let rows = [(10.0, 90.0, 202001.0), (20.0, 85.0, 202006.0), (30.0, 95.0, 202012.0)]
        .into_iter()
        .map(|(p, r, d)| Row::new(vec![Value::from(p), Value::from(r), Value::from(d)]))
        .collect();
    let store = RecordStore::new(["100g_USD", "rating", "review_date"], rows).unwrap();

    let request = QueryBuilder::new()
        .select("100g_USD")
        .select("rating")
        .select("review_date")
        .range("100g_USD", Some(15.0), Some(25.0))
        .range("rating", Some(80.0), Some(100.0))
        .range("review_date", None, None)
        .build()
        .unwrap();

    for kind in IndexKind::ALL {
        let result = QueryEngine::default().execute(&store, kind, &request).unwrap();
        assert_eq!(result.row_ids(), vec![1], "{}", kind);
        assert_eq!(
            result.rows[0].values,
            vec![Value::from(20.0), Value::from(85.0), Value::from(202006.0)]
        );
    }
}

#[test]
fn test_roast_filter_is_exact_after_normalizing() {
    init_logging();
    let request = QueryBuilder::new()
        .select("name")
        .select("roast")
        .categorical("roast", "Light, Medium")
        .build();
    // "name" is not a queryable attribute.
    assert!(matches!(request, Err(RoastIndexError::InvalidAttribute(_))));

    let request = QueryBuilder::new()
        .select("roast")
        .select("rating")
        .categorical("roast", "Light, Medium")
        .build()
        .unwrap();

    for kind in IndexKind::ALL {
        let result = QueryEngine::default()
            .execute(&store_for(kind), kind, &request)
            .unwrap();
        assert_eq!(result.row_ids(), vec![0, 1], "{}", kind);
    }
}

#[test]
fn test_keyword_ranking_returns_nearest_first() {
    init_logging();
    let request = QueryBuilder::new()
        .select("origin")
        .range("100g_USD", Some(0.0), None)
        .keywords("fruity bright", 2)
        .build()
        .unwrap();

    for kind in IndexKind::ALL {
        let result = QueryEngine::default()
            .execute(&store_for(kind), kind, &request)
            .unwrap();
        assert!(result.is_ranked());
        assert_eq!(result.row_ids(), vec![0, 2], "{}", kind);

        let first = result.rows[0].clone().into_values();
        assert_eq!(first.len(), result.columns.len() + 1);
        assert_eq!(first[4], Value::from("Ethiopia"));
        assert!(first[9].as_number().unwrap().abs() < 1e-12);
    }
}

#[test]
fn test_roast_filter_with_numeric_conditions() {
    init_logging();
    let request = QueryBuilder::new()
        .select("roast")
        .select("rating")
        .comparisons("rating", ["> 85"])
        .range("100g_USD", None, Some(25.0))
        .categorical("roast", "Light, Medium")
        .build()
        .unwrap();

    for kind in IndexKind::ALL {
        let result = QueryEngine::default()
            .execute(&store_for(kind), kind, &request)
            .unwrap();
        assert_eq!(result.row_ids(), vec![0], "{}", kind);
    }
}

#[test]
fn test_result_rows_carry_every_column() {
    init_logging();
    let request = QueryBuilder::new()
        .select("roast")
        .range("rating", Some(0.0), None)
        .build()
        .unwrap();

    for kind in IndexKind::ALL {
        let store = store_for(kind);
        let result = QueryEngine::default().execute(&store, kind, &request).unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result.columns, store.columns());
        assert_eq!(result.selected, vec![Attribute::Roast]);
        for row in &result.rows {
            assert_eq!(row.values, store.row(row.row_id).unwrap().values());
            assert_eq!(row.clone().into_values().len(), 9);
        }
    }
}

#[test]
fn test_blank_keywords_give_empty_result() {
    init_logging();
    let request = QueryBuilder::new()
        .select("rating")
        .range("rating", Some(0.0), None)
        .keywords("   ", 2)
        .build()
        .unwrap();

    for kind in IndexKind::ALL {
        let result = QueryEngine::default()
            .execute(&store_for(kind), kind, &request)
            .unwrap();
        assert!(result.is_empty(), "{}", kind);
    }
}

#[test]
fn test_repeated_queries_are_identical() {
    init_logging();
    let request = QueryBuilder::new()
        .select("rating")
        .select("review_date")
        .comparisons("rating", ["> 85", "<= 95"])
        .keywords("bright sweet", 3)
        .build()
        .unwrap();
    let engine = QueryEngine::default();

    for kind in IndexKind::ALL {
        let store = store_for(kind);
        let first = engine.execute(&store, kind, &request).unwrap();
        let second = engine.execute(&store, kind, &request).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn test_date_conventions_per_variant() {
    let kd = store_for(IndexKind::KdTree);
    let range = store_for(IndexKind::RangeTree);
    let column = kd.attribute_index(Attribute::ReviewDate).unwrap();

    assert_eq!(kd.row(1).unwrap().get(column), Some(&Value::from(202006.0)));
    assert_eq!(range.row(1).unwrap().get(column), Some(&Value::from(41.0)));

    // Months-since-epoch works with range conditions expressed in that unit.
    let request = QueryBuilder::new()
        .select("review_date")
        .range("review_date", Some(36.0), Some(47.0))
        .build()
        .unwrap();
    let result = QueryEngine::default()
        .execute(&range, IndexKind::RangeTree, &request)
        .unwrap();
    assert_eq!(result.row_ids(), vec![0, 1, 2]);
}

#[test]
fn test_validation_errors() {
    init_logging();
    let store = store_for(IndexKind::KdTree);
    let engine = QueryEngine::default();

    let no_conditions = QueryRequest::new(vec![Attribute::Rating], ConditionSet::new());
    assert!(matches!(
        engine.execute(&store, IndexKind::KdTree, &no_conditions),
        Err(RoastIndexError::Validation(_))
    ));

    let mut conditions = ConditionSet::new();
    conditions.insert(
        Attribute::Price,
        roastindex::NumericCondition::range(Some(30.0), Some(10.0)),
    );
    let inverted = QueryRequest::new(vec![Attribute::Price], conditions);
    assert!(matches!(
        engine.execute(&store, IndexKind::Octree, &inverted),
        Err(RoastIndexError::Validation(_))
    ));

    let missing_k = QueryRequest {
        keywords: Some("fruity".to_string()),
        ..QueryRequest::new(vec![Attribute::Origin], ConditionSet::new())
    };
    assert!(matches!(
        engine.execute(&store, IndexKind::RTree, &missing_k),
        Err(RoastIndexError::Validation(_))
    ));
}

#[test]
fn test_strict_date_policy_rejects_bad_dates() {
    let json = REVIEWS_JSON.replace("March 2019", "Sometime 2019");
    let strict = RecordStore::from_json_str(&json, LoadOptions::default());
    assert!(matches!(strict, Err(RoastIndexError::InvalidFormat(_))));

    let options = LoadOptions::for_index(IndexKind::RangeTree, &IndexConfig::default());
    let lenient = RecordStore::from_json_str(&json, options).unwrap();
    let column = lenient.attribute_index(Attribute::ReviewDate).unwrap();
    assert_eq!(lenient.row(3).unwrap().get(column), Some(&Value::from(0.0)));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(REVIEWS_JSON.as_bytes()).unwrap();

    let reader = std::fs::File::open(file.path()).unwrap();
    let store = RecordStore::from_json_reader(reader, LoadOptions::default()).unwrap();
    assert_eq!(store.len(), 5);
    assert_eq!(store.columns().len(), 9);
}

#[test]
fn test_snapshot_shared_across_threads() {
    init_logging();
    let cache = Arc::new(SnapshotCache::new());
    let request = Arc::new(
        QueryBuilder::new()
            .select("rating")
            .range("rating", Some(90.0), None)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = IndexKind::ALL
        .into_iter()
        .filter(|kind| *kind != IndexKind::RangeTree)
        .map(|kind| {
            let cache = Arc::clone(&cache);
            let request = Arc::clone(&request);
            thread::spawn(move || {
                let store = cache
                    .get_or_load(|| RecordStore::from_json_str(REVIEWS_JSON, LoadOptions::default()))
                    .unwrap();
                QueryEngine::default()
                    .execute(&store, kind, &request)
                    .unwrap()
                    .row_ids()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), vec![0, 2, 4]);
    }
    assert!(cache.get().is_some());
}
