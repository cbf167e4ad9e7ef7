use std::io::Cursor;
use std::path::Path;

use census_store::{CensusRecord, SchemaRef, TableSchema, TableStore, TableStoreOptions, ZoneCode};

fn five_counter_schema() -> SchemaRef {
    TableSchema::new(
        "CAS999",
        ["all_people", "males", "females", "households", "communal_residents"],
    )
    .unwrap()
    .into_ref()
}

fn open_store(path: &Path, schema: &SchemaRef) -> TableStore {
    let options = TableStoreOptions::builder()
        .path(path)
        .schema(schema.clone())
        .sample_interval(1)
        .build();
    TableStore::open(options).expect("Open store")
}

#[test]
fn test_format_then_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("cas999.csv");
    std::fs::write(
        &source_path,
        "\"Zone Code\",all_people,males,females,households,communal_residents\n\
         \"00AAFA0001\",250,120,130,101,3\n\
         \"00AAFA0002\",198,99,99,80,0\n",
    )
    .unwrap();

    let schema = five_counter_schema();
    let mut store = open_store(&dir.path().join("cas999.bin"), &schema);

    let start_id = 0;
    let next_id = store.format(&source_path, start_id).expect("Format source");
    assert_eq!(next_id, start_id + 2);

    let first = store.get(start_id).expect("Get first record");
    assert_eq!(first.record_id(), start_id);
    assert_eq!(first.zone_code().as_string(), "00AAFA0001");
    assert_eq!(first.counters(), &[250, 120, 130, 101, 3]);

    let second = store.get(start_id + 1).expect("Get second record");
    assert_eq!(second.record_id(), start_id + 1);
    assert_eq!(second.zone_code().as_string(), "00AAFA0002");
    assert_eq!(second.counters(), &[198, 99, 99, 80, 0]);
}

#[test]
fn test_chained_sources_share_one_store() {
    let dir = tempfile::tempdir().unwrap();
    let schema = five_counter_schema();
    let store_path = dir.path().join("cas999.bin");
    let mut store = open_store(&store_path, &schema);

    let sources = [
        "header\n\"00AAFA0001\",1,1,0,1,0\n\"00AAFA0002\",2,1,1,1,0\n",
        "header\n\"00ABFA0001\",3,2,1,2,0\n",
        "header\n\"00ACFA0001\",4,2,2,1,1\n\"00ACFA0002\",5,3,2,2,0\n",
    ];

    let mut next_id = 0;
    for source in sources {
        next_id = store.format_reader(Cursor::new(source), next_id).unwrap();
    }
    assert_eq!(next_id, 5);
    assert_eq!(store.len(), 5);

    let file_length = std::fs::metadata(&store_path).unwrap().len();
    assert_eq!(file_length, 5 * schema.record_length());

    for record_id in 0..5 {
        let record = store.get(record_id).unwrap();
        assert_eq!(record.record_id(), record_id);
        assert_eq!(record.counters()[0], record_id as i32 + 1);
    }
}

#[test]
fn test_store_reopens_with_existing_records() {
    let dir = tempfile::tempdir().unwrap();
    let schema = five_counter_schema();
    let store_path = dir.path().join("cas999.bin");

    {
        let mut store = open_store(&store_path, &schema);
        store
            .format_reader(Cursor::new("h\n\"00AAFA0001\",1,2,3,4,5\n"), 0)
            .unwrap();
        store.flush().unwrap();
    }

    let store = open_store(&store_path, &schema);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(0).unwrap().counters(), &[1, 2, 3, 4, 5]);
}

#[test]
fn test_prefix_index() {
    let dir = tempfile::tempdir().unwrap();
    let schema = TableSchema::new("CAS998", ["a", "b", "c"]).unwrap().into_ref();
    let mut store = open_store(&dir.path().join("cas998.bin"), &schema);

    store
        .format_reader(
            Cursor::new("h\n\"E0000001\",1,2,3\n\"E0000002\",4,5,6\n\"W0000001\",7,8,9\n"),
            0,
        )
        .unwrap();

    let matches = store.index_by_zone_prefix("E").expect("Index by prefix");
    let zones: Vec<&str> = matches.keys().map(|zone| zone.as_str()).collect();
    assert_eq!(zones, vec!["E0000001", "E0000002"]);
    assert_eq!(matches["E0000001"].record_id(), 0);
    assert_eq!(matches["E0000002"].counters(), &[4, 5, 6]);

    let matches = store.index_by_zone_prefix("W").unwrap();
    assert_eq!(matches.len(), 1);
    assert!(matches.contains_key("W0000001"));

    assert!(store.index_by_zone_prefix("S").unwrap().is_empty());
    assert_eq!(store.index_by_zone_prefix("").unwrap().len(), 3);
}

#[test]
fn test_zone_aggregation_scenario() {
    let schema = TableSchema::new("CAS998", ["a", "b", "c"]).unwrap().into_ref();
    let first = CensusRecord::from_counters(
        schema.clone(),
        0,
        ZoneCode::new("0000000001").unwrap(),
        vec![10, 20, 30],
    )
    .unwrap();
    let second = CensusRecord::from_counters(
        schema,
        1,
        ZoneCode::new("0000000002").unwrap(),
        vec![5, 5, 5],
    )
    .unwrap();

    let combined = first.aggregate_as(&second, 99, "AGG").unwrap();
    assert_eq!(combined.record_id(), 99);
    assert_eq!(combined.zone_code().as_string(), "AGG       ");
    assert_eq!(combined.counters(), &[15, 25, 35]);
}

#[test]
fn test_rollup_into_coarser_store() {
    let dir = tempfile::tempdir().unwrap();
    let schema = TableSchema::new("CAS998", ["a", "b", "c"]).unwrap().into_ref();
    let mut source = open_store(&dir.path().join("areas.bin"), &schema);
    let mut target = open_store(&dir.path().join("wards.bin"), &schema);

    source
        .format_reader(
            Cursor::new(
                "h\n\
                 \"00AAFA0001\",1,2,3\n\
                 \"00AAFA0002\",4,5,6\n\
                 \"00AAFB0001\",7,8,9\n",
            ),
            0,
        )
        .unwrap();

    let num_zones = source.rollup_into(&mut target, 6).unwrap();
    assert_eq!(num_zones, 2);
    assert_eq!(target.len(), 2);

    let ward = target.get(0).unwrap();
    assert_eq!(ward.zone_code().trimmed(), "00AAFA");
    assert_eq!(ward.counters(), &[5, 7, 9]);

    let ward = target.get_by_zone("00AAFB").unwrap().expect("Ward exists");
    assert_eq!(ward.record_id(), 1);
    assert_eq!(ward.counters(), &[7, 8, 9]);
}

#[test]
fn test_every_record_has_the_same_length() {
    let schema = five_counter_schema();
    let records = [
        CensusRecord::uninitialized(schema.clone()),
        CensusRecord::zeroed(schema.clone(), 0, ZoneCode::blank()),
        CensusRecord::parse_line(schema.clone(), 7, "\"00AAFA0001\",1,2,3,4,5").unwrap(),
    ];

    for record in records.iter() {
        assert_eq!(record.size_in_bytes(), schema.record_length());
        assert_eq!(record.to_bytes().len() as u64, schema.record_length());
    }
}
