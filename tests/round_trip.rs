mod common;

use common::{TempGdx, ENV_LOCK};
use gdx::{DataType, Gdx};

#[test]
fn parameter_via_string_mode() {
    let file = TempGdx::new("demand");
    let records = [("new-york", 324.0), ("chicago", 299.0), ("topeka", 274.0)];

    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    assert!(gdx.data_write_str_start("demand", "demand at market", 1, DataType::Parameter, 0));
    for (city, value) in records {
        assert!(gdx.data_write_str(&[city], &[value]));
    }
    assert!(gdx.data_write_done());
    assert_eq!(gdx.error_count(), 0);
    assert!(gdx.close());

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let nr = gdx.find_symbol("demand").unwrap();
    let (name, dim, typ) = gdx.symbol_info(nr).unwrap();
    assert_eq!((name.as_str(), dim, typ), ("demand", 1, DataType::Parameter));
    let count = gdx.data_read_str_start(nr).unwrap();
    assert_eq!(count, 3);
    let mut keys = vec![String::new()];
    let mut values = [0.0f64; 5];
    // Labels come back in order of first appearance.
    for (city, value) in records {
        assert!(gdx.data_read_str(&mut keys, &mut values).is_some());
        assert_eq!(keys[0], city);
        assert_eq!(values[0], value);
    }
    assert!(gdx.data_read_str(&mut keys, &mut values).is_none());
    assert!(gdx.data_read_done());
    assert!(gdx.close());
}

#[test]
fn raw_mode_scalar_and_vector() {
    let file = TempGdx::new("rawmode");

    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    assert!(gdx.uel_register_raw_start());
    assert!(gdx.uel_register_raw("TheOnlyUEL"));
    assert!(gdx.uel_register_done());
    assert!(gdx.data_write_raw_start("mysym", "This is my symbol!", 1, DataType::Parameter, 0));
    assert!(gdx.data_write_raw(&[1], &[3.141]));
    assert!(gdx.data_write_done());
    assert!(gdx.data_write_raw_start("myscalar", "This is a scalar!", 0, DataType::Parameter, 0));
    assert!(gdx.data_write_raw(&[], &[12.25]));
    assert!(gdx.data_write_done());
    assert!(gdx.close());

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let (name, map) = gdx.um_uel_get(1).unwrap();
    assert_eq!((name.as_str(), map), ("TheOnlyUEL", -1));

    let mut key = [0i32; 20];
    let mut values = [0.0f64; 5];
    assert_eq!(gdx.data_read_raw_start(1), Some(1));
    assert_eq!(gdx.data_read_raw(&mut key, &mut values), Some(1));
    assert_eq!(key[0], 1);
    assert_eq!(values[0], 3.141);
    assert!(gdx.data_read_raw(&mut key, &mut values).is_none());
    assert!(gdx.data_read_done());

    assert_eq!(gdx.data_read_raw_start(2), Some(1));
    assert_eq!(gdx.data_read_raw(&mut key, &mut values), Some(0));
    assert_eq!(values[0], 12.25);
    assert!(gdx.data_read_raw(&mut key, &mut values).is_none());
    assert!(gdx.data_read_done());
    assert!(gdx.close());
}

#[test]
fn mapped_out_of_order_reads_back_in_raw_order() {
    let file = TempGdx::new("mapped");
    // Irregular user numbering, registered in this order.
    let mapping = [(3, "z"), (8, "a"), (1, "y"), (10, "b")];
    let write_order = [8, 10, 1, 3];

    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    assert!(gdx.uel_register_map_start());
    for (map, label) in mapping {
        assert!(gdx.uel_register_map(map, label));
    }
    assert!(gdx.uel_register_done());
    assert!(gdx.data_write_map_start("irregularSym", "So out of order!", 1, DataType::Parameter, 0));
    for map in write_order {
        assert!(gdx.data_write_map(&[map], &[3.141 * map as f64]));
    }
    assert!(gdx.data_write_done());
    assert_eq!(gdx.error_count(), 0);
    assert_eq!(gdx.data_error_count(), 0);
    assert!(gdx.close());

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    // Raw order is registration order: z, a, y, b.
    let expected = [("z", 3), ("a", 8), ("y", 1), ("b", 10)];
    let count = gdx.data_read_raw_start(1).unwrap();
    assert_eq!(count, 4);
    let mut key = [0i32; 20];
    let mut values = [0.0f64; 5];
    for (raw, (label, user)) in expected.iter().enumerate() {
        assert!(gdx.data_read_raw(&mut key, &mut values).is_some());
        assert_eq!(key[0], raw as i32 + 1);
        assert_eq!(values[0], 3.141 * *user as f64);
        let (name, _) = gdx.um_uel_get(key[0]).unwrap();
        assert_eq!(name, *label);
    }
    assert!(gdx.data_read_raw(&mut key, &mut values).is_none());
    assert!(gdx.data_read_done());
    assert!(gdx.close());
}

#[test]
fn mapped_read_is_sorted_in_user_space() {
    let file = TempGdx::new("mappedread");

    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    assert!(gdx.uel_register_map_start());
    for (map, label) in [(3, "First"), (4, "Second"), (5, "Third"), (2, "Fourth")] {
        assert!(gdx.uel_register_map(map, label));
    }
    assert!(gdx.uel_register_done());
    assert!(gdx.data_write_map_start("mysym2", "Four records", 1, DataType::Parameter, 0));
    for map in [3, 4, 5, 2] {
        assert!(gdx.data_write_map(&[map], &[map as f64]));
    }
    assert!(gdx.data_write_done());
    assert_eq!(gdx.error_count(), 0);
    assert!(gdx.close());

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    // Mappings do not persist; they must be registered again.
    let (_, map) = gdx.um_uel_get(1).unwrap();
    assert_eq!(map, -1);
    assert!(gdx.uel_register_map_start());
    for (map, label) in [(3, "First"), (4, "Second"), (5, "Third"), (2, "Fourth")] {
        assert!(gdx.uel_register_map(map, label));
    }
    assert!(gdx.uel_register_done());
    assert_eq!(gdx.get_uel(3).unwrap(), "First");

    let count = gdx.data_read_map_start(1).unwrap();
    assert_eq!(count, 4);
    let mut key = [0i32; 20];
    let mut values = [0.0f64; 5];
    for (i, expect) in [2, 3, 4, 5].iter().enumerate() {
        assert!(gdx.data_read_map(i as i32 + 1, &mut key, &mut values).is_some());
        assert_eq!(key[0], *expect);
    }
    assert_eq!(gdx.data_error_count(), 0);
    assert!(gdx.data_read_done());
    assert!(gdx.close());
}

#[test]
fn compressed_file_round_trip() {
    let file = TempGdx::new("compressed");
    let n = 10_000;

    let mut gdx = Gdx::new();
    assert!(gdx.open_write_ex(file.as_str(), "round_trip", true));
    assert!(gdx.uel_register_raw_start());
    for i in 1..=n {
        assert!(gdx.uel_register_raw(&format!("uel_{}", i)));
    }
    assert!(gdx.uel_register_done());
    assert!(gdx.data_write_raw_start("big", "many records", 1, DataType::Parameter, 0));
    for i in 1..=n {
        assert!(gdx.data_write_raw(&[i], &[i as f64 / 8.0]));
    }
    assert!(gdx.data_write_done());
    assert!(gdx.close());

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let (_, compr) = gdx.file_info().unwrap();
    assert_eq!(compr, 1);
    let count = gdx.data_read_raw_start(1).unwrap();
    assert_eq!(count, n);
    let mut key = [0i32; 20];
    let mut values = [0.0f64; 5];
    for i in 1..=n {
        assert!(gdx.data_read_raw(&mut key, &mut values).is_some());
        assert_eq!(key[0], i);
        assert_eq!(values[0], i as f64 / 8.0);
    }
    assert!(gdx.data_read_raw(&mut key, &mut values).is_none());
    assert!(gdx.data_read_done());
    assert!(gdx.close());
}

#[test]
fn environment_controls_compression_and_version() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = TempGdx::new("envconv");

    std::env::set_var("GDXCOMPRESS", "1");
    std::env::set_var("GDXCONVERT", "v5");
    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    let (version, compr) = gdx.file_info().unwrap();
    // Old versions predate compression, so the request is dropped.
    assert_eq!(version, 5);
    assert_eq!(compr, 0);
    assert!(gdx.data_write_str_start("x", "", 1, DataType::Parameter, 0));
    assert!(gdx.data_write_str(&["only"], &[1.5]));
    assert!(gdx.data_write_done());
    assert!(gdx.close());
    std::env::remove_var("GDXCONVERT");

    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    let (version, compr) = gdx.file_info().unwrap();
    assert_eq!(version, 7);
    assert_eq!(compr, 1);
    assert!(gdx.close());
    std::env::remove_var("GDXCOMPRESS");

    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    let (_, compr) = gdx.file_info().unwrap();
    assert_eq!(compr, 0);
    assert!(gdx.close());
}

#[test]
fn special_value_scalars_survive() {
    let file = TempGdx::new("specials");

    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    let specials = gdx.get_special_values();
    assert!(gdx.data_write_raw_start("undef", "", 0, DataType::Parameter, 0));
    assert!(gdx.data_write_raw(&[], &[specials[gdx::SV_UNDEF]]));
    assert!(gdx.data_write_done());
    assert!(gdx.data_write_raw_start("eps", "", 0, DataType::Parameter, 0));
    assert!(gdx.data_write_raw(&[], &[specials[gdx::SV_EPS]]));
    assert!(gdx.data_write_done());
    assert!(gdx.close());

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let specials = gdx.get_special_values();
    let mut key = [0i32; 20];
    let mut values = [0.0f64; 5];
    gdx.data_read_raw_start(1).unwrap();
    assert!(gdx.data_read_raw(&mut key, &mut values).is_some());
    assert_eq!(values[0], specials[gdx::SV_UNDEF]);
    assert!(gdx.data_read_done());
    gdx.data_read_raw_start(2).unwrap();
    assert!(gdx.data_read_raw(&mut key, &mut values).is_some());
    assert_eq!(values[0], specials[gdx::SV_EPS]);
    assert!(gdx.data_read_done());
    assert!(gdx.close());
}

#[test]
fn acronym_values_round_trip() {
    let file = TempGdx::new("acronyms");

    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    assert_eq!(gdx.acronym_count(), 0);
    assert_eq!(gdx.acronym_add("myacr", "my acronym", 23), Some(1));
    let (name, text, index) = gdx.acronym_get_info(1).unwrap();
    assert_eq!((name.as_str(), text.as_str(), index), ("myacr", "my acronym", 23));
    let value = gdx.acronym_value(23);
    assert_eq!(gdx.acronym_index(value), 23);

    assert!(gdx.data_write_str_start("p", "", 1, DataType::Parameter, 0));
    assert!(gdx.data_write_str(&["e1"], &[value]));
    assert!(gdx.data_write_done());
    assert!(gdx.close());

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    assert_eq!(gdx.acronym_count(), 1);
    let mut key = [0i32; 20];
    let mut values = [0.0f64; 5];
    gdx.data_read_raw_start(1).unwrap();
    assert!(gdx.data_read_raw(&mut key, &mut values).is_some());
    assert_eq!(gdx.acronym_index(values[0]), 23);
    assert_eq!(gdx.acronym_name(values[0]).unwrap(), "myacr");
    assert!(gdx.data_read_done());
    assert!(gdx.close());
}

#[test]
fn variable_records_keep_all_five_values() {
    let file = TempGdx::new("variable");
    let fields = [0.75, -1.0, 0.0, 100.0, 1.0];

    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "round_trip"));
    assert!(gdx.data_write_str_start("x", "shipment quantities", 2, DataType::Variable, 0));
    assert!(gdx.data_write_str(&["seattle", "new-york"], &fields));
    assert!(gdx.data_write_done());
    assert!(gdx.close());

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let mut keys = vec![String::new(), String::new()];
    let mut values = [0.0f64; 5];
    assert_eq!(gdx.data_read_str_start(1), Some(1));
    assert!(gdx.data_read_str(&mut keys, &mut values).is_some());
    assert_eq!(keys, vec!["seattle".to_owned(), "new-york".to_owned()]);
    assert_eq!(values, fields);
    assert!(gdx.data_read_done());
    assert!(gdx.close());
}
