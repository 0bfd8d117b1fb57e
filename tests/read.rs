mod common;

use common::TempGdx;
use gdx::format::{DOMC_EXPAND, DOMC_UNMAPPED};
use gdx::{DataType, Gdx};

/// Writes a 2-dimensional parameter d(i,j) over five city labels, the
/// distances from the classic transport model.
fn write_transport(file: &TempGdx) {
    let mut gdx = Gdx::new();
    assert!(gdx.open_write(file.as_str(), "read"));
    let values = [0.0f64; 5];
    assert!(gdx.data_write_str_start("i", "canning plants", 1, DataType::Set, 0));
    for plant in ["seattle", "san-diego"] {
        assert!(gdx.data_write_str(&[plant], &values));
    }
    assert!(gdx.data_write_done());
    assert!(gdx.data_write_str_start("j", "markets", 1, DataType::Set, 0));
    for market in ["new-york", "chicago", "topeka"] {
        assert!(gdx.data_write_str(&[market], &values));
    }
    assert!(gdx.data_write_done());
    assert!(gdx.data_write_str_start("d", "distance in thousands of miles", 2, DataType::Parameter, 0));
    assert!(gdx.symbol_set_domain(&["i", "j"]));
    let distances = [
        (("seattle", "new-york"), 2.5),
        (("seattle", "chicago"), 1.7),
        (("seattle", "topeka"), 1.8),
        (("san-diego", "new-york"), 2.5),
        (("san-diego", "chicago"), 1.8),
        (("san-diego", "topeka"), 1.4),
    ];
    for ((from, to), miles) in distances {
        assert!(gdx.data_write_str(&[from, to], &[miles]));
    }
    assert!(gdx.data_write_done());
    assert_eq!(gdx.error_count(), 0);
    assert!(gdx.close());
}

#[test]
fn filtered_read_restricts_dimensions() {
    let file = TempGdx::new("filter");
    write_transport(&file);

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let d = gdx.find_symbol("d").unwrap();

    // First pass: expand everything, assigning user mappings on the fly.
    let count = gdx
        .data_read_filtered_start(d, &[DOMC_EXPAND, DOMC_EXPAND])
        .unwrap();
    assert_eq!(count, 6);
    let mut key = [0i32; 20];
    let mut values = [0.0f64; 5];
    let mut seen = 0;
    while gdx.data_read_map(seen + 1, &mut key, &mut values).is_some() {
        seen += 1;
    }
    assert_eq!(seen, 6);
    assert!(gdx.data_read_done());
    let (_, high_map) = gdx.um_uel_info().unwrap();
    assert_eq!(high_map, 5);

    // Second pass: only records whose first key is in the filter.
    assert!(!gdx.filter_exists(1));
    assert!(gdx.filter_register_start(1));
    let (seattle, seattle_map) = gdx.um_find_uel("seattle").unwrap();
    assert!(seattle > 0);
    assert!(gdx.filter_register(seattle_map));
    assert!(gdx.filter_register_done());
    assert!(gdx.filter_exists(1));

    let count = gdx
        .data_read_filtered_start(d, &[1, DOMC_UNMAPPED])
        .unwrap();
    assert_eq!(count, 6);
    let mut kept = 0;
    while gdx.data_read_map(kept + 1, &mut key, &mut values).is_some() {
        assert_eq!(key[0], seattle_map);
        kept += 1;
    }
    assert_eq!(kept, 3);
    // The san-diego records were dropped into the error list.
    assert_eq!(gdx.data_error_count(), 3);
    assert!(gdx.data_read_done());

    // A short action vector leaves the remaining dimensions unmapped.
    let count = gdx.data_read_filtered_start(d, &[1]).unwrap();
    assert_eq!(count, 6);
    let mut short = 0;
    while gdx.data_read_map(short + 1, &mut key, &mut values).is_some() {
        assert_eq!(key[0], seattle_map);
        short += 1;
    }
    assert_eq!(short, 3);
    assert!(gdx.data_read_done());
    assert!(gdx.close());
}

#[test]
fn unknown_filter_number_fails() {
    let file = TempGdx::new("nofilter");
    write_transport(&file);

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let d = gdx.find_symbol("d").unwrap();
    assert!(gdx.data_read_filtered_start(d, &[99, DOMC_UNMAPPED]).is_none());
    assert!(gdx.error_count() > 0);
    assert!(gdx.close());
}

#[test]
fn fast_raw_read_streams_all_records() {
    let file = TempGdx::new("fastread");
    write_transport(&file);

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let d = gdx.find_symbol("d").unwrap();
    let mut rows = Vec::new();
    let count = gdx
        .data_read_raw_fast(d, |keys, values| {
            rows.push((keys.to_vec(), values[0]));
            true
        })
        .unwrap();
    assert_eq!(count, 6);
    assert_eq!(rows.len(), 6);
    // Registration order: seattle = 1, new-york = 3.
    assert_eq!(rows[0], (vec![1, 3], 2.5));

    // Early exit after the first record.
    let mut first_only = 0;
    gdx.data_read_raw_fast(d, |_, _| {
        first_only += 1;
        false
    })
    .unwrap();
    assert_eq!(first_only, 1);

    // The Ex variant reports the first changed dimension.
    let mut firsts = Vec::new();
    gdx.data_read_raw_fast_ex(d, |_, _, first| {
        firsts.push(first);
        true
    })
    .unwrap();
    assert_eq!(firsts, vec![1, 2, 2, 1, 2, 2]);
    assert!(gdx.close());
}

#[test]
fn filtered_fast_read() {
    let file = TempGdx::new("fastfilt");
    write_transport(&file);

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));

    // Map the two plants only.
    assert!(gdx.uel_register_map_start());
    assert!(gdx.uel_register_map(10, "seattle"));
    assert!(gdx.uel_register_map(20, "san-diego"));
    assert!(gdx.uel_register_done());
    assert!(gdx.filter_register_start(7));
    assert!(gdx.filter_register(20));
    assert!(gdx.filter_register_done());

    let d = gdx.find_symbol("d").unwrap();
    let mut kept = Vec::new();
    let count = gdx
        .data_read_raw_fast_filt(d, &[7, DOMC_UNMAPPED], |keys, values| {
            kept.push((keys.to_vec(), values[0]));
            true
        })
        .unwrap();
    assert_eq!(count, 6);
    // Only san-diego rows pass the filter; keys stay raw.
    assert_eq!(kept.len(), 3);
    let (sd, _) = gdx.um_find_uel("san-diego").unwrap();
    for (keys, _) in &kept {
        assert_eq!(keys[0], sd);
    }
    assert!(gdx.close());
}

#[test]
fn slices_fix_and_free_dimensions() {
    let file = TempGdx::new("slice");
    write_transport(&file);

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let d = gdx.find_symbol("d").unwrap();
    let counts = gdx.data_read_slice_start(d).unwrap();
    assert_eq!(counts, vec![2, 3]);

    // Fix the first dimension, leave the second free.
    let mut seen = Vec::new();
    let free = gdx
        .data_read_slice(&["seattle", ""], |slice_keys, values| {
            seen.push((slice_keys.to_vec(), values[0]));
        })
        .unwrap();
    assert_eq!(free, 1);
    assert_eq!(seen.len(), 3);
    // Slice coordinates index the sorted distinct elements of dimension 2.
    for (slice_keys, _) in &seen {
        let labels = gdx.data_slice_uels(slice_keys).unwrap();
        assert_eq!(labels.len(), 1);
        assert!(["new-york", "chicago", "topeka"].contains(&labels[0].as_str()));
    }

    // An unknown fixed label fails.
    assert!(gdx.data_read_slice(&["atlantis", ""], |_, _| {}).is_none());
    assert!(gdx.close());
}

#[test]
fn domain_elements_are_distinct_per_dimension() {
    let file = TempGdx::new("domelems");
    write_transport(&file);

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let d = gdx.find_symbol("d").unwrap();
    let mut elems = Vec::new();
    let count = gdx
        .get_domain_elements(d, 2, DOMC_UNMAPPED, |raw, _| {
            elems.push(raw);
            true
        })
        .unwrap();
    assert_eq!(count, 3);
    let mut names: Vec<String> = elems
        .iter()
        .map(|&raw| gdx.um_uel_get(raw).unwrap().0)
        .collect();
    names.sort();
    assert_eq!(names, vec!["chicago", "new-york", "topeka"]);
    assert!(gdx.get_domain_elements(d, 3, DOMC_UNMAPPED, |_, _| true).is_none());
    assert!(gdx.close());
}

#[test]
fn symbol_index_lengths() {
    let file = TempGdx::new("maxlen");
    write_transport(&file);

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let d = gdx.find_symbol("d").unwrap();
    let (max, per_dim) = gdx.symb_indx_max_length(d);
    assert_eq!(max, 9); // san-diego
    assert_eq!(per_dim[0], 9);
    assert_eq!(per_dim[1], 8); // new-york
    assert_eq!(gdx.uel_max_length(), 9);
    assert!(gdx.close());
}

#[test]
fn file_metadata_is_reported() {
    let file = TempGdx::new("metadata");
    write_transport(&file);

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    let (version, compr) = gdx.file_info().unwrap();
    assert_eq!(version, 7);
    assert_eq!(compr, 0);
    let (audit, producer) = gdx.file_version().unwrap();
    assert!(audit.starts_with("GDX Library"));
    assert_eq!(producer, "read");
    assert_eq!(gdx.get_dll_version(), audit);
    let (symbols, uels) = gdx.system_info().unwrap();
    assert_eq!((symbols, uels), (3, 5));
    assert!(gdx.get_memory_used() > 0);
    assert!(gdx.set_trace_level(1, "metadata"));
    assert!(gdx.close());
}

#[test]
fn read_mode_rejects_writes() {
    let file = TempGdx::new("romode");
    write_transport(&file);

    let mut gdx = Gdx::new();
    assert!(gdx.open_read(file.as_str()));
    assert!(!gdx.data_write_str_start("new", "", 1, DataType::Set, 0));
    assert!(!gdx.uel_register_raw_start());
    assert!(gdx.add_set_text("nope").is_none());
    assert!(gdx.error_count() >= 3);
    assert!(gdx.close());
}
