//! Fuzzy testing.
//! Tries to discover panics with damaged files.
//! The exhaustive variant is expensive and therefore marked with `#[ignore]`.
//! To run it, use `cargo test -- --ignored`.

use std::panic::catch_unwind;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

extern crate iff;
use iff::prelude::*;
use iff::ilbm::*;


/// A small but complete file, containing every kind of group
/// and most chunk types of the bitmap dialect.
fn sample_file() -> Vec<u8> {
    let pixels: Vec<u8> = (0 .. 4 * 3 * 5).map(|index| (index * 7 % 5) as u8).collect();

    let mut header = BitMapHeader::new(17, 5, 3);
    let body = pack_body(ILBM, &mut header, &pixels, Compression::ByteRun).unwrap();

    let image = Group::form(ILBM)
        .with_data(CMAP, grayscale_color_map(&header).unwrap())
        .with_data(CNAM, ColorNames::new(1, vec![ Text::from("dark"), Text::from("light") ]))
        .with_data(CRNG, ColorRange { low: 0, high: 7, .. ColorRange::default() })
        .with_data(DRNG, DRange { min: 1, max: 3, colors: vec![ DColor::default() ], .. DRange::default() })
        .with_data(CCRT, CycleInfo { direction: -1, start: 2, end: 5, .. CycleInfo::default() })
        .with_data(BODY, body);

    let tree = Chunk::group(Group::cat()
        .with_group(Group::list()
            .with_group(Group::prop().with_data(BMHD, header))
            .with_group(image))
        .with_group(Group::form(Id::new_or_panic("TEXT"))
            .with(Chunk::raw(Id::new_or_panic("CHRS"), b"hello".to_vec()))));

    tree.to_bytes().unwrap()
}

/// Run every operation that inspects untrusted bytes.
fn inspect(bytes: &[u8]) -> UnitResult {
    let chunk = Chunk::read_from_buffered(bytes, registry())?;
    let _ = chunk.to_string();
    chunk.validate(registry())?;

    let images = extract_images(&chunk)?;
    check_images(&chunk, registry(), &images)?;

    for image in &images {
        image.decode_body()?;
        Chunk::group(image.to_form()).to_bytes()?;
    }

    chunk.to_bytes()?;
    Ok(())
}

/// Returns false if inspecting the bytes panicked.
fn survives(bytes: Vec<u8>) -> bool {
    catch_unwind(move || { let _ = inspect(&bytes); }).is_ok()
}

fn mutate(random: &mut StdRng, original: &[u8]) -> Vec<u8> {
    let mut bytes = original.to_vec();

    for _ in 0 .. random.random_range(1 ..= 4) {
        let index = random.random_range(0 .. bytes.len());
        bytes[index] = random.random();
    }

    if random.random_bool(0.1) {
        bytes.truncate(random.random_range(0 .. bytes.len()));
    }

    bytes
}


#[test]
pub fn sample_is_valid(){
    inspect(&sample_file()).unwrap();
}

#[test]
pub fn every_truncation_fails_gracefully(){
    let file = sample_file();

    for length in 0 .. file.len() {
        let bytes = file[.. length].to_vec();
        let result = catch_unwind(move || inspect(&bytes));

        match result {
            Ok(Err(_)) => {},
            Ok(Ok(())) => panic!("file truncated to {} bytes was accepted", length),
            Err(_) => panic!("file truncated to {} bytes caused a panic", length),
        }
    }
}

#[test]
pub fn damaged(){
    let file = sample_file();
    let mut random = StdRng::seed_from_u64(0x1FF_85);

    for fuzz_index in 0 .. 512 {
        let bytes = mutate(&mut random, &file);
        assert!(survives(bytes), "mutation {} caused a panic", fuzz_index);
    }
}

#[test]
pub fn random_bytes(){
    let mut random = StdRng::seed_from_u64(85);

    for fuzz_index in 0 .. 256 {
        let mut bytes = vec![ 0_u8; random.random_range(0 .. 96) ];
        random.fill(bytes.as_mut_slice());

        // give the random bytes a chance to get past the first header
        if bytes.len() >= 4 && random.random_bool(0.5) {
            bytes[.. 4].copy_from_slice(b"FORM");
        }

        assert!(survives(bytes), "random file {} caused a panic", fuzz_index);
    }
}

#[test]
#[ignore]
pub fn fuzz(){
    println!("started fuzzing");
    let file = sample_file();

    let seed = [92,1,0,30,2,8,21,70,74,4,9,9,0,23,0,3,20,5,6,5,9,30,0,34,8,0,40,7,5,2,7,0];
    let mut random = StdRng::from_seed(seed);

    let start_index = 0; // increase this integer for debugging a specific fuzz case
    for fuzz_index in 0 .. 1024_u64 * 1024 * 4 {
        let bytes = mutate(&mut random, &file);

        if fuzz_index >= start_index && !survives(bytes.clone()) {
            std::fs::write("tests/fuzzed.iff", &bytes).unwrap();
            panic!("fuzz case {} caused a panic, written to tests/fuzzed.iff", fuzz_index);
        }

        if fuzz_index % (1024 * 32) == 0 {
            println!("fuzz index {}", fuzz_index);
        }
    }
}
