mod common;

use lilium::backend::bytecode::{
    compile_source, decode_module, load_file, LoadError, Loader, Opcode, EXTERNAL_ADDRESS, HEADER_SIZE, MAGIC,
};

const ADD: &str = "(def add (a b) (+ a b)) (add 40 2)";

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(word)
}

#[test]
fn header_and_sections() {
    let bytes = compile_source("add", ADD).unwrap().into_bytes();

    assert_eq!(&bytes[0..2], &MAGIC);
    assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 2);
    assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 1);
    assert_eq!(u64_at(&bytes, 8), 10);

    // Function table: nameLen, typeCount, address, name, return + param types
    let table = HEADER_SIZE;
    assert_eq!(bytes[table], 3);
    assert_eq!(bytes[table + 1], 3);
    assert_eq!(u64_at(&bytes, table + 2), 7);
    assert_eq!(&bytes[table + 10..table + 13], b"add");
    assert_eq!(&bytes[table + 13..table + 16], &[0, 0, 0]);

    let pool = table + 16;
    assert_eq!(u64_at(&bytes, pool), 40);
    assert_eq!(u64_at(&bytes, pool + 8), 2);

    let code = pool + 16;
    assert_eq!(&bytes[code..code + 4], &[Opcode::LoadI.to_byte(), 1, 0, 0]);
    assert_eq!(bytes.len(), code + 10 * 4);
}

#[test]
fn external_entry_uses_sentinel_address() {
    let bytes = compile_source("main", "(neg 5)").unwrap().into_bytes();
    let table = HEADER_SIZE;
    assert_eq!(bytes[table + 1], 2);
    assert_eq!(u64_at(&bytes, table + 2), EXTERNAL_ADDRESS);
    // Unknown return type, one int parameter
    assert_eq!(&bytes[table + 13..table + 15], &[3, 0]);
}

#[test]
fn negative_constants_are_twos_complement() {
    let bytes = compile_source("neg", "-5").unwrap().into_bytes();
    assert_eq!(u64_at(&bytes, HEADER_SIZE), (-5i64) as u64);
}

#[test]
fn decode_then_encode_is_identity() {
    let bytes = compile_source("add", ADD).unwrap().into_bytes();
    let module = decode_module("add", &bytes).unwrap();
    assert_eq!(module.encode(), bytes);
    assert_eq!(module.entry_reservation(), 3);
    assert_eq!(module.find_function("add").unwrap().reservation, 4);
}

#[test]
fn load_from_file() {
    let dir = common::scratch_dir("load-from-file");
    let path = common::write_module(&dir, "add", ADD);
    let module = load_file(&path).unwrap();
    assert_eq!(module.name(), "add");
    assert_eq!(module.len(), 10);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn bad_magic() {
    let mut bytes = compile_source("add", ADD).unwrap().into_bytes();
    bytes[0] = b'M';
    assert_eq!(decode_module("add", &bytes).unwrap_err(), LoadError::BadMagic([b'M', 0x49]));
}

#[test]
fn truncated_at_every_section() {
    let bytes = compile_source("add", ADD).unwrap().into_bytes();
    for (len, section) in [
        (10, "header"),
        (HEADER_SIZE + 5, "function table"),
        (HEADER_SIZE + 20, "constant pool"),
        (bytes.len() - 1, "instructions"),
    ] {
        match decode_module("add", &bytes[..len]) {
            Err(LoadError::Truncated { section: found, .. }) => assert_eq!(found, section),
            other => panic!("truncating to {} bytes gave {:?}", len, other),
        }
    }
}

#[test]
fn trailing_bytes() {
    let mut bytes = compile_source("add", ADD).unwrap().into_bytes();
    bytes.extend_from_slice(&[0, 0]);
    assert_eq!(decode_module("add", &bytes).unwrap_err(), LoadError::TrailingBytes(2));
}

#[test]
fn invalid_opcode_in_stream() {
    let mut bytes = compile_source("add", ADD).unwrap().into_bytes();
    let last = bytes.len() - 4;
    bytes[last] = 0x7f;
    assert_eq!(
        decode_module("add", &bytes).unwrap_err(),
        LoadError::InvalidOpcode { address: 9, byte: 0x7f }
    );
}

#[test]
fn failed_loader_stays_inconsistent() {
    let bytes = compile_source("add", ADD).unwrap().into_bytes();
    let mut loader = Loader::new("add", &bytes[..12]);
    assert!(loader.load().is_err());
    assert!(!loader.is_consistent());
    assert_eq!(loader.load().unwrap_err(), LoadError::Inconsistent);
}
