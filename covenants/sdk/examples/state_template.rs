use covenant_sdk::{FieldReader, FieldWriter, STATE_VERSION, build_state_script, compute_push_size, parse_state_script, peek_tag};
use kaspa_txscript::opcodes::codes::{OpDrop, OpTrue};

const COUNTER_TAG: u8 = 0x7f;

fn main() {
    let program = [OpDrop, OpTrue];

    let mut fixed = FieldWriter::new();
    fixed.put_bytes(b"counter").unwrap();
    let mut fields = FieldWriter::new();
    fields.put_u64(41).put_bool(true);

    let script = build_state_script(COUNTER_TAG, fixed.as_slice(), &program, fields.as_slice()).unwrap();
    let state_push = compute_push_size(&[&[STATE_VERSION][..], fields.as_slice()].concat()).unwrap();
    println!("script: {} bytes, state push: {state_push} bytes", script.len());
    println!("tag: {:#04x}", peek_tag(&script).unwrap());

    let parsed = parse_state_script(&script, |tag| (tag == COUNTER_TAG).then_some(&program[..])).unwrap();
    let mut reader = FieldReader::new(&parsed.fields);
    let count = reader.u64("count").unwrap();
    let enabled = reader.bool("enabled").unwrap();
    reader.finish().unwrap();
    println!("count = {count}, enabled = {enabled}");

    let mut next = FieldWriter::new();
    next.put_u64(count + 1).put_bool(enabled);
    let successor = build_state_script(COUNTER_TAG, fixed.as_slice(), &program, next.as_slice()).unwrap();
    assert_eq!(successor.len(), script.len());
    println!("successor differs only in the state push: {}", script[..script.len() - state_push] == successor[..successor.len() - state_push]);
}
